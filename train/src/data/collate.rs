use super::*;
use crate::common::*;

/// Groups loaded samples into a [Batch].
///
/// Images pass through unchanged. Annotations are normalized one by one, so
/// neither the batch size nor the object count per image has to be uniform.
#[derive(Debug, Clone)]
pub struct Collator {
    normalizer: Normalizer,
}

impl Collator {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Builds a batch, preserving the sample order.
    ///
    /// A normalization failure of any sample fails the whole batch.
    pub fn collate<I>(&self, samples: I) -> Result<Batch>
    where
        I: IntoIterator<Item = (Tensor, RawAnnotation)>,
    {
        let pairs: Vec<_> = samples
            .into_iter()
            .enumerate()
            .map(|(index, (image, annotation))| -> Result<_> {
                let target = self.normalizer.normalize(&annotation).with_context(|| {
                    format!("failed to normalize the annotation of batch item {}", index)
                })?;
                Ok((image, TargetTensors::from_normalized(&target)))
            })
            .try_collect()?;
        let (images, targets) = pairs.into_iter().unzip();

        Ok(Batch { images, targets })
    }
}
