use crate::common::*;

/// The dataset that can be random accessed.
///
/// Implementations are called from a blocking worker pool and may perform
/// file IO and image decoding.
pub trait RandomAccessDataset
where
    Self: Debug + Send + Sync,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the preprocessed image and the raw annotation of the nth record.
    fn nth(&self, index: usize) -> Result<(Tensor, RawAnnotation)>;
}
