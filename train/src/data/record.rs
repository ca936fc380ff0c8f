use crate::common::*;

/// The targets of one image in the layout the detector consumes.
///
/// `labels` is an int64 tensor of shape `[N]`, and `boxes` is a float
/// tensor of shape `[N, 4]` in `[xmin, ymin, xmax, ymax]` order.
#[derive(Debug, TensorLike)]
pub struct TargetTensors {
    pub labels: Tensor,
    pub boxes: Tensor,
}

impl TargetTensors {
    pub fn from_normalized(target: &NormalizedTarget) -> Self {
        let num_objects = target.len() as i64;
        let labels = Tensor::of_slice(&target.labels);
        let boxes: Vec<f32> = target
            .boxes
            .iter()
            .flatten()
            .map(|&coord| coord as f32)
            .collect();
        let boxes = Tensor::of_slice(&boxes).view([num_objects, 4]);

        Self { labels, boxes }
    }

    pub fn num_objects(&self) -> i64 {
        self.labels.size()[0]
    }
}

/// A group of images and their targets processed in one optimizer step.
///
/// `targets[i]` belongs to `images[i]`.
#[derive(Debug)]
pub struct Batch {
    pub images: Vec<Tensor>,
    pub targets: Vec<TargetTensors>,
}

impl Batch {
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.images.len(), self.targets.len());
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies all images and targets to the device.
    pub fn to_device(&self, device: Device) -> Self {
        let images = self
            .images
            .iter()
            .map(|image| image.to_device(device))
            .collect();
        let targets = self
            .targets
            .iter()
            .map(|target| target.to_device(device))
            .collect();
        Self { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_tensor_shapes() {
        let target = NormalizedTarget {
            labels: vec![1, 0],
            boxes: vec![[1, 2, 3, 4], [5, 6, 7, 8]],
        };
        let tensors = TargetTensors::from_normalized(&target);

        assert_eq!(tensors.labels.kind(), Kind::Int64);
        assert_eq!(tensors.boxes.kind(), Kind::Float);
        assert_eq!(tensors.labels.size(), [2]);
        assert_eq!(tensors.boxes.size(), [2, 4]);
        assert_eq!(Vec::<i64>::from(&tensors.labels), [1, 0]);
        assert_eq!(
            Vec::<f32>::from(&tensors.boxes.view([-1])),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn empty_target_keeps_box_width() {
        let tensors = TargetTensors::from_normalized(&NormalizedTarget::default());
        assert_eq!(tensors.num_objects(), 0);
        assert_eq!(tensors.labels.size(), [0]);
        assert_eq!(tensors.boxes.size(), [0, 4]);
    }
}
