use crate::{common::*, config::PreprocessorConfig};

/// Converts decoded images to normalized float tensors.
///
/// Pixels are scaled to `[0, 1]` and then normalized by per-channel mean
/// and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTransform {
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImageTransform {
    pub fn new(mean: [f64; 3], std: [f64; 3]) -> Result<Self> {
        ensure!(
            mean.iter().all(|value| value.is_finite()),
            "mean values must be finite"
        );
        ensure!(
            std.iter().all(|&value| value.is_finite() && value > 0.0),
            "std values must be positive"
        );

        Ok(Self {
            mean: mean.map(|value| value as f32),
            std: std.map(|value| value as f32),
        })
    }

    pub fn from_config(config: &PreprocessorConfig) -> Result<Self> {
        let PreprocessorConfig { mean, std } = *config;
        Self::new(mean, std)
    }

    /// Normalizes a `[3, H, W]` image tensor of 8-bit pixel values.
    pub fn forward(&self, image: &Tensor) -> Result<Tensor> {
        let (channels, _height, _width) = image.size3()?;
        ensure!(
            channels == 3,
            "expect a 3-channel image, but get {} channels",
            channels
        );

        let device = image.device();
        let mean = Tensor::of_slice(&self.mean).view([3, 1, 1]).to_device(device);
        let std = Tensor::of_slice(&self.std).view([3, 1, 1]).to_device(device);
        let output = (image.to_kind(Kind::Float) / 255.0 - mean) / std;

        Ok(output)
    }

    /// Decodes an image file and normalizes it.
    pub fn load<P>(&self, path: P) -> Result<Tensor>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let image = tch::vision::image::load(path)
            .with_context(|| format!("failed to load image '{}'", path.display()))?;
        self.forward(&image)
    }
}
