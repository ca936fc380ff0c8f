//! Training program configuration format.

use crate::{common::*, device::DeviceSelector};

pub use checkpoint::*;
pub use dataset::*;
pub use model::*;
pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub preprocessor: PreprocessorConfig,
    pub training: TrainingConfig,
    pub checkpoint: CheckpointConfig,
}

impl Config {
    /// Loads and validates a JSON5 configuration file.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints that the type system does not capture.
    pub fn validate(&self) -> Result<()> {
        let Self {
            dataset: DatasetConfig { ref classes, .. },
            model: ModelConfig::TorchScript(TorchScriptModelConfig { num_classes, .. }),
            preprocessor: PreprocessorConfig { mean, std },
            training: TrainingConfig { ref optimizer, .. },
            ..
        } = *self;

        ensure!(!classes.is_empty(), "the class list must not be empty");
        ensure!(
            num_classes.get() >= classes.len(),
            "num_classes ({}) must not be less than the number of listed classes ({})",
            num_classes,
            classes.len()
        );
        ensure!(
            mean.iter().all(|value| value.is_finite()),
            "preprocessor mean must be finite"
        );
        ensure!(
            std.iter().all(|&value| value.is_finite() && value > 0.0),
            "preprocessor std must be positive"
        );
        optimizer.validate()?;

        Ok(())
    }
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        /// The PASCAL VOC directory containing `Annotations`, `ImageSets` and `JPEGImages`.
        pub root: PathBuf,
        /// The image set name, such as `train` or `trainval`.
        #[serde(default = "default_split")]
        pub split: String,
        /// Class names in label id order.
        pub classes: ClassVocabulary,
    }

    fn default_split() -> String {
        "train".into()
    }
}

mod model {
    use super::*;

    /// The model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    pub enum ModelConfig {
        TorchScript(TorchScriptModelConfig),
    }

    /// A detector exported as a TorchScript module.
    ///
    /// The module takes a list of images and a list of target dicts with
    /// `boxes` and `labels` keys, and returns the loss dict in training mode.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TorchScriptModelConfig {
        pub module_file: PathBuf,
        /// The number of classes the detector head was built with, background included.
        pub num_classes: NonZeroUsize,
    }
}

/// Image normalization options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Per-channel mean of pixel values in `[0, 1]` range.
    pub mean: [f64; 3],
    /// Per-channel standard deviation of pixel values in `[0, 1]` range.
    pub std: [f64; 3],
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        /// The batch size.
        pub batch_size: NonZeroUsize,
        /// The number of passes over the dataset.
        pub epochs: usize,
        /// The number of samples loaded concurrently.
        #[serde(default = "default_num_workers")]
        pub num_workers: usize,
        /// If set, visit samples in a random order every epoch.
        #[serde(default = "default_shuffle")]
        pub shuffle: bool,
        /// The seed of the shuffling order.
        pub seed: Option<u64>,
        pub optimizer: OptimizerConfig,
        #[serde(default)]
        pub device: DeviceSelector,
    }

    /// The optimizer and its hyperparameters.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum OptimizerConfig {
        Sgd {
            lr: R64,
            #[serde(default = "zero")]
            momentum: R64,
            #[serde(default = "zero")]
            weight_decay: R64,
            #[serde(default)]
            nesterov: bool,
        },
        Adam {
            lr: R64,
            #[serde(default = "default_beta1")]
            beta1: R64,
            #[serde(default = "default_beta2")]
            beta2: R64,
            #[serde(default = "zero")]
            weight_decay: R64,
        },
    }

    impl OptimizerConfig {
        pub fn lr(&self) -> R64 {
            match *self {
                Self::Sgd { lr, .. } => lr,
                Self::Adam { lr, .. } => lr,
            }
        }

        pub fn validate(&self) -> Result<()> {
            ensure!(self.lr().raw() > 0.0, "learning rate must be positive");

            match *self {
                Self::Sgd {
                    momentum,
                    weight_decay,
                    nesterov,
                    ..
                } => {
                    ensure!(momentum.raw() >= 0.0, "momentum must be non-negative");
                    ensure!(weight_decay.raw() >= 0.0, "weight_decay must be non-negative");
                    ensure!(
                        !nesterov || momentum.raw() > 0.0,
                        "nesterov momentum requires a positive momentum"
                    );
                }
                Self::Adam {
                    beta1,
                    beta2,
                    weight_decay,
                    ..
                } => {
                    ensure!(
                        (0.0..1.0).contains(&beta1.raw()) && (0.0..1.0).contains(&beta2.raw()),
                        "beta1 and beta2 must be in range [0, 1)"
                    );
                    ensure!(weight_decay.raw() >= 0.0, "weight_decay must be non-negative");
                }
            }

            Ok(())
        }
    }

    fn default_num_workers() -> usize {
        2
    }

    fn default_shuffle() -> bool {
        true
    }

    fn zero() -> R64 {
        r64(0.0)
    }

    fn default_beta1() -> R64 {
        r64(0.9)
    }

    fn default_beta2() -> R64 {
        r64(0.999)
    }
}

mod checkpoint {
    use super::*;

    /// Checkpoint saving and loading options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CheckpointConfig {
        /// The file overwritten at the end of every epoch.
        pub path: PathBuf,
        /// If set, also keep a copy of every epoch's parameters.
        #[serde(default)]
        pub keep_epochs: bool,
        /// What to do when a checkpoint cannot be written.
        #[serde(default)]
        pub on_error: CheckpointErrorPolicy,
        /// Checkpoint file loading method.
        #[serde(default)]
        pub load_checkpoint: LoadCheckpoint,
    }

    /// The reaction to a failed checkpoint write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum CheckpointErrorPolicy {
        /// Stop training with an error.
        Abort,
        /// Log the failure and keep training.
        Warn,
    }

    impl Default for CheckpointErrorPolicy {
        fn default() -> Self {
            Self::Abort
        }
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    impl Default for LoadCheckpoint {
        fn default() -> Self {
            Self::Disabled
        }
    }
}
