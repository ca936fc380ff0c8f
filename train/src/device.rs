//! Compute device selection.

use crate::common::*;
use thiserror::Error;

/// The requested compute device.
///
/// It is written as `auto`, `cpu`, `cuda` or `cuda:N` in configuration files
/// and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Use the first CUDA device if any, otherwise the CPU.
    Auto,
    Cpu,
    Cuda(usize),
}

/// The requested CUDA device cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CUDA device {index} is unavailable, {available} device(s) found")]
pub struct DeviceUnavailableError {
    pub index: usize,
    pub available: usize,
}

impl DeviceSelector {
    /// Resolves the device without fallback.
    pub fn try_select(self) -> Result<Device, DeviceUnavailableError> {
        match self {
            Self::Auto => Ok(Device::cuda_if_available()),
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(index) => {
                let available = tch::Cuda::device_count().max(0) as usize;
                if index < available {
                    Ok(Device::Cuda(index))
                } else {
                    Err(DeviceUnavailableError { index, available })
                }
            }
        }
    }

    /// Resolves the device, falling back to the CPU if the requested
    /// accelerator is unavailable.
    pub fn select(self) -> Device {
        match self.try_select() {
            Ok(device) => device,
            Err(err) => {
                warn!("{}, fall back to CPU", err);
                Device::Cpu
            }
        }
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::Auto
    }
}

impl FromStr for DeviceSelector {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let selector = match text.trim().to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "cpu" => Self::Cpu,
            "cuda" => Self::Cuda(0),
            other => {
                let index = other
                    .strip_prefix("cuda:")
                    .ok_or_else(|| format_err!("invalid device '{}'", text))?;
                let index: usize = index
                    .parse()
                    .with_context(|| format!("invalid CUDA device index in '{}'", text))?;
                Self::Cuda(index)
            }
        };
        Ok(selector)
    }
}

impl Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

impl Serialize for DeviceSelector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceSelector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let text = String::deserialize(deserializer)?;
        text.parse().map_err(|err: Error| D::Error::custom(format!("{:#}", err)))
    }
}
