use crate::{
    common::*,
    config::{CheckpointConfig, LoadCheckpoint},
};
use thiserror::Error;

/// A checkpoint file could not be written.
#[derive(Debug, Error)]
#[error("failed to write checkpoint file '{}'", .path.display())]
pub struct CheckpointWriteError {
    pub path: PathBuf,
    #[source]
    pub source: Error,
}

/// Saves model parameters at the end of epochs.
///
/// The file at `path` is replaced on every save. It is written to a
/// temporary sibling first and renamed over the target, so an interrupted
/// save leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
    keep_epochs: bool,
}

impl CheckpointWriter {
    pub fn new<P>(path: P, keep_epochs: bool) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            path: path.as_ref().to_owned(),
            keep_epochs,
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(&config.path, config.keep_epochs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The per-epoch copy path, `<stem>_epoch<NNNN>.<ext>` next to the main file.
    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".into());
        let file_name = match self.path.extension() {
            Some(ext) => format!("{}_epoch{:04}.{}", stem, epoch, ext.to_string_lossy()),
            None => format!("{}_epoch{:04}", stem, epoch),
        };
        self.path.with_file_name(file_name)
    }

    /// Saves all variables of the var store.
    pub fn save(&self, vs: &nn::VarStore, epoch: usize) -> Result<(), CheckpointWriteError> {
        write_atomic(vs, &self.path)?;
        if self.keep_epochs {
            write_atomic(vs, &self.epoch_path(epoch))?;
        }
        Ok(())
    }
}

fn write_atomic(vs: &nn::VarStore, path: &Path) -> Result<(), CheckpointWriteError> {
    let write = || -> Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| format_err!("the checkpoint path has no file name"))?;
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        vs.save(&tmp_path)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    };

    write().map_err(|source| CheckpointWriteError {
        path: path.to_owned(),
        source,
    })
}

/// Load parameters with specified checkpoint loading method.
///
/// It returns the path of the loaded file, if any.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<PathBuf>> {
    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromFile { file } => {
            if file.is_file() {
                Some(file.to_owned())
            } else {
                warn!("{} is not a file", file.display());
                None
            }
        }
    };

    if let Some(path) = &path {
        info!("load checkpoint file {}", path.display());
        vs.load(path)
            .with_context(|| format!("failed to load checkpoint file '{}'", path.display()))?;
    }

    Ok(path)
}
