//! The training program for a Faster R-CNN detector on PASCAL VOC data.

pub mod common;
pub mod config;
pub mod data;
pub mod device;
pub mod model;
pub mod optim;
pub mod train;
pub mod utils;

use crate::{
    common::*,
    config::Config,
    data::{Collator, DataLoaderInit, ImageTransform, VocDataset},
    model::{DetectionModel as _, Model},
    train::{TrainerInit, TrainingSummary},
    utils::CheckpointWriter,
};

/// The entry of training program.
pub async fn start(config: Arc<Config>) -> Result<TrainingSummary> {
    let device = config.training.device.select();
    info!("use device {:?}", device);

    // load dataset
    info!("loading dataset");
    let dataset = {
        let transform = ImageTransform::from_config(&config.preprocessor)?;
        let dataset =
            VocDataset::load(&config.dataset.root, &config.dataset.split, transform).await?;
        info!(
            "loaded {} records from split '{}'",
            dataset.ids().len(),
            dataset.split()
        );
        dataset
    };
    let mut loader = {
        let vocabulary = Arc::new(config.dataset.classes.clone());
        let collator = Collator::new(Normalizer::new(vocabulary));
        DataLoaderInit {
            batch_size: config.training.batch_size.get(),
            num_workers: config.training.num_workers,
            shuffle: config.training.shuffle,
            seed: config.training.seed,
        }
        .build(Arc::new(dataset), collator)?
    };

    // training worker
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        // init model
        info!("initializing model");
        let mut model = Model::new(&config.model, device)?;
        utils::try_load_checkpoint(model.var_store_mut(), &config.checkpoint.load_checkpoint)?;
        let optimizer = config.training.optimizer.build(model.var_store())?;

        let mut trainer = TrainerInit {
            epochs: config.training.epochs,
            checkpoint: CheckpointWriter::from_config(&config.checkpoint),
            on_checkpoint_error: config.checkpoint.on_error,
        }
        .build(model, optimizer);

        trainer.run(&mut loader)
    })
    .await??;

    Ok(summary)
}
