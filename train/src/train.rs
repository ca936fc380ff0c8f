//! The training loop.

use crate::{
    common::*,
    config::CheckpointErrorPolicy,
    data::{Batch, BatchSource},
    model::{total_loss, DetectionModel},
    optim::Optimizer,
    utils::{CheckpointWriter, RateCounter},
};

/// Training loop options.
#[derive(Debug, Clone)]
pub struct TrainerInit {
    /// The number of passes over the data. Zero means nothing is trained and
    /// no checkpoint is written.
    pub epochs: usize,
    pub checkpoint: CheckpointWriter,
    pub on_checkpoint_error: CheckpointErrorPolicy,
}

impl TrainerInit {
    pub fn build<M, O>(self, model: M, optimizer: O) -> Trainer<M, O>
    where
        M: DetectionModel,
        O: Optimizer,
    {
        let Self {
            epochs,
            checkpoint,
            on_checkpoint_error,
        } = self;

        Trainer {
            device: model.device(),
            model,
            optimizer,
            epochs,
            checkpoint,
            on_checkpoint_error,
            training_step: 0,
        }
    }
}

/// The statistics of a finished training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub steps: usize,
    pub checkpoints: usize,
    pub last_loss: Option<f64>,
}

/// Owns the model and the optimizer and runs epochs over a [BatchSource].
#[derive(Debug)]
pub struct Trainer<M, O> {
    model: M,
    optimizer: O,
    device: Device,
    epochs: usize,
    checkpoint: CheckpointWriter,
    on_checkpoint_error: CheckpointErrorPolicy,
    training_step: usize,
}

impl<M, O> Trainer<M, O>
where
    M: DetectionModel,
    O: Optimizer,
{
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// The number of optimizer steps applied so far.
    pub fn training_step(&self) -> usize {
        self.training_step
    }

    pub fn into_inner(self) -> (M, O) {
        (self.model, self.optimizer)
    }

    /// Trains for the configured number of epochs.
    ///
    /// Every epoch consumes one pass of the source and ends with a
    /// checkpoint. The first failing batch stops training.
    pub fn run<S>(&mut self, source: &mut S) -> Result<TrainingSummary>
    where
        S: BatchSource + ?Sized,
    {
        let mut summary = TrainingSummary::default();

        if self.epochs == 0 {
            info!("the number of epochs is zero, skip training");
            return Ok(summary);
        }

        info!("start training on {:?}", self.device);

        for epoch in 0..self.epochs {
            let _span = info_span!("epoch", epoch).entered();
            info!("epoch {}", epoch);

            let mut rate_counter = RateCounter::with_second_interval();

            for result in source.epoch(epoch)? {
                let batch =
                    result.with_context(|| format!("failed to load a batch in epoch {}", epoch))?;
                let loss = self.train_step(&batch).with_context(|| {
                    format!(
                        "training step {} in epoch {} failed",
                        self.training_step, epoch
                    )
                })?;

                // print message
                rate_counter.add(1.0);
                if let Some(batch_rate) = rate_counter.rate() {
                    let record_rate = batch_rate * batch.len() as f64;
                    info!(
                        "epoch: {}\tstep: {}\tloss: {:.5}\t{:.2} batches/s\t{:.2} records/s",
                        epoch, self.training_step, loss, batch_rate, record_rate
                    );
                } else {
                    info!(
                        "epoch: {}\tstep: {}\tloss: {:.5}",
                        epoch, self.training_step, loss
                    );
                }

                summary.steps += 1;
                summary.last_loss = Some(loss);
            }

            if self.save_checkpoint(epoch)? {
                summary.checkpoints += 1;
            }
            summary.epochs += 1;
        }

        Ok(summary)
    }

    /// Runs one optimization step and returns the summed loss.
    ///
    /// Gradients are cleared, computed and applied in that order.
    pub fn train_step(&mut self, batch: &Batch) -> Result<f64> {
        ensure!(!batch.is_empty(), "cannot train on an empty batch");

        let Batch { images, targets } = batch.to_device(self.device);
        let losses = self.model.forward_t(&images, &targets)?;
        let loss = total_loss(&losses)?;
        let loss_value = f64::from(&loss);
        ensure!(
            loss_value.is_finite(),
            "the training loss {} is not finite",
            loss_value
        );

        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.step();
        self.training_step += 1;

        Ok(loss_value)
    }

    /// Returns whether the checkpoint was written.
    fn save_checkpoint(&self, epoch: usize) -> Result<bool> {
        match self.checkpoint.save(self.model.var_store(), epoch) {
            Ok(()) => {
                info!(
                    "saved checkpoint {} at epoch {}",
                    self.checkpoint.path().display(),
                    epoch
                );
                Ok(true)
            }
            Err(err) => match self.on_checkpoint_error {
                CheckpointErrorPolicy::Abort => Err(err.into()),
                CheckpointErrorPolicy::Warn => {
                    warn!("{:#}, continue training", Error::from(err));
                    Ok(false)
                }
            },
        }
    }
}
