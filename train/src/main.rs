use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::Arc};
use structopt::StructOpt;
use tracing::{info, trace_span, Instrument};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use train::{config::Config, device::DeviceSelector};

#[derive(Debug, Clone, StructOpt)]
/// Train a Faster R-CNN detector
struct Args {
    #[structopt(long, default_value = "train.json5")]
    /// configuration file
    pub config_file: PathBuf,
    #[structopt(long)]
    /// override the device, one of auto, cpu, cuda or cuda:N
    pub device: Option<DeviceSelector>,
    #[structopt(long)]
    /// override the number of epochs
    pub epochs: Option<usize>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        let filter = if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        };
        filter
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Args {
        config_file,
        device,
        epochs,
    } = Args::from_args();
    let mut config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    if let Some(device) = device {
        config.training.device = device;
    }
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }

    // start training program
    let summary = train::start(Arc::new(config))
        .instrument(trace_span!("train"))
        .await?;
    info!(
        "finished {} epochs in {} steps, last loss {:?}",
        summary.epochs, summary.steps, summary.last_loss
    );

    Ok(())
}
