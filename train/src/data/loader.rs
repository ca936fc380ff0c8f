use super::*;
use crate::common::*;
use tokio::runtime::Handle;

/// Anything that yields the batches of one training epoch.
pub trait BatchSource {
    /// Starts a single pass over the data for the given epoch.
    fn epoch(&mut self, epoch: usize) -> Result<Box<dyn Iterator<Item = Result<Batch>> + '_>>;
}

/// The data loader options.
#[derive(Debug, Clone)]
pub struct DataLoaderInit {
    pub batch_size: usize,
    /// The number of samples loaded concurrently. Zero is treated as one.
    pub num_workers: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl DataLoaderInit {
    /// Builds the loader. It must be called within a tokio runtime.
    pub fn build(
        self,
        dataset: Arc<dyn RandomAccessDataset>,
        collator: Collator,
    ) -> Result<DataLoader> {
        let Self {
            batch_size,
            num_workers,
            shuffle,
            seed,
        } = self;
        ensure!(batch_size > 0, "batch_size must be positive");

        let handle =
            Handle::try_current().context("the data loader must be built within a tokio runtime")?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(DataLoader {
            dataset,
            collator: Arc::new(collator),
            batch_size,
            num_workers: num_workers.max(1),
            shuffle,
            rng,
            handle,
        })
    }
}

/// Loads samples on a blocking worker pool and groups them into batches.
///
/// Batches are produced by a task on the tokio runtime and delivered in
/// order through a bounded channel. The consumer must not run on the
/// runtime's async threads.
#[derive(Debug)]
pub struct DataLoader {
    dataset: Arc<dyn RandomAccessDataset>,
    collator: Arc<Collator>,
    batch_size: usize,
    num_workers: usize,
    shuffle: bool,
    rng: StdRng,
    handle: Handle,
}

impl DataLoader {
    pub fn num_records(&self) -> usize {
        self.dataset.num_records()
    }

    /// The number of batches per epoch, including a shorter final batch.
    pub fn num_batches(&self) -> usize {
        (self.num_records() + self.batch_size - 1) / self.batch_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn spawn_epoch(&mut self, epoch: usize) -> mpsc::Receiver<Result<Batch>> {
        let mut indexes: Vec<usize> = (0..self.dataset.num_records()).collect();
        if self.shuffle {
            indexes.shuffle(&mut self.rng);
        }

        let (tx, rx) = mpsc::channel(2);
        let dataset = self.dataset.clone();
        let collator = self.collator.clone();
        let batch_size = self.batch_size;
        let num_workers = self.num_workers;

        self.handle.spawn(async move {
            let mut batches = stream::iter(indexes)
                .map(move |index| {
                    let dataset = dataset.clone();
                    async move {
                        let sample = tokio::task::spawn_blocking(move || {
                            dataset
                                .nth(index)
                                .with_context(|| format!("failed to load record {}", index))
                        })
                        .await??;
                        Fallible::Ok(sample)
                    }
                })
                .buffered(num_workers)
                .chunks(batch_size)
                .map(move |samples| -> Result<Batch> {
                    let samples: Vec<_> = samples.into_iter().try_collect()?;
                    collator.collate(samples)
                });

            while let Some(result) = batches.next().await {
                let is_err = result.is_err();

                // the receiver is gone when training stops early
                if tx.send(result).await.is_err() || is_err {
                    break;
                }
            }

            trace!("data loading for epoch {} finished", epoch);
        });

        rx
    }
}

impl BatchSource for DataLoader {
    fn epoch(&mut self, epoch: usize) -> Result<Box<dyn Iterator<Item = Result<Batch>> + '_>> {
        let mut rx = self.spawn_epoch(epoch);
        Ok(Box::new(std::iter::from_fn(move || rx.blocking_recv())))
    }
}
