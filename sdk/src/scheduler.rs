use {
    crate::{
        error::{Error, Result},
        progress::ProgressTracker,
        retry::RetryPolicy,
    },
    futures::future::join_all,
    std::future::Future,
    tracing::{debug, warn},
};

pub const DEFAULT_CONCURRENCY: usize = 5;

/// One independent piece of a transfer job, such as the upload of a single chunk.
///
/// `attempt` may be called several times if earlier attempts fail with a
/// transient error.
pub trait TransferUnit {
    type Output;

    fn attempt(&self) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// Runs transfer units in sequential batches of at most `concurrency` units.
///
/// A batch is awaited in full before the next one starts. If any unit of a batch
/// fails permanently, the job fails with that unit's error and the remaining
/// batches are not started. Units that already succeeded are not rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferScheduler {
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for TransferScheduler {
    #[inline]
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl TransferScheduler {
    #[must_use]
    #[inline]
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self { concurrency, retry }
    }

    /// Returns outputs in the order of `units`.
    #[inline]
    pub async fn run<U: TransferUnit + Sync>(
        &self,
        units: &[U],
        progress: &ProgressTracker,
    ) -> Result<Vec<U::Output>> {
        let concurrency = self.concurrency.max(1);
        let mut outputs = Vec::with_capacity(units.len());
        for (batch_index, batch) in units.chunks(concurrency).enumerate() {
            debug!(batch_index, size = batch.len(), "starting batch");
            let results = join_all(batch.iter().map(|unit| async move {
                let output = self.retry.run(move |_| unit.attempt()).await?;
                progress.increment();
                Ok::<_, Error>(output)
            }))
            .await;

            let mut failure = None;
            for result in results {
                match result {
                    Ok(output) => outputs.push(output),
                    Err(err) => {
                        warn!(batch_index, error = %err, "transfer unit failed");
                        failure.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }
        Ok(outputs)
    }
}
