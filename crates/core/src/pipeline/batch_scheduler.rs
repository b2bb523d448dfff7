use std::time::{Duration, Instant};

use crate::pipeline::locate_error::LocateError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::cancellation::RunControl;

/// Runs work over fixed-size batches, strictly one after another, with a
/// pause between consecutive batches.
///
/// The first failing batch aborts the whole sequence; results of earlier
/// batches are discarded with it.
pub struct BatchScheduler {
    batch_size: usize,
    pause: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
        }
    }

    /// Splits `items` into order-preserving batches of at most `batch_size`.
    pub fn partition<'a, T>(&self, items: &'a [T]) -> Vec<&'a [T]> {
        items.chunks(self.batch_size).collect()
    }

    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size)
    }

    /// Calls `match_fn(index, batch)` for each batch in order.
    ///
    /// `control` is checked before and after every batch, so a batch that
    /// overruns the deadline fails the sequence even when it is the last one.
    /// The inter-batch pause wakes early on cancellation or at the deadline.
    pub fn for_each_batch<T, R, F>(
        &self,
        items: &[T],
        control: &RunControl,
        logger: &mut dyn PipelineLogger,
        mut match_fn: F,
    ) -> Result<Vec<Vec<R>>, LocateError>
    where
        F: FnMut(usize, &[T]) -> Result<Vec<R>, LocateError>,
    {
        let batches = self.partition(items);
        let total = batches.len();
        let mut results = Vec::with_capacity(total);

        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 && !self.pause.is_zero() {
                control.pause(self.pause)?;
            }
            control.checkpoint()?;

            let started = Instant::now();
            let batch_results = match_fn(index, batch)?;
            logger.timing("batch", started.elapsed().as_secs_f64() * 1000.0);
            logger.metric("results_per_batch", batch_results.len() as f64);
            logger.batch_progress(index + 1, total);
            control.checkpoint()?;

            results.push(batch_results);
        }

        Ok(results)
    }
}
