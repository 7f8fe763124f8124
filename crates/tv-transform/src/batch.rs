//! Per-subject parallelism.
//!
//! Subjects never share intermediate state, so each batch is mapped with
//! rayon. Batching only bounds how much work is in flight at once; the
//! output is identical for every batch size.

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use tv_model::Result;

/// Number of items per batch for a percentage of `total`.
pub(crate) fn batch_size(total: usize, percent: u8) -> usize {
    let percent = usize::from(percent.clamp(1, 100));
    (total * percent).div_ceil(100).max(1)
}

/// Map `work` over `items` in order, one batch after another.
pub(crate) fn run_batched<T, R, F>(items: &[T], batch_percent: u8, work: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let size = batch_size(items.len(), batch_percent);
    let batches = items.len().div_ceil(size);
    let mut out = Vec::with_capacity(items.len());
    for (index, batch) in items.chunks(size).enumerate() {
        debug!(batch = index + 1, batches, items = batch.len(), "processing batch");
        let results: Result<Vec<R>> = batch.par_iter().map(&work).collect();
        out.extend(results?);
    }
    Ok(out)
}
