//! batch.rs — Memory-bounded batch execution strategy.
//!
//! Validation is pure CPU work with no cross-record state, so the only real
//! decision is sequential vs. parallel and how big a chunk may be while
//! keeping estimated in-flight memory under the ceiling. The strategy is a
//! value picked by a policy function, not hardwired into the pipeline, so
//! callers can override it.
//!
//! Rust threads give true CPU parallelism, so the process-pool tier some
//! scraping stacks need collapses into the thread tier here: same policy
//! surface, one parallel executor.

use rayon::prelude::*;
use serde::Serialize;

/// Conservative in-flight estimate per record: input + output + cache
/// overhead, ~1.5 KB.
pub const RECORD_MEMORY_ESTIMATE_BYTES: u64 = 1536;

/// Default ceiling: 500 MB keeps a million-record run comfortably bounded.
pub const DEFAULT_MEMORY_CEILING_BYTES: u64 = 500 * 1024 * 1024;

/// Batches below this size aren't worth the parallelism overhead.
pub const SEQUENTIAL_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecStrategy {
    Sequential,
    Parallel { chunk_size: usize },
}

/// Largest chunk that keeps estimated memory under the budget; always at
/// least 1 and never more than the batch itself.
pub fn optimize_batch_size(available_memory_bytes: u64, total_count: usize) -> usize {
    let fit = (available_memory_bytes / RECORD_MEMORY_ESTIMATE_BYTES) as usize;
    fit.clamp(1, total_count.max(1))
}

pub fn select_strategy(total_count: usize) -> ExecStrategy {
    select_strategy_with(total_count, DEFAULT_MEMORY_CEILING_BYTES)
}

pub fn select_strategy_with(total_count: usize, memory_ceiling_bytes: u64) -> ExecStrategy {
    if total_count < SEQUENTIAL_MAX {
        ExecStrategy::Sequential
    } else {
        ExecStrategy::Parallel {
            chunk_size: optimize_batch_size(memory_ceiling_bytes, total_count),
        }
    }
}

/// Run `f` over `items` under the given strategy. Output order follows input
/// order here, but pipeline callers must not rely on it; only set equality
/// is part of the contract.
pub fn run<T, R, F>(strategy: ExecStrategy, items: Vec<T>, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    match strategy {
        ExecStrategy::Sequential => items.into_iter().map(f).collect(),
        ExecStrategy::Parallel { chunk_size } => {
            let chunk_size = chunk_size.max(1);
            let mut out = Vec::with_capacity(items.len());
            let mut remaining = items;
            while !remaining.is_empty() {
                let split = remaining.len().min(chunk_size);
                let tail = remaining.split_off(split);
                let chunk = std::mem::replace(&mut remaining, tail);
                out.extend(chunk.into_par_iter().map(&f).collect::<Vec<R>>());
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_batches_run_sequentially() {
        assert_eq!(select_strategy(0), ExecStrategy::Sequential);
        assert_eq!(select_strategy(99), ExecStrategy::Sequential);
        assert!(matches!(
            select_strategy(100),
            ExecStrategy::Parallel { .. }
        ));
    }

    #[test]
    fn batch_size_respects_memory_ceiling() {
        // 1 MB budget → 682 records of ~1.5 KB.
        let size = optimize_batch_size(1024 * 1024, 1_000_000);
        assert_eq!(size, (1024 * 1024 / RECORD_MEMORY_ESTIMATE_BYTES) as usize);

        // 500 MB for a million records stays well under the ceiling.
        let big = optimize_batch_size(DEFAULT_MEMORY_CEILING_BYTES, 1_000_000);
        assert!(big as u64 * RECORD_MEMORY_ESTIMATE_BYTES <= DEFAULT_MEMORY_CEILING_BYTES);
    }

    #[test]
    fn batch_size_never_exceeds_count_or_hits_zero() {
        assert_eq!(optimize_batch_size(u64::MAX / 2, 10), 10);
        assert_eq!(optimize_batch_size(0, 10), 1);
        assert_eq!(optimize_batch_size(1024, 0), 1);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let items: Vec<u64> = (0..500).collect();
        let seq = run(ExecStrategy::Sequential, items.clone(), |x| x * 2);
        let par = run(ExecStrategy::Parallel { chunk_size: 64 }, items, |x| x * 2);
        assert_eq!(seq.len(), par.len());
        let mut a = seq.clone();
        let mut b = par.clone();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn chunking_covers_every_item_exactly_once() {
        let items: Vec<usize> = (0..257).collect();
        let out = run(ExecStrategy::Parallel { chunk_size: 100 }, items, |x| x);
        assert_eq!(out.len(), 257);
        let mut sorted = out;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..257).collect::<Vec<_>>());
    }
}
