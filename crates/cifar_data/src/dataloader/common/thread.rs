//! Thread-local state for loader workers.
//!
//! Each worker knows its own ID and owns a seeded RNG. Random transforms draw
//! from that RNG so augmentation is reproducible for a fixed loader seed.

use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Range;

thread_local! {
    /// Thread-local worker ID.
    ///
    /// Each worker thread is assigned a unique ID (0 to num_workers-1) when spawned.
    /// The single-threaded path runs as worker 0.
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Thread-local RNG for deterministic randomness in workers
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Initialize worker's RNG based on worker_id, epoch, and base seed.
/// Seed formula: base_seed + (epoch << 32) + worker_id
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| {
        let seed = base_seed
            .wrapping_add((epoch as u64) << 32)
            .wrapping_add(worker_id as u64);
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(seed));
    })
}

/// Runs the current thread as worker `worker_id` until dropped, then puts
/// back whatever worker ID and RNG the thread had before.
///
/// Used by the single-threaded loader, which borrows the caller's thread.
/// Not `Send`: it must be dropped on the thread that created it.
pub(crate) struct WorkerRngScope {
    previous_id: usize,
    previous_rng: Option<StdRng>,
    _not_send: PhantomData<*const ()>,
}

impl WorkerRngScope {
    pub(crate) fn enter(worker_id: usize, epoch: usize, base_seed: u64) -> Self {
        let previous_id = WORKER_ID.with(|id| std::mem::replace(&mut *id.borrow_mut(), worker_id));
        let previous_rng = WORKER_RNG.with(|rng| rng.borrow_mut().take());
        init_worker_rng(worker_id, epoch, base_seed);
        Self {
            previous_id,
            previous_rng,
            _not_send: PhantomData,
        }
    }
}

impl Drop for WorkerRngScope {
    fn drop(&mut self) {
        WORKER_ID.with(|id| *id.borrow_mut() = self.previous_id);
        WORKER_RNG.with(|rng| *rng.borrow_mut() = self.previous_rng.take());
    }
}

/// Get a random bool from worker RNG, or the thread RNG outside a worker context.
pub fn worker_gen_bool(p: f64) -> bool {
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_bool(p),
        None => rand::rng().random_bool(p),
    })
}

/// Draws uniformly from `range` with the worker RNG. An empty range yields its start.
pub fn worker_gen_range(range: Range<usize>) -> usize {
    if range.is_empty() {
        return range.start;
    }
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_range(range),
        None => rand::rng().random_range(range),
    })
}
