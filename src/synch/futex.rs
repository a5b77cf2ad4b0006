//! A raw futex: wait for a 32-bit word to change from an expected value,
//! wake waiters on a given address. Every other primitive in this module
//! could be rebuilt on top of this one; it's kept separate because some
//! callers (the [`crate::shim::pthread`] shim) want the raw Linux-style
//! `futex(2)` contract directly (spec §4.7).
//!
//! Grounded in `examples/hermit-os-kernel/src/synch/futex.rs`'s global,
//! address-keyed wait queue table, hashed with `ahash` the same way the
//! kernel's table is (the crate already depends on it for this exact
//! purpose, per its `Cargo.toml`).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;

use crate::error::{Result, SkyloftError};

use super::spinlock::Spinlock;
use super::WaitQueue;

type Table = HashMap<usize, Arc<WaitQueue>, ahash::RandomState>;

static TABLE: OnceLock<Spinlock<Table>> = OnceLock::new();

fn table() -> &'static Spinlock<Table> {
    // `ahash` is built with `default-features = false` (no OS RNG source),
    // so `RandomState` has no `Default` impl; fixed seeds are fine here —
    // this table only needs hash-quality distribution, not
    // DoS-resistance against an adversarial choice of futex addresses.
    TABLE.get_or_init(|| Spinlock::new(HashMap::with_hasher(ahash::RandomState::with_seeds(0, 0, 0, 0))))
}

fn queue_for(addr: usize) -> Arc<WaitQueue> {
    let mut table = table().lock();
    table.entry(addr).or_insert_with(|| Arc::new(WaitQueue::new())).clone()
}

/// Blocks the calling task until `wake` is called on this address. Returns
/// `Err(SkyloftError::TryAgain)` without blocking if `*word` no longer
/// equals `expected` by the time the task would have blocked (mirroring
/// Linux `FUTEX_WAIT`'s atomic recheck, which fails `EAGAIN` on mismatch
/// rather than silently proceeding to sleep on a condition that already
/// changed).
pub fn wait(word: &AtomicU32, expected: u32) -> Result<()> {
    let addr = word as *const AtomicU32 as usize;
    let queue = queue_for(addr);
    if word.load(Ordering::Acquire) != expected {
        return Err(SkyloftError::TryAgain);
    }
    // No separate "state lock" to release here (the check above is the
    // condition itself); push then block, same race protected by the
    // pending-wakeup flag on `Task` as every other primitive in this
    // module.
    queue.wait_and_release(|| {});
    Ok(())
}

/// Wakes up to `count` tasks waiting on `word`'s address.
pub fn wake(word: &AtomicU32, count: usize) -> usize {
    let addr = word as *const AtomicU32 as usize;
    let Some(queue) = table().lock().get(&addr).cloned() else {
        return 0;
    };
    let mut woken = 0;
    while woken < count && queue.wake_one() {
        woken += 1;
    }
    woken
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_expected_value_fails_fast_without_blocking() {
        let word = AtomicU32::new(5);
        match wait(&word, 4) {
            Err(SkyloftError::TryAgain) => {}
            other => panic!("expected TryAgain, got {other:?}"),
        }
    }

    #[test]
    fn wake_on_unknown_address_is_a_harmless_no_op() {
        let word = AtomicU32::new(0);
        assert_eq!(wake(&word, 1), 0);
    }
}
