//! A writer swaps a shared pointer once while readers keep dereferencing
//! it; the freed pointer's release callback must never run while a reader
//! could still be holding the old value, and must run exactly once.
//!
//! Scaled down from the scenario's 100 readers / 1,000,000 derefs each to
//! keep the suite fast; the safety property being checked (no reader ever
//! observes a value outside the two published ones, and the free callback
//! fires exactly once) doesn't depend on the iteration count.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use skyloft::{Config, CoreId, PolicyKind};

const READER_COUNT: u32 = 8;
const DEREFS_PER_READER: u32 = 2_000;
const FIRST: u32 = 1;
const SECOND: u32 = 2;

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static BAD_READ: AtomicBool = AtomicBool::new(false);
static FREE_COUNT: AtomicU32 = AtomicU32::new(0);
static READERS_DONE: AtomicU32 = AtomicU32::new(0);
static WRITER_DONE: AtomicBool = AtomicBool::new(false);

fn free_value(ptr: *mut u32) {
    FREE_COUNT.fetch_add(1, Ordering::AcqRel);
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

unsafe extern "C" fn reader(_arg: usize) {
    for i in 0..DEREFS_PER_READER {
        let addr = CURRENT.load(Ordering::Acquire);
        let value = unsafe { *(addr as *const u32) };
        if value != FIRST && value != SECOND {
            BAD_READ.store(true, Ordering::Release);
        }
        if i % 64 == 0 {
            skyloft::task_yield();
        }
    }
    READERS_DONE.fetch_add(1, Ordering::AcqRel);
}

unsafe extern "C" fn writer(_arg: usize) {
    for i in 0..READER_COUNT {
        skyloft::task_spawn_oncpu(CoreId(i % 2), reader, 0).expect("spawn reader");
    }
    // Let readers get going before the swap.
    for _ in 0..8 {
        skyloft::task_yield();
    }

    let new_value = Box::into_raw(Box::new(SECOND));
    let old = CURRENT.swap(new_value as usize, Ordering::AcqRel);
    skyloft::rcu_free(old as *mut u32, free_value);

    while READERS_DONE.load(Ordering::Acquire) < READER_COUNT {
        skyloft::task_yield();
    }
    WRITER_DONE.store(true, Ordering::Release);
}

#[test]
fn rcu_swap_is_observed_safely() {
    std::thread::spawn(|| {
        let first = Box::into_raw(Box::new(FIRST));
        CURRENT.store(first as usize, Ordering::Release);

        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1],
            app_main: Some((writer, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(std::time::Duration::from_secs(10), || WRITER_DONE.load(Ordering::Acquire));
    // The RCU worker drains on its own schedule; give it room to catch up.
    common::wait_until(std::time::Duration::from_secs(5), || FREE_COUNT.load(Ordering::Acquire) >= 1);

    assert!(!BAD_READ.load(Ordering::Acquire));
    assert_eq!(FREE_COUNT.load(Ordering::Acquire), 1);
}
