//! Two CPUs under the FIFO-steal policy, each running one task that yields
//! repeatedly while bumping a shared counter. No interleaving should ever
//! corrupt the count, and both tasks should actually make progress.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use skyloft::{Config, CoreId, PolicyKind};

const ITERS: u32 = 10;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static A_DONE: AtomicBool = AtomicBool::new(false);
static B_DONE: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn task_a(_arg: usize) {
    skyloft::task_spawn_oncpu(CoreId(1), task_b, 0).expect("spawn task B");
    for _ in 0..ITERS {
        COUNTER.fetch_add(1, Ordering::AcqRel);
        skyloft::task_yield();
    }
    A_DONE.store(true, Ordering::Release);
}

unsafe extern "C" fn task_b(_arg: usize) {
    for _ in 0..ITERS {
        COUNTER.fetch_add(1, Ordering::AcqRel);
        skyloft::task_yield();
    }
    B_DONE.store(true, Ordering::Release);
}

#[test]
fn fifo_yield_reaches_expected_count() {
    std::thread::spawn(|| {
        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1],
            app_main: Some((task_a, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(std::time::Duration::from_secs(5), || {
        A_DONE.load(Ordering::Acquire) && B_DONE.load(Ordering::Acquire)
    });

    assert_eq!(COUNTER.load(Ordering::Acquire), 2 * ITERS);
}
