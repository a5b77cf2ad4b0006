//! `WaitGroup` (spec §4.7, P5 "waitgroup liveness") and `Barrier` aren't
//! exercised by any of the other scenario tests; this one drives both
//! directly under a single runtime.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;

use skyloft::synch::barrier::Barrier;
use skyloft::synch::waitgroup::WaitGroup;
use skyloft::{Config, CoreId, PolicyKind};

const WORKERS: u32 = 6;

static WG: OnceLock<WaitGroup> = OnceLock::new();
static WORKERS_DONE: AtomicU32 = AtomicU32::new(0);
static WAIT_RETURNED_EARLY: AtomicBool = AtomicBool::new(false);
static WG_PHASE_DONE: AtomicBool = AtomicBool::new(false);

static BARRIER: OnceLock<Barrier> = OnceLock::new();
static ARRIVED: AtomicU32 = AtomicU32::new(0);
static SAW_INCOMPLETE_ARRIVAL: AtomicBool = AtomicBool::new(false);
static LEADER_COUNT: AtomicU32 = AtomicU32::new(0);
static BARRIER_PHASE_DONE: AtomicU32 = AtomicU32::new(0);

fn wg() -> &'static WaitGroup {
    WG.get_or_init(WaitGroup::new)
}

fn barrier() -> &'static Barrier {
    BARRIER.get_or_init(|| Barrier::new(WORKERS as usize))
}

unsafe extern "C" fn wg_worker(_arg: usize) {
    // A little busy-work so `wg.wait()` below has something to actually
    // wait on rather than racing a no-op.
    for _ in 0..50 {
        skyloft::task_yield();
    }
    WORKERS_DONE.fetch_add(1, Ordering::AcqRel);
    wg().done();
}

unsafe extern "C" fn barrier_worker(_arg: usize) {
    ARRIVED.fetch_add(1, Ordering::AcqRel);
    let result = barrier().wait();
    if ARRIVED.load(Ordering::Acquire) != WORKERS {
        SAW_INCOMPLETE_ARRIVAL.store(true, Ordering::Release);
    }
    if result.is_leader() {
        LEADER_COUNT.fetch_add(1, Ordering::AcqRel);
    }
    BARRIER_PHASE_DONE.fetch_add(1, Ordering::AcqRel);
}

unsafe extern "C" fn driver(_arg: usize) {
    wg().add(WORKERS as i64);
    for cpu in 0..WORKERS {
        skyloft::task_spawn_oncpu(CoreId(cpu % 2), wg_worker, 0).expect("spawn wg worker");
    }
    wg().wait();
    if WORKERS_DONE.load(Ordering::Acquire) != WORKERS {
        WAIT_RETURNED_EARLY.store(true, Ordering::Release);
    }
    WG_PHASE_DONE.store(true, Ordering::Release);

    for cpu in 0..WORKERS {
        skyloft::task_spawn_oncpu(CoreId(cpu % 2), barrier_worker, 0).expect("spawn barrier worker");
    }
}

#[test]
fn waitgroup_and_barrier_synchronize_correctly() {
    std::thread::spawn(|| {
        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1],
            app_main: Some((driver, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(std::time::Duration::from_secs(5), || WG_PHASE_DONE.load(Ordering::Acquire));
    assert!(!WAIT_RETURNED_EARLY.load(Ordering::Acquire));

    common::wait_until(std::time::Duration::from_secs(5), || {
        BARRIER_PHASE_DONE.load(Ordering::Acquire) == WORKERS
    });
    assert!(!SAW_INCOMPLETE_ARRIVAL.load(Ordering::Acquire));
    assert_eq!(LEADER_COUNT.load(Ordering::Acquire), 1);
}
