//! 8 tasks spread across 4 CPUs contend on one mutex-guarded counter.
//! Every increment must be observed exactly once, regardless of contention.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;

use skyloft::synch::mutex::Mutex;
use skyloft::{Config, CoreId, PolicyKind};

const CYCLES: u32 = 1_000;
const WORKERS: u32 = 8;

static COUNTER: OnceLock<Mutex<u64>> = OnceLock::new();
static FINISHED: AtomicU32 = AtomicU32::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

fn counter() -> &'static Mutex<u64> {
    COUNTER.get_or_init(|| Mutex::new(0))
}

unsafe extern "C" fn worker(_arg: usize) {
    for _ in 0..CYCLES {
        let mut guard = counter().lock();
        *guard += 1;
    }
    if FINISHED.fetch_add(1, Ordering::AcqRel) + 1 == WORKERS {
        DONE.store(true, Ordering::Release);
    }
}

unsafe extern "C" fn driver(_arg: usize) {
    for cpu in 0..4u32 {
        skyloft::task_spawn_oncpu(CoreId(cpu), worker, 0).expect("spawn worker");
        skyloft::task_spawn_oncpu(CoreId(cpu), worker, 0).expect("spawn worker");
    }
    skyloft::task_exit(0);
}

#[test]
fn mutex_serializes_every_increment() {
    std::thread::spawn(|| {
        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1, 2, 3],
            app_main: Some((driver, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(std::time::Duration::from_secs(10), || DONE.load(Ordering::Acquire));

    assert_eq!(*counter().lock(), (WORKERS * CYCLES) as u64);
}
