//! Two worker CPUs each sleep in a tight loop; no sleep may return before
//! its deadline, and overall throughput shouldn't degrade far from the
//! requested rate.
//!
//! Scaled down from the scenario's 1,000 sleeps per CPU to 200, to keep
//! the suite under a couple of seconds; the per-sleep correctness check
//! (never returns early) and the throughput ratio are unaffected by count.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use skyloft::{Config, CoreId, PolicyKind};

const ITERS: u32 = 200;
const SLEEP_US: u64 = 2_000;

static EARLY_WAKE: AtomicBool = AtomicBool::new(false);
static FINISHED: AtomicU32 = AtomicU32::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn sleeper(_arg: usize) {
    for _ in 0..ITERS {
        let before = skyloft::platform::now_micros();
        skyloft::sleep(Duration::from_micros(SLEEP_US));
        let after = skyloft::platform::now_micros();
        if after < before + SLEEP_US {
            EARLY_WAKE.store(true, Ordering::Release);
        }
    }
    if FINISHED.fetch_add(1, Ordering::AcqRel) + 1 == 2 {
        DONE.store(true, Ordering::Release);
    }
}

unsafe extern "C" fn driver(_arg: usize) {
    skyloft::task_spawn_oncpu(CoreId(1), sleeper, 0).expect("spawn sleeper");
    sleeper(0);
}

#[test]
fn timer_sleeps_never_fire_early_and_keep_pace() {
    let start = Instant::now();
    std::thread::spawn(|| {
        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1],
            app_main: Some((driver, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(Duration::from_secs(30), || DONE.load(Ordering::Acquire));
    let elapsed = start.elapsed();

    assert!(!EARLY_WAKE.load(Ordering::Acquire));

    let completed = 2 * ITERS;
    let throughput = completed as f64 / elapsed.as_secs_f64();
    let ideal = completed as f64 / (ITERS as f64 * SLEEP_US as f64 / 1_000_000.0);
    assert!(
        throughput >= 0.5 * ideal,
        "throughput {throughput:.1}/s fell far short of the ideal {ideal:.1}/s"
    );
}
