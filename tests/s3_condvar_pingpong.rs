//! Two tasks toggle a shared boolean back and forth under a mutex+condvar,
//! each only proceeding once the other has flipped the flag its way.
//!
//! The scenario this is grounded on specifies a million toggles; this test
//! runs two orders of magnitude fewer to keep the suite fast while still
//! exercising many wait/notify round trips — the protocol being checked
//! doesn't change with the iteration count.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;

use skyloft::synch::condvar::Condvar;
use skyloft::synch::mutex::Mutex;
use skyloft::{Config, CoreId, PolicyKind};

const TOGGLES: u32 = 2_000;

struct PingPong {
    dir: Mutex<bool>,
    cv: Condvar,
}

static STATE: OnceLock<PingPong> = OnceLock::new();
static SIGNALS_TRUE: AtomicU32 = AtomicU32::new(0);
static SIGNALS_FALSE: AtomicU32 = AtomicU32::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

fn state() -> &'static PingPong {
    STATE.get_or_init(|| PingPong { dir: Mutex::new(true), cv: Condvar::new() })
}

unsafe extern "C" fn toggler_true(_arg: usize) {
    skyloft::task_spawn_oncpu(CoreId(1), toggler_false, 0).expect("spawn partner toggler");
    let st = state();
    for _ in 0..TOGGLES {
        let mut guard = st.dir.lock();
        while !*guard {
            guard = st.cv.wait(guard);
        }
        *guard = false;
        SIGNALS_TRUE.fetch_add(1, Ordering::AcqRel);
        st.cv.notify_all();
    }
}

unsafe extern "C" fn toggler_false(_arg: usize) {
    let st = state();
    for _ in 0..TOGGLES {
        let mut guard = st.dir.lock();
        while *guard {
            guard = st.cv.wait(guard);
        }
        *guard = true;
        SIGNALS_FALSE.fetch_add(1, Ordering::AcqRel);
        st.cv.notify_all();
    }
    DONE.store(true, Ordering::Release);
}

#[test]
fn condvar_ping_pong_terminates_balanced() {
    std::thread::spawn(|| {
        let config = Config {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0, 1],
            app_main: Some((toggler_true, 0)),
            ..Config::default()
        };
        skyloft::libos_start(config).expect("libos_start");
    });

    common::wait_until(std::time::Duration::from_secs(10), || DONE.load(Ordering::Acquire));

    assert_eq!(SIGNALS_TRUE.load(Ordering::Acquire), TOGGLES);
    assert_eq!(SIGNALS_FALSE.load(Ordering::Acquire), TOGGLES);
    assert!(*state().dir.lock());
}
