//! Shared polling helper for the scenario tests. Each `tests/*.rs` file is
//! its own process, since [`skyloft::libos_start`] owns a process-wide
//! runtime singleton and only tolerates being called once.

use std::time::{Duration, Instant};

/// Polls `cond` until it returns `true` or `timeout` elapses, panicking in
/// the latter case. Runtime scenarios signal completion through a static
/// flag rather than a join handle, since the worker thread driving them
/// never returns.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    loop {
        if cond() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("condition not satisfied within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
