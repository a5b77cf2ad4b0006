//! A tiny `log`-facade logger that prefixes records with the current CPU.
//!
//! Grounded in `hermit-os-kernel/src/logging.rs`'s `KernelLogger`, which
//! filters by a static level and prefixes every line with `core_id()`. This
//! version reads its level from `RUST_LOG`-style filtering handled by
//! whatever `log::Log` the host process installed; if none is installed,
//! [`install`] wires up a minimal stderr logger with the same per-core
//! prefix convention so the runtime is useful standalone.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::scheduler::try_current_core_id;

struct SkyloftLogger {
    level: LevelFilter,
}

impl Log for SkyloftLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let core = try_current_core_id().map(|c| c.0 as i64).unwrap_or(-1);
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "[cpu{core}][{level}] {}", record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs the default logger at `level` unless the host process already
/// installed its own `log::Log` implementation (e.g. `env_logger`).
///
/// Idempotent: safe to call from every worker's startup path.
pub fn install(level: LevelFilter) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let logger = Box::new(SkyloftLogger { level });
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}
