//! Identifiers for the cyclic task/worker/app graph.
//!
//! The source graph (task ⇄ kthread ⇄ proc) is modeled as small `Copy`
//! indices rather than pointer ownership, per the arena-and-indices design
//! note: a `TaskId`, `CoreId` or `AppId` is a short-lived key into whichever
//! arena currently owns the referenced object, never a pointer with its own
//! lifetime.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Index of a logical, pinned CPU (a "worker").
///
/// `repr(transparent)`: passed by value across the `extern "C"` context
/// switch entry points in [`crate::task::context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoreId(pub u32);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Identifier of an app (process) sharing the CPU pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app{}", self.0)
    }
}

/// The daemon/host app id that owns CPUs nobody else has claimed.
pub const DAEMON_APP: AppId = AppId(0);

/// Monotonic, process-wide unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Allocates the next globally unique task id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task{}", self.0)
    }
}
