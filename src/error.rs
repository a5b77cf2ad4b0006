//! Crate-wide error type.
//!
//! Grounded in `original_source/include/skyloft/global.h`'s error-code
//! table and spec §7: the first four kinds here propagate as ordinary
//! `Result` values, `Busy`/`ChannelEmpty` are expected control flow, and
//! `Unrecoverable` logs and aborts the process (see [`abort_unrecoverable`]).

use thiserror::Error;

use crate::id::{CoreId, TaskId};

/// Errors surfaced across the public API.
#[derive(Debug, Error)]
pub enum SkyloftError {
    #[error("out of memory allocating a {0}")]
    OutOfMemory(&'static str),

    #[error("runqueue full on {0}")]
    QueueFull(CoreId),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no such task: {0}")]
    NoSuchTask(TaskId),

    #[error("try again")]
    TryAgain,

    #[error("operation would block on an exited app")]
    Busy,

    #[error("channel empty")]
    ChannelEmpty,

    #[error("unrecoverable runtime error: {0}")]
    Unrecoverable(&'static str),
}

pub type Result<T> = core::result::Result<T, SkyloftError>;

/// Logs `reason` at error level with a backtrace-shaped message and aborts
/// the process. Used for heap-consistency violations, double-unlocks, and
/// other conditions spec §7 calls unrecoverable.
#[cold]
#[inline(never)]
pub fn abort_unrecoverable(reason: &'static str) -> ! {
    log::error!("unrecoverable: {reason}");
    log::error!("backtrace: {}", std::backtrace::Backtrace::force_capture());
    std::process::abort();
}
