//! POSIX-style shims over the native API, for C callers or ported C
//! benchmarks that expect a pthread-shaped surface rather than this crate's
//! own (spec §4.12).

pub mod pthread;
