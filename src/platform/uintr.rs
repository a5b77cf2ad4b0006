//! User-interrupt preemption backend probe.
//!
//! Grounded in `original_source/libos/platform/uintr.c`: real `uintr`
//! delivery needs Intel silicon (Sapphire Rapids+) and a patched kernel
//! that exposes `uintr_register_handler`/`senduipi`. Neither is available
//! in a portable crate, so this module only exposes the capability probe;
//! [`crate::preempt`] always falls back to the host-timer backend (spec
//! §4.5, option 1) when [`is_available`] returns `false`, which it always
//! does outside the `uintr` feature's intended (unimplemented) hardware
//! path.
pub fn is_available() -> bool {
    false
}
