//! App bootstrap: the shared-memory control region each app maps to learn
//! which CPUs it owns, and the process-wide table of registered apps (spec
//! §4.11).
//!
//! Grounded in `original_source/libos/control.c`'s `control_hdr`/`proc`
//! structures; adapted from a cross-process `/dev/shm` mapping (out of
//! scope for a single host process, spec §1's NIC/iokernel boundary) into
//! an in-process table every app-owning thread shares directly, since
//! there is only one address space to coordinate within here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::{Result, SkyloftError};
use crate::id::{AppId, CoreId, DAEMON_APP};

/// Which CPUs an app currently owns, mirroring the control region's
/// `cpu_bitmap` field (spec §4.11).
#[derive(Debug, Clone)]
pub struct AppEntry {
    pub id: AppId,
    pub name: String,
    pub cpus: Vec<CoreId>,
}

/// Process-wide registry of apps sharing the CPU pool, and the single
/// source of truth for "who owns this CPU right now" outside of the
/// per-CPU [`crate::platform::CpuSlot`] handoff state itself.
#[derive(Default)]
pub struct AppTable {
    apps: Mutex<HashMap<AppId, AppEntry>>,
    next_id: AtomicU32,
}

impl AppTable {
    pub fn new() -> Self {
        let table = Self { apps: Mutex::new(HashMap::new()), next_id: AtomicU32::new(1) };
        table.apps.lock().unwrap().insert(
            DAEMON_APP,
            AppEntry { id: DAEMON_APP, name: "daemon".to_string(), cpus: Vec::new() },
        );
        table
    }

    pub fn register(&self, name: impl Into<String>, cpus: Vec<CoreId>) -> AppId {
        let id = AppId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.apps.lock().unwrap().insert(id, AppEntry { id, name: name.into(), cpus });
        id
    }

    pub fn unregister(&self, id: AppId) -> Result<()> {
        self.apps
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(SkyloftError::InvalidArgument("unknown app id"))
    }

    /// Whether `id` is still a registered app (hasn't been unregistered).
    pub fn contains(&self, id: AppId) -> bool {
        self.apps.lock().unwrap().contains_key(&id)
    }

    pub fn owner_of(&self, cpu: CoreId) -> Option<AppId> {
        self.apps
            .lock()
            .unwrap()
            .values()
            .find(|app| app.cpus.contains(&cpu))
            .map(|app| app.id)
    }

    pub fn cpus_of(&self, id: AppId) -> Vec<CoreId> {
        self.apps.lock().unwrap().get(&id).map(|a| a.cpus.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_owns_nothing_by_default() {
        let table = AppTable::new();
        assert_eq!(table.owner_of(CoreId(0)), None);
    }

    #[test]
    fn register_and_lookup_roundtrip() {
        let table = AppTable::new();
        let id = table.register("worker", vec![CoreId(1), CoreId(2)]);
        assert_eq!(table.owner_of(CoreId(2)), Some(id));
        assert_eq!(table.cpus_of(id).len(), 2);
    }
}
