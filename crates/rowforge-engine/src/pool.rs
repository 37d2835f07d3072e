use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::worker::WorkerHandle;

/// Idle worker handles keyed by plugin id.
///
/// Handles move out on checkout (exclusive ownership, never aliased) and
/// back in only when idle. The lock guards plain map operations and is
/// never held across an await point.
#[derive(Default)]
pub struct WorkerPool {
    idle: Mutex<BTreeMap<String, Vec<WorkerHandle>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an idle handle for `plugin_id`, if any.
    pub fn checkout(&self, plugin_id: &str) -> Option<WorkerHandle> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.get_mut(plugin_id)?.pop()
    }

    /// Return a handle for reuse across rows of the same plugin.
    ///
    /// Anything not idle (condemned, mid-flight at cancellation) is
    /// dropped instead of recycled.
    pub fn checkin(&self, handle: WorkerHandle) {
        if !handle.is_idle() {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.entry(handle.plugin_id().to_string())
            .or_default()
            .push(handle);
    }

    pub fn idle_count(&self, plugin_id: &str) -> usize {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.get(plugin_id).map(|handles| handles.len()).unwrap_or(0)
    }

    /// Dispose every pooled handle.
    pub fn shutdown(&self) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        for handles in idle.values_mut() {
            for handle in handles.iter_mut() {
                handle.dispose();
            }
        }
        idle.clear();
    }
}
