//! Deferred full-reload coordination.
//!
//! A reload is a flag, not a thread: anyone (including a plugin, through
//! the host call table, from inside an event handler) may request one, and
//! the host driver executes it at its designated safe point, never nested
//! inside dispatch, so the module registry is never rebuilt out from under
//! an in-progress iteration.

use std::path::PathBuf;

use crate::error::LoadError;

/// The pending-reload flag.
#[derive(Default)]
pub struct ReloadCoordinator {
    pending: bool,
}

impl ReloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a reload for the next safe point. Idempotent.
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the flag, returning whether a reload was due.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Outcome of one reload pass. Per-module failures are collected, never
/// fatal: a module that fails to come back simply stays absent.
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Modules loaded again, in their original load order.
    pub reloaded: Vec<String>,
    /// Paths that failed to come back, with the stage that failed, in their
    /// original load order.
    pub failed: Vec<(PathBuf, LoadError)>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_idempotent_and_take_consumes() {
        let mut coordinator = ReloadCoordinator::new();
        assert!(!coordinator.is_pending());
        assert!(!coordinator.take());

        coordinator.request();
        coordinator.request();
        assert!(coordinator.is_pending());

        assert!(coordinator.take());
        assert!(!coordinator.is_pending());
        assert!(!coordinator.take());
    }

    #[test]
    fn report_cleanliness_tracks_failures() {
        let mut report = ReloadReport::default();
        assert!(report.is_clean());

        report.failed.push((
            PathBuf::from("/plugins/gone.so"),
            LoadError::NotFound(PathBuf::from("/plugins/gone.so")),
        ));
        assert!(!report.is_clean());
    }
}
