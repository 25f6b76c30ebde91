//! Quit-request plumbing: lets an embedding driver (or a Ctrl-C press)
//! ask a running [`crate::dnc::DnCManager`] to stop at the next worker
//! poll, surfaced as [`crate::ExitCode::QuitRequested`].
//!
//! # Note
//! [`InterruptHandle::new`] installs a global SIGINT handler and can
//! only be constructed once per process; constructing a second one
//! panics (the same restriction `ctrlc::set_handler` itself imposes).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "please stop" flag a [`crate::dnc::DnCManager`] polls
/// alongside its own timeout, and an [`InterruptHandle`] or a caller's
/// own code can set.
#[derive(Clone, Default)]
pub struct QuitFlag(Arc<AtomicBool>);

impl QuitFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Installs a process-wide Ctrl-C (SIGINT) handler that sets a
/// [`QuitFlag`] rather than terminating the process outright, so a
/// `DnCManager::solve` in progress gets the chance to report
/// `QuitRequested` instead of being killed mid-search.
pub struct InterruptHandle {
    flag: QuitFlag,
}

impl InterruptHandle {
    pub fn new() -> Self {
        let flag = QuitFlag::new();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || handler_flag.set()).expect("Error setting Ctrl-C handler");
        Self { flag }
    }

    pub fn flag(&self) -> QuitFlag {
        self.flag.clone()
    }

    pub fn requested(&self) -> bool {
        self.flag.is_set()
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_quit_flag_is_unset() {
        let flag = QuitFlag::new();
        assert!(!flag.is_set());
    }

    #[test]
    fn setting_a_clone_is_observed_through_the_original() {
        let flag = QuitFlag::new();
        let clone = flag.clone();
        clone.set();
        assert!(flag.is_set());
    }
}
