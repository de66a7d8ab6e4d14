//! Process-wide mail-subsystem lifetime, modeled as an explicit handle
//! instead of ambient global state.
//!
//! The host client's mail subsystem must be initialized once per process
//! and torn down exactly once. Acquisition is scoped: each
//! [`SubsystemGuard`] holds one reference, teardown runs when the last
//! guard drops, and releasing more often than acquiring aborts the
//! process. A failed store finalization poisons the subsystem; no
//! further acquisition is possible within the same process.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::host::HostClient;

struct SubsystemState {
    client: Rc<dyn HostClient>,
    live: Cell<isize>,
    poisoned: Cell<bool>,
}

/// Handle to the process-wide mail subsystem.
#[derive(Clone)]
pub struct MailSubsystem {
    state: Rc<SubsystemState>,
}

impl MailSubsystem {
    pub fn new(client: Rc<dyn HostClient>) -> Self {
        Self {
            state: Rc::new(SubsystemState {
                client,
                live: Cell::new(0),
                poisoned: Cell::new(false),
            }),
        }
    }

    /// Acquire one reference, initializing the subsystem on the first.
    pub fn acquire(&self) -> Result<SubsystemGuard> {
        if self.state.poisoned.get() {
            return Err(ProvisionError::Subsystem(
                "poisoned by an earlier finalization failure",
            ));
        }
        if self.state.live.get() == 0 {
            self.state.client.initialize()?;
            debug!("mail subsystem initialized");
        }
        self.state.live.set(self.state.live.get() + 1);
        Ok(SubsystemGuard {
            state: Rc::clone(&self.state),
        })
    }

    /// Mark the subsystem unusable for the rest of the process.
    pub fn poison(&self) {
        self.state.poisoned.set(true);
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.poisoned.get()
    }
}

/// One scoped reference to the initialized subsystem.
pub struct SubsystemGuard {
    state: Rc<SubsystemState>,
}

impl Drop for SubsystemGuard {
    fn drop(&mut self) {
        let live = self.state.live.get() - 1;
        self.state.live.set(live);
        if live < 0 {
            // Torn down more often than initialized; the process state
            // is unrecoverable.
            std::process::abort();
        }
        if live == 0 && !self.state.poisoned.get() {
            self.state.client.teardown();
            debug!("mail subsystem torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_acquire_release_balanced() {
        let host = MemoryHost::new();
        let subsystem = MailSubsystem::new(host.client());
        {
            let _outer = subsystem.acquire().unwrap();
            let _inner = subsystem.acquire().unwrap();
            assert_eq!(host.init_count(), 1);
            assert_eq!(host.teardown_count(), 0);
        }
        assert_eq!(host.teardown_count(), 1);
    }

    #[test]
    fn test_reinitializes_after_full_release() {
        let host = MemoryHost::new();
        let subsystem = MailSubsystem::new(host.client());
        drop(subsystem.acquire().unwrap());
        drop(subsystem.acquire().unwrap());
        assert_eq!(host.init_count(), 2);
        assert_eq!(host.teardown_count(), 2);
    }

    #[test]
    fn test_poisoned_subsystem_refuses_acquisition() {
        let host = MemoryHost::new();
        let subsystem = MailSubsystem::new(host.client());
        let guard = subsystem.acquire().unwrap();
        subsystem.poison();
        assert!(subsystem.is_poisoned());
        assert!(matches!(
            subsystem.acquire(),
            Err(ProvisionError::Subsystem(_))
        ));
        // Teardown is skipped for a poisoned subsystem.
        drop(guard);
        assert_eq!(host.teardown_count(), 0);
    }
}
