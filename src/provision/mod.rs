//! The provisioning protocol: service creation, store finalization, and
//! the orchestrating state machine.

pub mod finalize;
pub mod orchestrator;
pub mod service;

pub use orchestrator::{ProvisionReceipt, Provisioner};

use std::fmt;

/// The strictly forward provisioning states. There are no loops and no
/// transitions backwards; any step's failure ends the run after that
/// step's local cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisionState {
    Validated,
    PathResolved,
    AdministrationOpen,
    CredentialReady,
    ServiceCreated,
    ServiceConfigured,
    EntryIdentifierResolved,
    SlotAllocated,
    RecordWritten,
    SlotCommitted,
    /// Terminal success.
    StoreFinalized,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validated => "validated",
            Self::PathResolved => "path-resolved",
            Self::AdministrationOpen => "administration-open",
            Self::CredentialReady => "credential-ready",
            Self::ServiceCreated => "service-created",
            Self::ServiceConfigured => "service-configured",
            Self::EntryIdentifierResolved => "entry-identifier-resolved",
            Self::SlotAllocated => "slot-allocated",
            Self::RecordWritten => "record-written",
            Self::SlotCommitted => "slot-committed",
            Self::StoreFinalized => "store-finalized",
        };
        f.write_str(name)
    }
}
