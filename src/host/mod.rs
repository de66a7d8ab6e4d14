//! Capability contracts consumed by the provisioning core.
//!
//! The host mail client exposes three independently failing surfaces:
//! the profile registry, the administrative session, and the logon
//! session. Each is modeled as a narrow object-safe trait so the
//! orchestrator and its state machine can run against fakes; see
//! [`memory`] for the in-memory host used by the test suite and the
//! CLI's simulate mode. Resource release is tied to `Drop` on every
//! handle type.

pub mod memory;

use crate::error::Result;
use crate::model::ids::{EntryId, ServiceId};

/// Provider name of the ActiveSync message service.
pub const PROVIDER_EAS: &str = "EAS";

// ── Service property tags ───────────────────────────────────────

/// Offline-store configuration flags (long).
pub const PR_PST_CONFIG_FLAGS: u32 = 0x6770_0003;
/// Offline-store file path (unicode).
pub const PR_PROFILE_OFFLINE_STORE_PATH: u32 = 0x6610_001F;
/// Service display name (unicode).
pub const PR_DISPLAY_NAME: u32 = 0x3001_001F;
/// Protected mailbox credential blob (binary).
pub const PR_PROFILE_SECURE_MAILBOX: u32 = 0x67F0_0102;
/// Service resource flags (long).
pub const PR_RESOURCE_FLAGS: u32 = 0x3059_0003;
/// Undocumented tag the client requires before it treats the service as
/// fully configured. Meaning unknown; the value is fixed.
pub const PR_SERVICE_EXTRA_CONFIG: u32 = 0x6706_0003;
/// Entry identifier of the service's message store (binary).
pub const PR_ENTRYID: u32 = 0x0FFF_0102;

/// Unicode offline stores.
pub const PST_CONFIG_UNICODE: u32 = 2;
/// Fixed value for [`PR_SERVICE_EXTRA_CONFIG`].
pub const SERVICE_EXTRA_CONFIGURED: u32 = 4;

// ── Resource flags ──────────────────────────────────────────────

pub const SERVICE_CREATE_WITH_STORE: u32 = 0x0000_0004;
pub const SERVICE_NO_PRIMARY_IDENTITY: u32 = 0x0000_0020;

// ── Store open flags ────────────────────────────────────────────

pub const MDB_NO_DIALOG: u32 = 0x0000_0001;
pub const MDB_WRITE: u32 = 0x0000_0004;
pub const MAPI_DEFERRED_ERRORS: u32 = 0x0000_0008;

/// Status returned by `AdminServices` when the named profile does not
/// exist. Recognized and surfaced as a dedicated user-facing error.
pub const MAPI_E_LOGON_FAILED: u32 = 0x8004_0111;

/// One typed value in the registry-like profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    Text(String),
    Number(u32),
    Bytes(Vec<u8>),
}

/// An open key in the profile store. Dropping the handle releases it.
pub trait RegistryKey {
    /// Read a text value. `Ok(None)` when the value is absent.
    fn get_text(&self, name: &str) -> Result<Option<String>>;
    /// Read a 32-bit value. `Ok(None)` when the value is absent.
    fn get_number(&self, name: &str) -> Result<Option<u32>>;
    /// Read a raw binary value. `Ok(None)` when the value is absent.
    fn get_bytes(&self, name: &str) -> Result<Option<Vec<u8>>>;
    /// Write a value, overwriting any existing value of the same name.
    fn set_value(&self, name: &str, value: RegistryValue) -> Result<()>;
}

/// Open/create access to the hierarchical profile store.
pub trait RegistryStore {
    /// Open an existing key. `Ok(None)` when the key is absent.
    fn open_key(&self, path: &str) -> Result<Option<Box<dyn RegistryKey>>>;
    /// Open a key, creating it if absent.
    fn create_key(&self, path: &str) -> Result<Box<dyn RegistryKey>>;
}

/// One property in a service configuration list.
#[derive(Debug, Clone)]
pub struct ServiceProperty {
    pub tag: u32,
    pub value: PropertyValue,
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Long(u32),
    Unicode(String),
    Binary(Vec<u8>),
}

/// Property section of one configured service.
pub trait ProfileSection {
    /// Read the store entry identifier. `Ok(None)` when the property is
    /// absent.
    fn entry_id(&self) -> Result<Option<Vec<u8>>>;
}

/// Administrative capability over one profile's services.
pub trait ServiceAdmin {
    /// Create a message-service instance for the given provider.
    fn create_service(&mut self, provider: &str, display_name: &str) -> Result<ServiceId>;
    /// Apply a property list to a previously created service.
    fn configure_service(
        &mut self,
        service: &ServiceId,
        props: &[ServiceProperty],
    ) -> Result<()>;
    /// Open the property section of a service.
    fn open_profile_section(&mut self, service: &ServiceId) -> Result<Box<dyn ProfileSection>>;
}

/// An opaque open message store. Dropping the handle releases it.
pub trait MessageStore {}

/// A logged-on session against one profile.
pub trait MailSession {
    /// Open the message store identified by `entry_id`. This call is
    /// what forces the host client to materialize the offline data file.
    fn open_store(&mut self, entry_id: &EntryId, flags: u32) -> Result<Box<dyn MessageStore>>;
    /// End the session. Idempotent; also performed on drop.
    fn logoff(&mut self);
}

/// The host mail client process.
pub trait HostClient {
    /// Process-wide mail subsystem initialization. Paired with
    /// [`teardown`](HostClient::teardown) via
    /// [`MailSubsystem`](crate::subsystem::MailSubsystem).
    fn initialize(&self) -> Result<()>;
    fn teardown(&self);
    /// Obtain the service-admin capability for a named profile. Fails
    /// with status [`MAPI_E_LOGON_FAILED`] when the profile is absent.
    fn admin_services(&self, profile: &str) -> Result<Box<dyn ServiceAdmin>>;
    /// Log on to a named profile.
    fn logon(&self, profile: &str) -> Result<Box<dyn MailSession>>;
}

/// OS primitive protecting a secret for the current user.
///
/// The output is only decryptable by the same OS user on the same
/// machine; callers must not assume portability.
pub trait CredentialProtector {
    fn protect(&self, plaintext: &[u8], label: &str) -> Result<Vec<u8>>;
}
