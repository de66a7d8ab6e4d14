//! Centralized error types for easaccount.

use thiserror::Error;

/// All errors produced by the easaccount library.
///
/// Every variant carries enough context (originating call name, status
/// code, or registry path and operation) to build a diagnostic message.
/// None of these are retried internally; retry is a whole-process
/// re-invocation.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A required input field is missing or empty.
    #[error("field '{field}' not initialised")]
    Validation { field: &'static str },

    /// The named profile does not exist in the host client.
    ///
    /// This is the one error the CLI surfaces with a dedicated message
    /// and exit code.
    #[error("profile does not exist: {profile}")]
    AdministrationUnavailable { profile: String },

    /// The host client rejected a service configuration call.
    #[error("{call} failed with status {status:#010X}")]
    ConfigurationFailed { call: &'static str, status: u32 },

    /// The entry-identifier property was absent or empty after
    /// configuration. Fatal: the record must not be committed without it.
    #[error("entry identifier unavailable for the configured service")]
    EntryIdentifierUnavailable,

    /// Opening the message store failed, or the entry identifier was
    /// empty when finalization started.
    #[error("store open failed: {reason}")]
    StoreOpenFailed { reason: String },

    /// The OS credential-protection primitive failed.
    #[error("credential protection failed with status {status:#010X}")]
    CredentialProtection { status: u32 },

    /// A registry read/write failed. Includes the key path and the
    /// operation name for diagnosis.
    #[error("registry {op} failed for '{path}': status {status:#010X}")]
    Registry {
        path: String,
        op: &'static str,
        status: u32,
    },

    /// The requested account record does not exist.
    #[error("account record not found: {path}")]
    RecordNotFound { path: String },

    /// The sequential-id counter value is absent from the profile key.
    #[error("next-account-id counter missing under '{path}'")]
    CounterMissing { path: String },

    /// Appending one more id to a category index would exceed the fixed
    /// maximum buffer size.
    #[error("category index '{index}' buffer full, cannot append")]
    IndexBufferTooSmall { index: String },

    /// Any other host-client call failure, tagged with the call name.
    #[error("{call} failed with status {status:#010X}")]
    Host { call: &'static str, status: u32 },

    /// The mail subsystem has been poisoned by an earlier finalization
    /// failure and must not be reused within this process.
    #[error("mail subsystem unavailable: {0}")]
    Subsystem(&'static str),
}

/// Convenience alias for `Result<T, ProvisionError>`.
pub type Result<T> = std::result::Result<T, ProvisionError>;
