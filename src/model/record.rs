//! The persisted account record: registry value names and the field
//! subset read back when loading an existing account.

/// Registry value names inside one account subkey.
pub mod fields {
    pub const ACCOUNT_NAME: &str = "Account Name";
    pub const DISPLAY_NAME: &str = "Display Name";
    pub const SERVER_URL: &str = "EAS Server URL";
    pub const USERNAME: &str = "EAS User";
    pub const EMAIL: &str = "Email";
    /// Email of the account this share was derived from.
    pub const EMAIL_ORIGINAL: &str = "KOE Share For";
    pub const PASSWORD: &str = "EAS Password";
    pub const SYNC_ONE_MONTH: &str = "EAS SyncSlider";
    pub const SHOW_REMINDERS: &str = "KOE Reminders";
    pub const CLSID: &str = "clsid";
    pub const SERVICE_UID: &str = "Service UID";
    pub const STORE_ENTRY_ID: &str = "EAS Store EID";
    pub const MINI_UID: &str = "Mini UID";
}

/// Class identifier the host client expects on every mail account record.
pub const CLSID_MAIL_ACCOUNT: &str = "{ED475415-B0D6-11D2-8C3B-00104B2A6676}";

/// The documented field subset of a persisted account record, as read by
/// [`ProfileKeyStore::open_account`](crate::keystore::ProfileKeyStore::open_account).
///
/// The full record (service uid, store entry id, mini uid, flags) is only
/// ever written, never read back by this tool.
#[derive(Debug, Clone)]
pub struct MailAccountRecord {
    pub account_name: String,
    pub display_name: String,
    pub email: String,
    pub server: String,
    pub username: String,
    /// Tagged ciphertext blob, stored verbatim.
    pub encrypted_password: Vec<u8>,
}
