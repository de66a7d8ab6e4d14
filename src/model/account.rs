//! Account profile input and the shared-mailbox composition rule.

use crate::credential::EncryptedCredential;
use crate::error::{ProvisionError, Result};
use crate::model::record::MailAccountRecord;

/// Everything the provisioning run needs to know about the account to
/// create.
///
/// Every field except `password` must be non-empty before provisioning
/// begins; `password` may be empty only when a pre-protected credential
/// is already present.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub profile_name: String,
    pub client_version: String,
    pub account_name: String,
    pub display_name: String,
    pub email: String,
    /// Email of the account this share was derived from, if any.
    pub email_original: Option<String>,
    pub server: String,
    pub username: String,
    pub password: String,
    /// Pre-protected credential reused from an existing record. When
    /// present the protection step is skipped entirely.
    pub encrypted_credential: Option<EncryptedCredential>,
    /// Override for the offline-store folder. Must end with a path
    /// separator; resolved to the client's local data folder when absent.
    pub data_folder: Option<String>,
    /// Restrict the sync window to one month.
    pub sync_one_month: bool,
    /// Show reminders for this mailbox.
    pub show_reminders: bool,
}

impl AccountProfile {
    /// Compose a shared-mailbox profile on top of an existing account.
    ///
    /// The share authenticates with the existing account's credential:
    /// `username` becomes `<existing>#<share>`, the existing email is
    /// kept as the original, and the share target's email becomes both
    /// the email and the account name.
    pub fn share_of(
        existing: &MailAccountRecord,
        profile_name: &str,
        client_version: &str,
        share_username: &str,
        share_email: &str,
        display_name: &str,
    ) -> Self {
        Self {
            profile_name: profile_name.to_string(),
            client_version: client_version.to_string(),
            account_name: share_email.to_string(),
            display_name: display_name.to_string(),
            email: share_email.to_string(),
            email_original: Some(existing.email.clone()),
            server: existing.server.clone(),
            username: format!("{}#{}", existing.username, share_username),
            password: String::new(),
            encrypted_credential: Some(EncryptedCredential::from_bytes(
                existing.encrypted_password.clone(),
            )),
            data_folder: None,
            sync_one_month: true,
            show_reminders: true,
        }
    }

    /// Check that every required field is initialised.
    ///
    /// The password is required unless a pre-protected credential is
    /// already present.
    pub fn validate(&self) -> Result<()> {
        fn require(field: &'static str, value: &str) -> Result<()> {
            if value.is_empty() {
                return Err(ProvisionError::Validation { field });
            }
            Ok(())
        }

        require("profileName", &self.profile_name)?;
        require("clientVersion", &self.client_version)?;
        require("accountName", &self.account_name)?;
        require("displayName", &self.display_name)?;
        require("email", &self.email)?;
        require("server", &self.server)?;
        require("username", &self.username)?;
        match &self.encrypted_credential {
            Some(cred) if !cred.is_empty() => Ok(()),
            _ => require("password", &self.password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_record() -> MailAccountRecord {
        MailAccountRecord {
            account_name: "e1@x.com".into(),
            display_name: "Mailbox One".into(),
            email: "e1@x.com".into(),
            server: "https://mail.x.com/Microsoft-Server-ActiveSync".into(),
            username: "u1".into(),
            encrypted_password: vec![2, 0xDE, 0xAD],
        }
    }

    #[test]
    fn test_share_composition() {
        let share = AccountProfile::share_of(
            &existing_record(),
            "P",
            "16",
            "u2",
            "e2@x.com",
            "Shared Mailbox",
        );
        assert_eq!(share.username, "u1#u2");
        assert_eq!(share.email_original.as_deref(), Some("e1@x.com"));
        assert_eq!(share.email, "e2@x.com");
        assert_eq!(share.account_name, "e2@x.com");
        assert_eq!(share.display_name, "Shared Mailbox");
        assert_eq!(share.server, existing_record().server);
    }

    #[test]
    fn test_share_carries_credential() {
        let share =
            AccountProfile::share_of(&existing_record(), "P", "16", "u2", "e2@x.com", "D");
        let cred = share.encrypted_credential.expect("credential carried over");
        assert_eq!(cred.as_bytes(), &[2, 0xDE, 0xAD]);
        // The plaintext password stays empty and still validates.
        let share =
            AccountProfile::share_of(&existing_record(), "P", "16", "u2", "e2@x.com", "D");
        assert!(share.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_field() {
        let mut share =
            AccountProfile::share_of(&existing_record(), "P", "16", "u2", "e2@x.com", "D");
        share.server.clear();
        match share.validate() {
            Err(ProvisionError::Validation { field }) => assert_eq!(field, "server"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_requires_password_without_credential() {
        let mut share =
            AccountProfile::share_of(&existing_record(), "P", "16", "u2", "e2@x.com", "D");
        share.encrypted_credential = None;
        match share.validate() {
            Err(ProvisionError::Validation { field }) => assert_eq!(field, "password"),
            other => panic!("expected validation error, got {other:?}"),
        }
        share.password = "secret".into();
        assert!(share.validate().is_ok());
    }
}
