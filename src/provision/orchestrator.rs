//! Sequences one provisioning run across the two stores.
//!
//! The two stores share no transaction boundary. The ordering below is
//! what makes partial failure tolerable: nothing is written to the
//! registry before the entry identifier exists, the counter and the
//! category indexes are only touched after the record is complete, and
//! a finalization failure leaves the committed account in place (the
//! client opens the store lazily later).

use std::rc::Rc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::credential::EncryptedCredential;
use crate::error::{ProvisionError, Result};
use crate::host::{
    CredentialProtector, HostClient, RegistryKey, RegistryStore, RegistryValue,
};
use crate::keystore::ProfileKeyStore;
use crate::model::account::AccountProfile;
use crate::model::ids::{EntryId, ServiceId};
use crate::model::record::{fields, CLSID_MAIL_ACCOUNT};
use crate::paths;
use crate::provision::finalize::finalize_store;
use crate::provision::service::ServiceProvisioner;
use crate::provision::ProvisionState;
use crate::subsystem::MailSubsystem;

/// Outcome of a successful run.
#[derive(Debug)]
pub struct ProvisionReceipt {
    pub account_id: u32,
    pub service_id: ServiceId,
    pub entry_id: EntryId,
    pub store_path: String,
}

/// Owns the collaborator capabilities for the duration of one run. No
/// state is shared across runs except what the two stores persist.
pub struct Provisioner {
    client: Rc<dyn HostClient>,
    registry: Rc<dyn RegistryStore>,
    protector: Rc<dyn CredentialProtector>,
    subsystem: MailSubsystem,
}

impl Provisioner {
    pub fn new(
        client: Rc<dyn HostClient>,
        registry: Rc<dyn RegistryStore>,
        protector: Rc<dyn CredentialProtector>,
        subsystem: MailSubsystem,
    ) -> Self {
        Self {
            client,
            registry,
            protector,
            subsystem,
        }
    }

    /// Run the full provisioning sequence for one account.
    ///
    /// States advance strictly forward; the first failing step ends the
    /// run after its local cleanup, with no rollback of earlier steps.
    pub fn run(&self, profile: &AccountProfile) -> Result<ProvisionReceipt> {
        profile.validate()?;
        enter(ProvisionState::Validated);

        let data_folder = match &profile.data_folder {
            Some(folder) if !folder.is_empty() => folder.clone(),
            _ => paths::default_data_folder()
                .ok_or(ProvisionError::Validation { field: "dataFolder" })?,
        };
        let store_path =
            paths::offline_store_path(&data_folder, &profile.email, &profile.profile_name);
        enter(ProvisionState::PathResolved);

        let mut admin =
            ServiceProvisioner::open_administration(self.client.as_ref(), &profile.profile_name)?;
        enter(ProvisionState::AdministrationOpen);

        let credential = match &profile.encrypted_credential {
            Some(existing) if !existing.is_empty() => existing.clone(),
            _ => EncryptedCredential::protect(self.protector.as_ref(), &profile.password)?,
        };
        enter(ProvisionState::CredentialReady);

        let service_id = admin.create_service(&profile.display_name, &store_path)?;
        enter(ProvisionState::ServiceCreated);

        admin.configure_service(&service_id, &store_path, &profile.display_name, &credential)?;
        enter(ProvisionState::ServiceConfigured);

        let entry_id = admin.resolve_entry_identifier(&service_id)?;
        enter(ProvisionState::EntryIdentifierResolved);

        let keystore = ProfileKeyStore::new(
            self.registry.as_ref(),
            &profile.profile_name,
            &profile.client_version,
        );
        let (account_id, slot) = keystore.allocate_slot()?;
        enter(ProvisionState::SlotAllocated);

        write_record(
            &keystore,
            slot.as_ref(),
            profile,
            &credential,
            &service_id,
            &entry_id,
        )?;
        drop(slot);
        enter(ProvisionState::RecordWritten);

        keystore.commit_slot(account_id)?;
        enter(ProvisionState::SlotCommitted);

        finalize_store(
            self.client.as_ref(),
            &self.subsystem,
            &profile.profile_name,
            &entry_id,
            &store_path,
        )?;
        enter(ProvisionState::StoreFinalized);

        info!(
            account_id = format_args!("{account_id:08X}"),
            email = %profile.email,
            "account provisioned"
        );
        Ok(ProvisionReceipt {
            account_id,
            service_id,
            entry_id,
            store_path,
        })
    }
}

fn enter(state: ProvisionState) {
    debug!(%state, "provisioning state reached");
}

/// Populate the freshly allocated slot field by field. The optional
/// values are written only when set.
fn write_record(
    keystore: &ProfileKeyStore<'_>,
    slot: &dyn RegistryKey,
    profile: &AccountProfile,
    credential: &EncryptedCredential,
    service_id: &ServiceId,
    entry_id: &EntryId,
) -> Result<()> {
    use RegistryValue::{Bytes, Number, Text};

    keystore.write_field(slot, fields::ACCOUNT_NAME, Text(profile.account_name.clone()))?;
    keystore.write_field(slot, fields::DISPLAY_NAME, Text(profile.display_name.clone()))?;
    keystore.write_field(slot, fields::SERVER_URL, Text(profile.server.clone()))?;
    keystore.write_field(slot, fields::USERNAME, Text(profile.username.clone()))?;
    keystore.write_field(slot, fields::EMAIL, Text(profile.email.clone()))?;

    if let Some(original) = profile.email_original.as_deref().filter(|s| !s.is_empty()) {
        keystore.write_field(slot, fields::EMAIL_ORIGINAL, Text(original.to_string()))?;
    }
    if profile.sync_one_month {
        keystore.write_field(slot, fields::SYNC_ONE_MONTH, Number(1))?;
    }
    if !profile.show_reminders {
        keystore.write_field(slot, fields::SHOW_REMINDERS, Number(0))?;
    }

    keystore.write_field(slot, fields::CLSID, Text(CLSID_MAIL_ACCOUNT.to_string()))?;
    keystore.write_field(slot, fields::PASSWORD, Bytes(credential.as_bytes().to_vec()))?;
    keystore.write_field(slot, fields::SERVICE_UID, Bytes(service_id.as_bytes().to_vec()))?;
    keystore.write_field(slot, fields::STORE_ENTRY_ID, Bytes(entry_id.as_bytes().to_vec()))?;
    keystore.write_field(slot, fields::MINI_UID, Number(mini_uid()))?;
    Ok(())
}

/// Freshly generated unique value: the leading 32 bits of a v4 UUID.
fn mini_uid() -> u32 {
    let uuid = Uuid::new_v4();
    u32::from_le_bytes(uuid.as_bytes()[..4].try_into().expect("uuid has 16 bytes"))
}
