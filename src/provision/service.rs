//! Drives the administrative session: message-service creation,
//! configuration, and entry-identifier retrieval.

use tracing::{debug, warn};

use crate::credential::EncryptedCredential;
use crate::error::{ProvisionError, Result};
use crate::host::{
    HostClient, PropertyValue, ServiceAdmin, ServiceProperty, MAPI_E_LOGON_FAILED,
    PROVIDER_EAS, PR_DISPLAY_NAME, PR_PROFILE_OFFLINE_STORE_PATH, PR_PROFILE_SECURE_MAILBOX,
    PR_PST_CONFIG_FLAGS, PR_RESOURCE_FLAGS, PR_SERVICE_EXTRA_CONFIG, PST_CONFIG_UNICODE,
    SERVICE_CREATE_WITH_STORE, SERVICE_EXTRA_CONFIGURED, SERVICE_NO_PRIMARY_IDENTITY,
};
use crate::model::ids::{EntryId, ServiceId};

/// Administrative capability over one profile, opened once per run and
/// reused for every service call.
pub struct ServiceProvisioner {
    admin: Box<dyn ServiceAdmin>,
}

impl ServiceProvisioner {
    /// Obtain the profile's service-admin capability.
    ///
    /// The host signals a missing profile with a recognized status on
    /// this one call; it is surfaced as
    /// [`AdministrationUnavailable`](ProvisionError::AdministrationUnavailable).
    pub fn open_administration(client: &dyn HostClient, profile_name: &str) -> Result<Self> {
        let admin = client.admin_services(profile_name).map_err(|e| match e {
            ProvisionError::Host {
                call: "AdminServices",
                status: MAPI_E_LOGON_FAILED,
            } => ProvisionError::AdministrationUnavailable {
                profile: profile_name.to_string(),
            },
            other => other,
        })?;
        Ok(Self { admin })
    }

    /// Create the message-service instance.
    ///
    /// Any stale offline-store file at the target path is deleted first;
    /// absence is the common case and failures are ignored.
    pub fn create_service(&mut self, display_name: &str, store_path: &str) -> Result<ServiceId> {
        let service = self.admin.create_service(PROVIDER_EAS, display_name)?;
        debug!(service = %service.to_hex(), "created message service");
        delete_stale_store(store_path);
        Ok(service)
    }

    /// Apply the full configuration property list to the service.
    pub fn configure_service(
        &mut self,
        service: &ServiceId,
        store_path: &str,
        display_name: &str,
        credential: &EncryptedCredential,
    ) -> Result<()> {
        let props = [
            ServiceProperty {
                tag: PR_PST_CONFIG_FLAGS,
                value: PropertyValue::Long(PST_CONFIG_UNICODE),
            },
            ServiceProperty {
                tag: PR_PROFILE_OFFLINE_STORE_PATH,
                value: PropertyValue::Unicode(store_path.to_string()),
            },
            ServiceProperty {
                tag: PR_DISPLAY_NAME,
                value: PropertyValue::Unicode(display_name.to_string()),
            },
            ServiceProperty {
                tag: PR_PROFILE_SECURE_MAILBOX,
                value: PropertyValue::Binary(credential.as_bytes().to_vec()),
            },
            ServiceProperty {
                tag: PR_RESOURCE_FLAGS,
                value: PropertyValue::Long(
                    SERVICE_NO_PRIMARY_IDENTITY | SERVICE_CREATE_WITH_STORE,
                ),
            },
            ServiceProperty {
                tag: PR_SERVICE_EXTRA_CONFIG,
                value: PropertyValue::Long(SERVICE_EXTRA_CONFIGURED),
            },
        ];

        self.admin
            .configure_service(service, &props)
            .map_err(|e| match e {
                ProvisionError::Host { call, status } => {
                    ProvisionError::ConfigurationFailed { call, status }
                }
                other => other,
            })
    }

    /// Read the store entry identifier from the service's property
    /// section. An absent or empty value is fatal: the record must not
    /// be committed without it.
    pub fn resolve_entry_identifier(&mut self, service: &ServiceId) -> Result<EntryId> {
        let section = self.admin.open_profile_section(service)?;
        match section.entry_id()? {
            Some(bytes) if !bytes.is_empty() => {
                let entry_id = EntryId::new(bytes);
                debug!(entry_id = %entry_id.to_hex(), "resolved store entry identifier");
                Ok(entry_id)
            }
            _ => Err(ProvisionError::EntryIdentifierUnavailable),
        }
    }
}

/// Best-effort deletion of a stale offline-store file.
pub(crate) fn delete_stale_store(path: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path, "deleted stale offline store"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path, error = %e, "could not delete stale offline store"),
    }
}
