//! Store finalization: force the host client to materialize the offline
//! data file by opening the freshly configured store once.

use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::host::{HostClient, MAPI_DEFERRED_ERRORS, MDB_NO_DIALOG, MDB_WRITE};
use crate::model::ids::EntryId;
use crate::provision::service::delete_stale_store;
use crate::subsystem::MailSubsystem;

/// Open the message store identified by `entry_id` against a fresh
/// logon session.
///
/// Skipping this leaves a configured-but-never-opened service; the
/// record is already committed and visible when this runs, and a failure
/// here is deliberately not rolled back. On failure the session is
/// logged off, all handles are released, and the subsystem is poisoned:
/// provisioning must not be retried within this process.
pub fn finalize_store(
    client: &dyn HostClient,
    subsystem: &MailSubsystem,
    profile_name: &str,
    entry_id: &EntryId,
    store_path: &str,
) -> Result<()> {
    if entry_id.is_empty() {
        subsystem.poison();
        return Err(ProvisionError::StoreOpenFailed {
            reason: "entry identifier not initialised".to_string(),
        });
    }

    delete_stale_store(store_path);

    let mut session = match client.logon(profile_name) {
        Ok(session) => session,
        Err(e) => {
            subsystem.poison();
            return Err(store_open_failed(e));
        }
    };

    let opened = session.open_store(entry_id, MDB_NO_DIALOG | MDB_WRITE | MAPI_DEFERRED_ERRORS);
    // Release the store before ending the session, on both paths.
    let result = match opened {
        Ok(store) => {
            drop(store);
            debug!(path = store_path, "offline store materialized");
            Ok(())
        }
        Err(e) => {
            subsystem.poison();
            Err(store_open_failed(e))
        }
    };
    session.logoff();
    result
}

fn store_open_failed(source: ProvisionError) -> ProvisionError {
    ProvisionError::StoreOpenFailed {
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_empty_entry_identifier_poisons_subsystem() {
        let host = MemoryHost::new();
        host.seed_profile("P", "16");
        let client = host.client();
        let subsystem = MailSubsystem::new(std::rc::Rc::clone(&client));

        let err = finalize_store(
            client.as_ref(),
            &subsystem,
            "P",
            &EntryId::new(Vec::new()),
            "store.ost",
        )
        .unwrap_err();
        assert!(matches!(err, ProvisionError::StoreOpenFailed { .. }));
        assert!(subsystem.is_poisoned());
        assert_eq!(host.logon_count(), 0);
    }
}
