//! Typed access to the per-profile account records in the registry-like
//! profile store.
//!
//! One store instance is scoped to a single (profile, client-version)
//! pair. The commit protocol keeps the "account is visible" signal
//! (membership in the three category indexes) strictly after the record
//! itself is fully written: a crash mid-record-write never produces a
//! visible-but-incomplete account. Ids are dense and monotonically
//! increasing under the assumed single-writer use; no locking is done.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::host::{RegistryKey, RegistryStore, RegistryValue};
use crate::model::record::{fields, MailAccountRecord};

/// Fixed GUID segment under which the client keeps account records.
pub const ACCOUNTS_KEY_GUID: &str = "9375CFF0413111d3B88A00104B2A6676";

/// Value holding the next sequential account id.
pub const VALUE_NEXT_ACCOUNT_ID: &str = "NextAccountID";

/// The three ordered category indexes, as registry value names.
pub const CATEGORY_MAIL: &str = "{ED475418-B0D6-11D2-8C3B-00104B2A6676}";
pub const CATEGORY_ADDRESS_BOOK: &str = "{ED475419-B0D6-11D2-8C3B-00104B2A6676}";
pub const CATEGORY_STORE: &str = "{ED475420-B0D6-11D2-8C3B-00104B2A6676}";

/// Fixed maximum size of a category index buffer. Appending an id must
/// never reach this size.
pub const MAX_INDEX_BUFFER: usize = 4096;

const ID_BYTES: usize = std::mem::size_of::<u32>();

/// Read/write access to one profile's account records.
pub struct ProfileKeyStore<'a> {
    registry: &'a dyn RegistryStore,
    accounts_path: String,
}

impl<'a> ProfileKeyStore<'a> {
    pub fn new(registry: &'a dyn RegistryStore, profile_name: &str, client_version: &str) -> Self {
        let accounts_path = format!(
            "SOFTWARE\\Microsoft\\Office\\{client_version}.0\\Outlook\\Profiles\\{profile_name}\\{ACCOUNTS_KEY_GUID}"
        );
        Self {
            registry,
            accounts_path,
        }
    }

    /// Path of the key holding all account records for this profile.
    pub fn accounts_path(&self) -> &str {
        &self.accounts_path
    }

    fn open_accounts_key(&self) -> Result<Box<dyn RegistryKey>> {
        self.registry
            .open_key(&self.accounts_path)?
            .ok_or_else(|| ProvisionError::Registry {
                path: self.accounts_path.clone(),
                op: "open",
                status: 0x2, // the key is absent
            })
    }

    /// Load the documented field subset of an existing account record.
    ///
    /// The key handle is released on every exit path.
    pub fn open_account(&self, account_id: &str) -> Result<MailAccountRecord> {
        let path = format!("{}\\{}", self.accounts_path, account_id);
        let key = self
            .registry
            .open_key(&path)?
            .ok_or(ProvisionError::RecordNotFound { path: path.clone() })?;

        let record = MailAccountRecord {
            account_name: require_text(key.as_ref(), &path, fields::ACCOUNT_NAME)?,
            display_name: require_text(key.as_ref(), &path, fields::DISPLAY_NAME)?,
            email: require_text(key.as_ref(), &path, fields::EMAIL)?,
            server: require_text(key.as_ref(), &path, fields::SERVER_URL)?,
            username: require_text(key.as_ref(), &path, fields::USERNAME)?,
            encrypted_password: require_bytes(key.as_ref(), &path, fields::PASSWORD)?,
        };
        Ok(record)
    }

    /// Reserve a new account slot: read the counter and create the
    /// 8-hex-digit subkey.
    ///
    /// The counter itself is only advanced by [`commit_slot`]; a slot
    /// that is allocated but never committed stays orphaned. No cleanup
    /// is attempted for orphaned slots.
    ///
    /// [`commit_slot`]: ProfileKeyStore::commit_slot
    pub fn allocate_slot(&self) -> Result<(u32, Box<dyn RegistryKey>)> {
        let accounts = self.open_accounts_key()?;
        let account_id = accounts
            .get_number(VALUE_NEXT_ACCOUNT_ID)?
            .ok_or_else(|| ProvisionError::CounterMissing {
                path: self.accounts_path.clone(),
            })?;

        let key_path = format!("{}\\{:08X}", self.accounts_path, account_id);
        let key = self.registry.create_key(&key_path)?;
        debug!(account_id, path = %key_path, "allocated account slot");
        Ok((account_id, key))
    }

    /// Write one field of an in-progress record.
    pub fn write_field(
        &self,
        key: &dyn RegistryKey,
        name: &str,
        value: RegistryValue,
    ) -> Result<()> {
        key.set_value(name, value)
    }

    /// Make a fully written record visible: advance the counter, then
    /// append the id to each category index.
    pub fn commit_slot(&self, account_id: u32) -> Result<()> {
        let accounts = self.open_accounts_key()?;
        accounts.set_value(
            VALUE_NEXT_ACCOUNT_ID,
            RegistryValue::Number(account_id + 1),
        )?;
        debug!(account_id, "committed account counter");

        self.append_category_id(accounts.as_ref(), CATEGORY_MAIL, account_id)?;
        self.append_category_id(accounts.as_ref(), CATEGORY_ADDRESS_BOOK, account_id)?;
        self.append_category_id(accounts.as_ref(), CATEGORY_STORE, account_id)?;
        Ok(())
    }

    /// Append one id to a category index buffer.
    ///
    /// The buffer may be absent; it is then treated as empty.
    pub fn append_category_id(
        &self,
        accounts: &dyn RegistryKey,
        index_name: &str,
        account_id: u32,
    ) -> Result<()> {
        let mut buffer = accounts.get_bytes(index_name)?.unwrap_or_default();

        if buffer.len() + ID_BYTES >= MAX_INDEX_BUFFER {
            return Err(ProvisionError::IndexBufferTooSmall {
                index: index_name.to_string(),
            });
        }

        buffer
            .write_u32::<LittleEndian>(account_id)
            .expect("writing to a Vec cannot fail");
        accounts.set_value(index_name, RegistryValue::Bytes(buffer))
    }

    /// Decode one category index into its ordered id list.
    ///
    /// A buffer whose length is not a whole number of ids is corrupt
    /// and reported rather than silently truncated.
    pub fn category_ids(&self, index_name: &str) -> Result<Vec<u32>> {
        let accounts = self.open_accounts_key()?;
        let buffer = accounts.get_bytes(index_name)?.unwrap_or_default();
        if buffer.len() % ID_BYTES != 0 {
            return Err(ProvisionError::Registry {
                path: format!("{}\\{}", self.accounts_path, index_name),
                op: "decode",
                status: 0xD, // ERROR_INVALID_DATA
            });
        }
        let mut cursor = Cursor::new(&buffer);
        let mut ids = Vec::with_capacity(buffer.len() / ID_BYTES);
        while let Ok(id) = cursor.read_u32::<LittleEndian>() {
            ids.push(id);
        }
        Ok(ids)
    }
}

fn require_text(key: &dyn RegistryKey, path: &str, name: &str) -> Result<String> {
    key.get_text(name)?.ok_or_else(|| ProvisionError::Registry {
        path: format!("{path}\\{name}"),
        op: "query",
        status: 0x2,
    })
}

fn require_bytes(key: &dyn RegistryKey, path: &str, name: &str) -> Result<Vec<u8>> {
    key.get_bytes(name)?.ok_or_else(|| ProvisionError::Registry {
        path: format!("{path}\\{name}"),
        op: "query",
        status: 0x2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryRegistry;

    fn store(registry: &MemoryRegistry) -> ProfileKeyStore<'_> {
        ProfileKeyStore::new(registry, "P", "16")
    }

    fn seed_counter(registry: &MemoryRegistry, next: u32) {
        let store = store(registry);
        let key = registry.create_key(store.accounts_path()).unwrap();
        key.set_value(VALUE_NEXT_ACCOUNT_ID, RegistryValue::Number(next))
            .unwrap();
    }

    #[test]
    fn test_accounts_path_template() {
        let registry = MemoryRegistry::new();
        let store = store(&registry);
        assert_eq!(
            store.accounts_path(),
            "SOFTWARE\\Microsoft\\Office\\16.0\\Outlook\\Profiles\\P\\9375CFF0413111d3B88A00104B2A6676"
        );
    }

    #[test]
    fn test_allocate_without_counter() {
        let registry = MemoryRegistry::new();
        registry
            .create_key(store(&registry).accounts_path())
            .unwrap();
        match store(&registry).allocate_slot().map(|(id, _)| id) {
            Err(ProvisionError::CounterMissing { .. }) => {}
            other => panic!("expected CounterMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_allocate_uses_hex_key_name() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 0xAB);
        let (id, _key) = store(&registry).allocate_slot().unwrap();
        assert_eq!(id, 0xAB);
        let path = format!("{}\\000000AB", store(&registry).accounts_path());
        assert!(registry.open_key(&path).unwrap().is_some());
    }

    #[test]
    fn test_commit_advances_counter_and_indexes() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 5);
        let s = store(&registry);
        let (id, _key) = s.allocate_slot().unwrap();
        s.commit_slot(id).unwrap();

        let accounts = registry.open_key(s.accounts_path()).unwrap().unwrap();
        assert_eq!(accounts.get_number(VALUE_NEXT_ACCOUNT_ID).unwrap(), Some(6));
        for index in [CATEGORY_MAIL, CATEGORY_ADDRESS_BOOK, CATEGORY_STORE] {
            assert_eq!(s.category_ids(index).unwrap(), vec![5]);
        }
    }

    #[test]
    fn test_append_preserves_existing_ids() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 3);
        let s = store(&registry);
        let accounts = registry.open_key(s.accounts_path()).unwrap().unwrap();
        accounts
            .set_value(
                CATEGORY_MAIL,
                RegistryValue::Bytes(vec![1, 0, 0, 0, 2, 0, 0, 0]),
            )
            .unwrap();
        s.append_category_id(accounts.as_ref(), CATEGORY_MAIL, 3)
            .unwrap();
        assert_eq!(s.category_ids(CATEGORY_MAIL).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_category_ids_reject_truncated_buffer() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 1);
        let s = store(&registry);
        let accounts = registry.open_key(s.accounts_path()).unwrap().unwrap();
        accounts
            .set_value(CATEGORY_MAIL, RegistryValue::Bytes(vec![1, 0, 0, 0, 2]))
            .unwrap();
        match s.category_ids(CATEGORY_MAIL) {
            Err(ProvisionError::Registry { op: "decode", .. }) => {}
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_append_fails_at_buffer_boundary() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 1);
        let s = store(&registry);
        let accounts = registry.open_key(s.accounts_path()).unwrap().unwrap();

        // One id below the boundary still fits.
        accounts
            .set_value(
                CATEGORY_MAIL,
                RegistryValue::Bytes(vec![0; MAX_INDEX_BUFFER - 2 * ID_BYTES]),
            )
            .unwrap();
        s.append_category_id(accounts.as_ref(), CATEGORY_MAIL, 7)
            .unwrap();

        // The buffer is now at the boundary; the next append must fail
        // rather than truncate.
        let before = accounts.get_bytes(CATEGORY_MAIL).unwrap().unwrap();
        match s.append_category_id(accounts.as_ref(), CATEGORY_MAIL, 8) {
            Err(ProvisionError::IndexBufferTooSmall { index }) => {
                assert_eq!(index, CATEGORY_MAIL);
            }
            other => panic!("expected IndexBufferTooSmall, got {other:?}"),
        }
        let after = accounts.get_bytes(CATEGORY_MAIL).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_open_account_not_found() {
        let registry = MemoryRegistry::new();
        seed_counter(&registry, 1);
        match store(&registry).open_account("00000007") {
            Err(ProvisionError::RecordNotFound { path }) => {
                assert!(path.ends_with("00000007"));
            }
            other => panic!("expected RecordNotFound, got {other:?}"),
        }
    }
}
