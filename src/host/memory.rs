//! In-memory host client.
//!
//! A complete stand-in for the profile registry, the administrative
//! session, the logon session, and the credential-protection primitive.
//! Backs the test suite and the CLI's `--simulate` mode. Identifiers
//! are deterministic, the offline-store file is actually created on
//! `open_store`, and failure-injection switches reproduce the host
//! failure modes the orchestrator must tolerate.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::host::{
    CredentialProtector, HostClient, MailSession, MessageStore, ProfileSection,
    PropertyValue, RegistryKey, RegistryStore, RegistryValue, ServiceAdmin, ServiceProperty,
    MAPI_E_LOGON_FAILED, PR_PROFILE_OFFLINE_STORE_PATH,
};
use crate::keystore::{ProfileKeyStore, VALUE_NEXT_ACCOUNT_ID};
use crate::model::ids::{EntryId, ServiceId};
use crate::model::record::{fields, MailAccountRecord};

const MAPI_E_NOT_FOUND: u32 = 0x8004_010F;
const MAPI_E_INVALID_ENTRYID: u32 = 0x8004_0107;
const ERROR_INVALID_DATATYPE: u32 = 0x0000_070C;

// ── Registry ────────────────────────────────────────────────────

type KeyTree = BTreeMap<String, BTreeMap<String, RegistryValue>>;

/// In-memory hierarchical key/value store, keyed by full path.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    keys: Rc<RefCell<KeyTree>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryRegistry {
    fn open_key(&self, path: &str) -> Result<Option<Box<dyn RegistryKey>>> {
        if !self.keys.borrow().contains_key(path) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryKey {
            keys: Rc::clone(&self.keys),
            path: path.to_string(),
        })))
    }

    fn create_key(&self, path: &str) -> Result<Box<dyn RegistryKey>> {
        self.keys
            .borrow_mut()
            .entry(path.to_string())
            .or_default();
        Ok(Box::new(MemoryKey {
            keys: Rc::clone(&self.keys),
            path: path.to_string(),
        }))
    }
}

struct MemoryKey {
    keys: Rc<RefCell<KeyTree>>,
    path: String,
}

impl MemoryKey {
    fn get(&self, name: &str) -> Option<RegistryValue> {
        self.keys.borrow().get(&self.path)?.get(name).cloned()
    }

    fn kind_mismatch(&self, name: &str) -> ProvisionError {
        ProvisionError::Registry {
            path: format!("{}\\{}", self.path, name),
            op: "query",
            status: ERROR_INVALID_DATATYPE,
        }
    }
}

impl RegistryKey for MemoryKey {
    fn get_text(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(RegistryValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(self.kind_mismatch(name)),
        }
    }

    fn get_number(&self, name: &str) -> Result<Option<u32>> {
        match self.get(name) {
            None => Ok(None),
            Some(RegistryValue::Number(n)) => Ok(Some(n)),
            Some(_) => Err(self.kind_mismatch(name)),
        }
    }

    fn get_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.get(name) {
            None => Ok(None),
            Some(RegistryValue::Bytes(b)) => Ok(Some(b)),
            Some(_) => Err(self.kind_mismatch(name)),
        }
    }

    fn set_value(&self, name: &str, value: RegistryValue) -> Result<()> {
        let mut keys = self.keys.borrow_mut();
        let values = keys.get_mut(&self.path).ok_or(ProvisionError::Registry {
            path: self.path.clone(),
            op: "set",
            status: 0x2,
        })?;
        values.insert(name.to_string(), value);
        Ok(())
    }
}

// ── Administrative and logon sessions ───────────────────────────

#[derive(Default)]
struct Faults {
    fail_configure: Option<u32>,
    empty_entry_id: bool,
    fail_open_store: Option<u32>,
}

struct ServiceRecord {
    provider: String,
    display_name: String,
    props: Vec<ServiceProperty>,
    entry_id: Option<Vec<u8>>,
    store_path: Option<String>,
}

#[derive(Default)]
struct ClientState {
    profiles: BTreeSet<String>,
    next_service: u32,
    services: BTreeMap<[u8; 16], ServiceRecord>,
    // entry identifier → owning service
    stores: BTreeMap<Vec<u8>, [u8; 16]>,
    opened_stores: Vec<Vec<u8>>,
    faults: Faults,
    init_count: u32,
    teardown_count: u32,
    logon_count: u32,
}

/// The simulated host client process.
#[derive(Clone, Default)]
pub struct MemoryClient {
    state: Rc<RefCell<ClientState>>,
}

impl HostClient for MemoryClient {
    fn initialize(&self) -> Result<()> {
        self.state.borrow_mut().init_count += 1;
        Ok(())
    }

    fn teardown(&self) {
        self.state.borrow_mut().teardown_count += 1;
    }

    fn admin_services(&self, profile: &str) -> Result<Box<dyn ServiceAdmin>> {
        if !self.state.borrow().profiles.contains(profile) {
            return Err(ProvisionError::Host {
                call: "AdminServices",
                status: MAPI_E_LOGON_FAILED,
            });
        }
        Ok(Box::new(MemoryAdmin {
            state: Rc::clone(&self.state),
        }))
    }

    fn logon(&self, profile: &str) -> Result<Box<dyn MailSession>> {
        let mut state = self.state.borrow_mut();
        if !state.profiles.contains(profile) {
            return Err(ProvisionError::Host {
                call: "MAPILogonEx",
                status: MAPI_E_LOGON_FAILED,
            });
        }
        state.logon_count += 1;
        Ok(Box::new(MemorySession {
            state: Rc::clone(&self.state),
            active: true,
        }))
    }
}

struct MemoryAdmin {
    state: Rc<RefCell<ClientState>>,
}

impl ServiceAdmin for MemoryAdmin {
    fn create_service(&mut self, provider: &str, display_name: &str) -> Result<ServiceId> {
        let mut state = self.state.borrow_mut();
        let n = state.next_service;
        state.next_service += 1;

        let mut uid = [0u8; 16];
        uid[..4].copy_from_slice(b"MSVC");
        uid[12..].copy_from_slice(&n.to_le_bytes());
        state.services.insert(
            uid,
            ServiceRecord {
                provider: provider.to_string(),
                display_name: display_name.to_string(),
                props: Vec::new(),
                entry_id: None,
                store_path: None,
            },
        );
        Ok(ServiceId(uid))
    }

    fn configure_service(
        &mut self,
        service: &ServiceId,
        props: &[ServiceProperty],
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.faults.fail_configure {
            return Err(ProvisionError::Host {
                call: "ConfigureMsgService",
                status,
            });
        }

        let empty_entry_id = state.faults.empty_entry_id;
        let record = state.services.get_mut(&service.0).ok_or(ProvisionError::Host {
            call: "ConfigureMsgService",
            status: MAPI_E_NOT_FOUND,
        })?;

        record.props = props.to_vec();
        record.store_path = props.iter().find_map(|p| {
            match (&p.value, p.tag == PR_PROFILE_OFFLINE_STORE_PATH) {
                (PropertyValue::Unicode(path), true) => Some(path.clone()),
                _ => None,
            }
        });

        let entry = if empty_entry_id {
            Vec::new()
        } else {
            // 4 flag bytes, the service uid, and a sequence suffix.
            let mut entry = vec![0u8; 4];
            entry.extend_from_slice(&service.0);
            entry.extend_from_slice(&service.0[12..]);
            entry
        };
        record.entry_id = Some(entry.clone());
        if !entry.is_empty() {
            state.stores.insert(entry, service.0);
        }
        Ok(())
    }

    fn open_profile_section(&mut self, service: &ServiceId) -> Result<Box<dyn ProfileSection>> {
        let state = self.state.borrow();
        let record = state.services.get(&service.0).ok_or(ProvisionError::Host {
            call: "OpenProfileSection",
            status: MAPI_E_NOT_FOUND,
        })?;
        Ok(Box::new(MemorySection {
            entry: record.entry_id.clone(),
        }))
    }
}

struct MemorySection {
    entry: Option<Vec<u8>>,
}

impl ProfileSection for MemorySection {
    fn entry_id(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.entry.clone())
    }
}

struct MemorySession {
    state: Rc<RefCell<ClientState>>,
    active: bool,
}

impl MailSession for MemorySession {
    fn open_store(&mut self, entry_id: &EntryId, _flags: u32) -> Result<Box<dyn MessageStore>> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.faults.fail_open_store {
            return Err(ProvisionError::Host {
                call: "OpenMsgStore",
                status,
            });
        }
        if entry_id.is_empty() {
            return Err(ProvisionError::Host {
                call: "OpenMsgStore",
                status: MAPI_E_INVALID_ENTRYID,
            });
        }
        let uid = *state
            .stores
            .get(entry_id.as_bytes())
            .ok_or(ProvisionError::Host {
                call: "OpenMsgStore",
                status: MAPI_E_NOT_FOUND,
            })?;

        // Opening the store is what materializes the offline file.
        if let Some(path) = state.services[&uid].store_path.clone() {
            if let Err(e) = std::fs::File::create(&path) {
                debug!(path, error = %e, "could not materialize offline store file");
            }
        }
        state.opened_stores.push(entry_id.as_bytes().to_vec());
        Ok(Box::new(MemoryStore))
    }

    fn logoff(&mut self) {
        self.active = false;
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.logoff();
    }
}

struct MemoryStore;

impl MessageStore for MemoryStore {}

// ── Credential protection ───────────────────────────────────────

/// Reversible fake of the OS protection primitive.
#[derive(Default)]
pub struct MemoryProtector {
    calls: Cell<u32>,
    fail: Cell<Option<u32>>,
    last_plaintext_len: Cell<Option<usize>>,
}

impl MemoryProtector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of protect calls performed.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    /// Byte length of the most recent plaintext.
    pub fn last_plaintext_len(&self) -> Option<usize> {
        self.last_plaintext_len.get()
    }

    /// Make the next protect calls fail with the given status.
    pub fn fail_with(&self, status: u32) {
        self.fail.set(Some(status));
    }
}

impl CredentialProtector for MemoryProtector {
    fn protect(&self, plaintext: &[u8], _label: &str) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        self.last_plaintext_len.set(Some(plaintext.len()));
        if let Some(status) = self.fail.get() {
            return Err(ProvisionError::CredentialProtection { status });
        }
        let mut cipher = b"MEMPROT1".to_vec();
        cipher.extend_from_slice(plaintext);
        Ok(cipher)
    }
}

// ── Aggregate host ──────────────────────────────────────────────

/// All host capabilities bundled, plus seeding and fault injection.
#[derive(Clone)]
pub struct MemoryHost {
    registry: MemoryRegistry,
    client: Rc<MemoryClient>,
    protector: Rc<MemoryProtector>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            registry: MemoryRegistry::new(),
            client: Rc::new(MemoryClient::default()),
            protector: Rc::new(MemoryProtector::new()),
        }
    }

    pub fn registry(&self) -> &MemoryRegistry {
        &self.registry
    }

    pub fn client(&self) -> Rc<dyn HostClient> {
        Rc::clone(&self.client) as Rc<dyn HostClient>
    }

    pub fn protector(&self) -> Rc<MemoryProtector> {
        Rc::clone(&self.protector)
    }

    /// Register a profile with the host client and create its accounts
    /// key with a fresh counter.
    pub fn seed_profile(&self, profile_name: &str, client_version: &str) {
        self.client
            .state
            .borrow_mut()
            .profiles
            .insert(profile_name.to_string());
        let store = ProfileKeyStore::new(&self.registry, profile_name, client_version);
        let key = self
            .registry
            .create_key(store.accounts_path())
            .expect("memory registry create cannot fail");
        key.set_value(VALUE_NEXT_ACCOUNT_ID, RegistryValue::Number(1))
            .expect("memory registry set cannot fail");
    }

    /// Commit a complete existing account record, as left behind by an
    /// earlier provisioning run. Returns its 8-hex-digit key name.
    pub fn seed_account(
        &self,
        profile_name: &str,
        client_version: &str,
        record: &MailAccountRecord,
    ) -> String {
        let store = ProfileKeyStore::new(&self.registry, profile_name, client_version);
        let (id, key) = store.allocate_slot().expect("seeded profile has a counter");
        let writes = [
            (fields::ACCOUNT_NAME, record.account_name.clone()),
            (fields::DISPLAY_NAME, record.display_name.clone()),
            (fields::EMAIL, record.email.clone()),
            (fields::SERVER_URL, record.server.clone()),
            (fields::USERNAME, record.username.clone()),
        ];
        for (name, value) in writes {
            key.set_value(name, RegistryValue::Text(value))
                .expect("memory registry set cannot fail");
        }
        key.set_value(
            fields::PASSWORD,
            RegistryValue::Bytes(record.encrypted_password.clone()),
        )
        .expect("memory registry set cannot fail");
        store.commit_slot(id).expect("seeded commit cannot fail");
        format!("{id:08X}")
    }

    // ── Fault injection ─────────────────────────────────────────

    pub fn fail_configure(&self, status: u32) {
        self.client.state.borrow_mut().faults.fail_configure = Some(status);
    }

    pub fn return_empty_entry_id(&self) {
        self.client.state.borrow_mut().faults.empty_entry_id = true;
    }

    pub fn fail_open_store(&self, status: u32) {
        self.client.state.borrow_mut().faults.fail_open_store = Some(status);
    }

    // ── Observation ─────────────────────────────────────────────

    pub fn init_count(&self) -> u32 {
        self.client.state.borrow().init_count
    }

    pub fn teardown_count(&self) -> u32 {
        self.client.state.borrow().teardown_count
    }

    pub fn logon_count(&self) -> u32 {
        self.client.state.borrow().logon_count
    }

    pub fn opened_store_count(&self) -> usize {
        self.client.state.borrow().opened_stores.len()
    }

    /// Provider and display name of the most recently created service.
    pub fn last_service(&self) -> Option<(String, String)> {
        let state = self.client.state.borrow();
        state
            .services
            .values()
            .last()
            .map(|s| (s.provider.clone(), s.display_name.clone()))
    }

    /// Configured property list of the given service.
    pub fn service_props(&self, service: &ServiceId) -> Vec<ServiceProperty> {
        self.client.state.borrow().services[&service.0].props.clone()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}
