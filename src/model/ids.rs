//! Opaque binary identifiers issued by the host client.

use std::fmt;

/// Fixed-size handle for a message-service instance.
///
/// Returned when the service is created and used as the key for all
/// subsequent configuration calls. Only valid within the administrative
/// session that created it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub [u8; 16]);

impl ServiceId {
    /// Raw bytes, exactly as persisted into the account record.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Uppercase hex rendering for diagnostics.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.to_hex())
    }
}

/// Variable-length handle locating a message store inside the client's
/// session address space.
///
/// Obtained after service configuration, persisted verbatim into the
/// account record, and later used to open the store. Must be non-empty
/// before the record is committed.
#[derive(Clone, PartialEq, Eq)]
pub struct EntryId(Vec<u8>);

impl EntryId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Uppercase hex rendering for diagnostics.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_hex() {
        let id = ServiceId([0xAB; 16]);
        assert_eq!(id.to_hex(), "AB".repeat(16));
    }

    #[test]
    fn test_entry_id_empty() {
        assert!(EntryId::new(Vec::new()).is_empty());
        let id = EntryId::new(vec![0x01, 0xFF]);
        assert!(!id.is_empty());
        assert_eq!(id.len(), 2);
        assert_eq!(id.to_hex(), "01FF");
    }
}
