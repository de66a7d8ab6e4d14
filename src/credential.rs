//! Credential protection: wraps the OS protect-for-current-user
//! primitive into the tagged ciphertext blob the host client stores.

use std::fmt;

use crate::error::{ProvisionError, Result};
use crate::host::CredentialProtector;

/// First byte of every protected credential blob: the blob was produced
/// by the OS current-user protection scheme.
pub const SCHEME_PROTECT_DATA: u8 = 2;

/// Descriptor label passed to the protection primitive.
pub const CREDENTIAL_LABEL: &str = "EAS Password";

/// A protected credential: one scheme tag byte followed by the
/// OS-produced ciphertext. Produced once per account and never
/// decrypted by this tool.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedCredential(Vec<u8>);

impl EncryptedCredential {
    /// Protect a plaintext password.
    ///
    /// The password is encoded as UTF-16LE with the two terminator bytes
    /// included in the length handed to the OS primitive; the host
    /// client decodes it the same way.
    pub fn protect(protector: &dyn CredentialProtector, password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(ProvisionError::Validation { field: "password" });
        }

        let mut plain: Vec<u8> = password
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        plain.extend_from_slice(&[0, 0]);

        let cipher = protector.protect(&plain, CREDENTIAL_LABEL)?;

        let mut blob = Vec::with_capacity(cipher.len() + 1);
        blob.push(SCHEME_PROTECT_DATA);
        blob.extend_from_slice(&cipher);
        Ok(Self(blob))
    }

    /// Adopt an already-protected blob verbatim (credential reuse).
    pub fn from_bytes(blob: Vec<u8>) -> Self {
        Self(blob)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The protection-scheme tag byte, if the blob is non-empty.
    pub fn scheme(&self) -> Option<u8> {
        self.0.first().copied()
    }
}

/// Never print credential bytes; the length is enough for diagnostics.
impl fmt::Debug for EncryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedCredential({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryProtector;

    #[test]
    fn test_protect_tags_and_wraps() {
        let protector = MemoryProtector::new();
        let cred = EncryptedCredential::protect(&protector, "demo1").unwrap();
        assert_eq!(cred.scheme(), Some(SCHEME_PROTECT_DATA));
        // Remainder is never empty for a non-empty password.
        assert!(cred.as_bytes().len() > 1);
        assert_eq!(protector.calls(), 1);
    }

    #[test]
    fn test_protect_includes_terminator() {
        let protector = MemoryProtector::new();
        let _ = EncryptedCredential::protect(&protector, "ab").unwrap();
        // UTF-16LE "ab" plus the two-byte terminator.
        assert_eq!(protector.last_plaintext_len(), Some(6));
    }

    #[test]
    fn test_protect_rejects_empty_password() {
        let protector = MemoryProtector::new();
        let err = EncryptedCredential::protect(&protector, "").unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Validation { field: "password" }
        ));
        assert_eq!(protector.calls(), 0);
    }

    #[test]
    fn test_protect_surfaces_primitive_failure() {
        let protector = MemoryProtector::new();
        protector.fail_with(0x8009_000B);
        let err = EncryptedCredential::protect(&protector, "pw").unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::CredentialProtection { status: 0x8009_000B }
        ));
    }
}
