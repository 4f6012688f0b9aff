//! Core identity and hashing types shared across the node fragment.
//!
//! Addresses are 20-byte account identities; `Hash256` is the 32-byte digest
//! used for log topics and the global state root. The trie works with
//! variable-width digests produced by its configured hash function, so it
//! does not use these aliases directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// 32-byte digest used for log topics and state roots
pub type Hash256 = [u8; 32];

/// 20-byte account identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Create an address from raw bytes
    pub fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    /// Create an address from a byte slice, if it has the right length
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != ADDRESS_LENGTH {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(slice);
        Some(Address(bytes))
    }

    /// Derive the address of a named protocol (e.g. "staking")
    pub fn of_protocol(id: &[u8]) -> Self {
        let digest = hash160(id);
        Address(digest)
    }

    /// Raw bytes of the address
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Zero address
    pub fn zero() -> Self {
        Address([0u8; ADDRESS_LENGTH])
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

/// SHA-256 digest of the input
pub fn hash256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First 20 bytes of the SHA-256 digest of the input
pub fn hash160(data: &[u8]) -> [u8; ADDRESS_LENGTH] {
    let digest = hash256(data);
    let mut out = [0u8; ADDRESS_LENGTH];
    out.copy_from_slice(&digest[..ADDRESS_LENGTH]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_slice() {
        let addr = Address::from_slice(&[7u8; 20]).unwrap();
        assert_eq!(addr.as_bytes(), &[7u8; 20]);

        assert!(Address::from_slice(&[7u8; 19]).is_none());
        assert!(Address::from_slice(&[7u8; 32]).is_none());
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new([0xabu8; 20]);
        assert_eq!(addr.to_string(), "ab".repeat(20));
    }

    #[test]
    fn test_hash_functions() {
        let h = hash256(b"quorumcoin");
        assert_ne!(h, [0u8; 32]);
        assert_eq!(&hash160(b"quorumcoin")[..], &h[..20]);

        // Deterministic
        assert_eq!(hash256(b"a"), hash256(b"a"));
        assert_ne!(hash256(b"a"), hash256(b"b"));
    }

    #[test]
    fn test_protocol_address() {
        let a = Address::of_protocol(b"staking");
        let b = Address::of_protocol(b"staking");
        assert_eq!(a, b);
        assert_ne!(a, Address::of_protocol(b"rewarding"));
    }
}
