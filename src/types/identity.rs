/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Derivation of peer identities from public keys.
//!
//! Every committee member is identified by an [Ed25519 public key](VerifyingKey). The transport and the
//! node table do not key peers by the public key itself, but by a [`PeerID`]: the hex encoding of the
//! [`Address`] of the key, which is the first [`ADDRESS_LEN`] bytes of the SHA-256 hash of the key's
//! bytes.
//!
//! Derivation is a pure function: the same key always yields the same identity.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::error::IdentityError;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 20;

/// Length in bytes of an Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Fixed-length address derived from a public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Derive the address of `public_key`.
    pub fn of(public_key: &VerifyingKey) -> Address {
        let digest = Sha256::digest(public_key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(bytes)
    }

    /// Get the raw bytes of this `Address`.
    pub const fn bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Get the [`PeerID`] that corresponds to this address.
    pub fn peer_id(&self) -> PeerID {
        PeerID(hex::encode(self.0))
    }
}

/// Hex-encoded [`Address`], used as the key of node table entries and as the identity of peers in the
/// transport.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct PeerID(String);

impl PeerID {
    /// Get the [`Address`] this `PeerID` encodes.
    pub fn address(&self) -> Result<Address, IdentityError> {
        let bytes = hex::decode(self.0.trim())
            .map_err(|err| IdentityError::InvalidPeerID(err.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            IdentityError::InvalidPeerID(format!("expected {} bytes, got {}", ADDRESS_LEN, b.len()))
        })?;
        Ok(Address(bytes))
    }

    /// Get the hex string of this `PeerID`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Get the [`PeerID`] of `public_key`.
pub fn peer_id_of(public_key: &VerifyingKey) -> PeerID {
    Address::of(public_key).peer_id()
}

/// Parse an Ed25519 public key out of untrusted bytes.
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey, IdentityError> {
    let bytes: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
        IdentityError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            PUBLIC_KEY_LEN,
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| IdentityError::InvalidPublicKey(err.to_string()))
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;

    fn key(seed: u8) -> VerifyingKey {
        SigningKey::from_bytes(&[seed; 32]).verifying_key()
    }

    #[test]
    fn identity_is_deterministic() {
        assert_eq!(peer_id_of(&key(1)), peer_id_of(&key(1)));
        assert_ne!(peer_id_of(&key(1)), peer_id_of(&key(2)));
        assert_eq!(peer_id_of(&key(1)).as_str().len(), ADDRESS_LEN * 2);
    }

    #[test]
    fn peer_id_hex_round_trips_to_address() {
        let address = Address::of(&key(3));
        let peer_id = address.peer_id();
        assert_eq!(peer_id.address(), Ok(address));
        assert_eq!(&address.bytes()[..], &hex::decode(peer_id.as_str()).unwrap()[..]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            parse_public_key(&[0u8; 5]),
            Err(IdentityError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            PeerID("zz".to_string()).address(),
            Err(IdentityError::InvalidPeerID(_))
        ));
        assert!(matches!(
            PeerID("abcd".to_string()).address(),
            Err(IdentityError::InvalidPeerID(_))
        ));
        assert_eq!(parse_public_key(key(4).as_bytes()), Ok(key(4)));
    }
}
