//! Core type definitions for the Kedge staking ledger
//!
//! Amounts are `u128` in base units with 12 decimal places. Block numbers are
//! plain `u64` counters supplied by the host.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Discrete time counter supplied by the host ("block height")
pub type BlockNumber = u64;

/// Token quantity in base units (12 decimals)
pub type Amount = u128;

/// One whole token in base units
pub const ONE: Amount = 1_000_000_000_000;

/// Address - account or contract identifier
///
/// Serialized as a 64-character hex string so that address-keyed maps stay
/// representable in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address {
    id: [u8; 32],
}

impl Address {
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive an address from a human-readable label using BLAKE3
    ///
    /// Deterministic, collision-resistant; the standard way to build fixture
    /// accounts in tests.
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str).ok()?;
        let id: [u8; 32] = bytes.try_into().ok()?;
        Some(Self { id })
    }

    /// Zero/null address
    pub const ZERO: Self = Self { id: [0u8; 32] };
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct AddressVisitor;

impl Visitor<'_> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 64-character hex string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Address, E> {
        Address::from_hex(value).ok_or_else(|| E::custom(format!("invalid address: {value}")))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(AddressVisitor)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}
