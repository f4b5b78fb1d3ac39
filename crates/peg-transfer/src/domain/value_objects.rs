//! # Domain Value Objects
//!
//! Immutable value types for cross-chain pegging.

use super::errors::PegError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extent of an amount. Only non-negative integers are representable.
pub type Value = u128;

/// Identity of a local asset type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Brand(pub u64);

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brand#{}", self.0)
    }
}

/// A quantity of a particular brand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Asset type.
    pub brand: Brand,
    /// Extent.
    pub value: Value,
}

impl Amount {
    /// Create a new amount.
    pub fn new(brand: Brand, value: Value) -> Self {
        Self { brand, value }
    }

    /// The empty amount of a brand.
    pub fn empty(brand: Brand) -> Self {
        Self { brand, value: 0 }
    }

    /// Check if the extent is zero.
    pub fn is_empty(&self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.value, self.brand)
    }
}

/// Identity of a live connection, assigned by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Identity of a peg handle inside the peg registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PegId(pub u64);

/// Identity of a pooled-custody account in the asset ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub u64);

/// Ledger account that escrow is taken from and refunds are paid into.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create an account id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported transfer protocols. There is exactly one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferProtocol {
    /// ICS-20 fungible token transfer, version 1.
    #[default]
    #[serde(rename = "ics20-1")]
    Ics20V1,
}

impl TransferProtocol {
    /// Wire name of the protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ics20V1 => "ics20-1",
        }
    }

    /// Prefix of every denomination URI in this protocol, colon included.
    pub fn uri_prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

impl FromStr for TransferProtocol {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ics20-1" => Ok(Self::Ics20V1),
            other => Err(PegError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of amount arithmetic a pegged asset uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathKind {
    /// Natural numbers.
    #[default]
    #[serde(rename = "nat")]
    Nat,
}

impl MathKind {
    /// Name of the math kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nat => "nat",
        }
    }
}

impl FromStr for MathKind {
    type Err = PegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nat" => Ok(Self::Nat),
            other => Err(PegError::UnsupportedMathKind(other.to_string())),
        }
    }
}

/// Canonical `<protocol>:<port>/<channel>/<denom>` identifier.
///
/// Only built by the denomination codec or by parsing, never assembled by hand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DenomUri(String);

impl DenomUri {
    pub(crate) fn from_validated(uri: String) -> Self {
        Self(uri)
    }

    /// The full URI.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The channel-scoped denomination carried in packets (`port/channel/denom`).
    pub fn prefixed_denom(&self) -> &str {
        self.0.split_once(':').map(|(_, rest)| rest).unwrap_or("")
    }

    /// Raw denomination (last path segment).
    pub fn raw_denom(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }
}

impl fmt::Display for DenomUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DenomUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
