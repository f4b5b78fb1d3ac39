//! # Domain Invariants
//!
//! Business rules for cross-chain pegging.

use super::errors::PegError;
use super::value_objects::{Amount, Brand};

/// Invariant: Cosmos denomination format, `^[a-z][a-z0-9]*$`.
pub fn invariant_denom_format(raw_denom: &str) -> Result<(), PegError> {
    let mut chars = raw_denom.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_lowercase()
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        None => false,
    };
    if !valid {
        return Err(PegError::InvalidDenomination(raw_denom.to_string()));
    }
    Ok(())
}

/// Invariant: a courier only handles its own brand.
pub fn invariant_brand_match(expected: Brand, got: Brand) -> Result<(), PegError> {
    if expected != got {
        return Err(PegError::BrandMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        });
    }
    Ok(())
}

/// Invariant: the packet carries exactly the retained extent.
pub fn invariant_packet_conserves(retained: Amount, packet_amount: &str) -> bool {
    packet_amount == retained.value.to_string()
}
