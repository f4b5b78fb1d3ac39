//! # Domain Entities
//!
//! Assets, issuers, wire records and peg handles.

use super::value_objects::{Amount, Brand, DenomUri, MathKind, PegId, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A ledger-issued quantity of a brand.
///
/// Deliberately not `Clone`: an asset is consumed exactly once, by a burn,
/// a pool debit or a deposit.
#[derive(Debug, PartialEq, Eq)]
pub struct Asset {
    amount: Amount,
}

impl Asset {
    /// Wrap an amount the ledger has just created or released.
    pub fn new(amount: Amount) -> Self {
        Self { amount }
    }

    /// Amount held.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Brand of the amount held.
    pub fn brand(&self) -> Brand {
        self.amount.brand
    }

    /// Extent of the amount held.
    pub fn value(&self) -> Value {
        self.amount.value
    }

    /// Consume the asset, yielding its amount.
    pub fn into_amount(self) -> Amount {
        self.amount
    }
}

/// A locally recognised asset type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// Brand of the assets this issuer recognises.
    pub brand: Brand,
    /// Debug name; not authoritative.
    pub alleged_name: String,
    /// Amount arithmetic.
    pub math_kind: MathKind,
}

/// Fungible token transfer packet, as carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleTransferPacket {
    /// Decimal integer extent.
    pub amount: String,
    /// Channel-scoped denomination (`port/channel/denom`).
    pub denomination: String,
    /// Deposit address on the receiving side.
    pub receiver: String,
    /// Sender address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Acknowledgement record returned for every packet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Whether the packet was accepted.
    pub success: bool,
    /// Why it was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl Acknowledgement {
    /// Positive acknowledgement.
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Negative acknowledgement with a printable error.
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(serde_json::Value::String(error.to_string())),
        }
    }
}

/// Outcome of one send attempt. Produced once; never retried automatically.
#[derive(Debug, PartialEq)]
pub struct TransferResult {
    /// True if the remote side acknowledged the transfer.
    pub success: bool,
    /// Remote or transport error.
    pub error: Option<serde_json::Value>,
    /// The recreated asset when the transfer is known to have failed.
    pub refund: Option<Asset>,
}

impl TransferResult {
    /// Transfer acknowledged by the remote side.
    pub fn delivered() -> Self {
        Self {
            success: true,
            error: None,
            refund: None,
        }
    }

    /// Transfer failed and the retained amount was recreated.
    pub fn refunded(error: serde_json::Value, refund: Asset) -> Self {
        Self {
            success: false,
            error: Some(error),
            refund: Some(refund),
        }
    }
}

/// Public description of a peg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PegDescriptor {
    /// Debug name given by whoever created the peg.
    pub alleged_name: String,
    /// Brand of the local asset.
    pub local_brand: Brand,
    /// Denomination URI on the peg's channel.
    pub denom_uri: DenomUri,
}

/// Capability handle for one peg.
///
/// Holding a `Peg` never exposes its connection; only the peg registry that
/// issued it can resolve that.
#[derive(Clone, Debug)]
pub struct Peg {
    id: PegId,
    descriptor: Arc<PegDescriptor>,
}

impl Peg {
    pub(crate) fn new(id: PegId, descriptor: PegDescriptor) -> Self {
        Self {
            id,
            descriptor: Arc::new(descriptor),
        }
    }

    /// Registry identity.
    pub fn id(&self) -> PegId {
        self.id
    }

    /// Debug name.
    pub fn alleged_name(&self) -> &str {
        &self.descriptor.alleged_name
    }

    /// Brand of the local asset.
    pub fn local_brand(&self) -> Brand {
        self.descriptor.local_brand
    }

    /// Denomination URI.
    pub fn denom_uri(&self) -> &DenomUri {
        &self.descriptor.denom_uri
    }

    /// Full descriptor.
    pub fn descriptor(&self) -> &PegDescriptor {
        &self.descriptor
    }
}

impl PartialEq for Peg {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peg {}

/// Inbound value that was redeemed and acknowledged but could not reach its
/// receiver. Carries the orphaned asset for manual recovery.
#[derive(Debug)]
pub struct ForwardingFailure {
    /// Denomination the packet arrived on.
    pub denom_uri: DenomUri,
    /// Receiver address from the packet.
    pub receiver: String,
    /// Why forwarding failed.
    pub error: String,
    /// The asset that was created locally.
    pub asset: Asset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_omits_missing_sender() {
        let packet = FungibleTransferPacket {
            amount: "100".to_string(),
            denomination: "portdef/chanabc/uatom".to_string(),
            receiver: "markaccount".to_string(),
            sender: None,
        };
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "amount": "100",
                "denomination": "portdef/chanabc/uatom",
                "receiver": "markaccount",
            })
        );
    }

    #[test]
    fn test_ack_success_has_no_error_field() {
        let json = serde_json::to_string(&Acknowledgement::success()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn test_ack_failure_stringifies_error() {
        let ack = Acknowledgement::failure("oops");
        assert!(!ack.success);
        assert_eq!(ack.error, Some(serde_json::json!("oops")));
    }

    #[test]
    fn test_asset_accessors() {
        let asset = Asset::new(Amount::new(Brand(1), 42));
        assert_eq!(asset.brand(), Brand(1));
        assert_eq!(asset.value(), 42);
        assert_eq!(asset.into_amount(), Amount::new(Brand(1), 42));
    }

    #[test]
    fn test_peg_equality_is_by_id() {
        let descriptor = PegDescriptor {
            alleged_name: "Gaia".to_string(),
            local_brand: Brand(1),
            denom_uri: DenomUri::from_validated("ics20-1:p/c/uatom".to_string()),
        };
        let a = Peg::new(PegId(1), descriptor.clone());
        let b = Peg::new(PegId(1), descriptor.clone());
        let c = Peg::new(PegId(2), descriptor);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.alleged_name(), "Gaia");
    }
}
