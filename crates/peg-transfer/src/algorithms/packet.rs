//! # Packet Codec
//!
//! JSON encoding of transfer packets and acknowledgements, and strict
//! parsing of decimal amounts.

use crate::domain::{
    Acknowledgement, Amount, DenomUri, FungibleTransferPacket, PegError, Value,
};

/// Parse a decimal, non-negative integer amount.
///
/// Rejects signs, fractions, exponents, whitespace and anything that does
/// not fit in [`Value`].
pub fn parse_amount(amount: &str) -> Result<Value, PegError> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PegError::InvalidAmount(amount.to_string()));
    }
    amount
        .parse::<Value>()
        .map_err(|_| PegError::InvalidAmount(amount.to_string()))
}

/// Build the outbound packet for a retained amount.
pub fn make_outbound_packet(
    amount: Amount,
    denom_uri: &DenomUri,
    receiver: &str,
    sender: Option<&str>,
) -> FungibleTransferPacket {
    FungibleTransferPacket {
        amount: amount.value.to_string(),
        denomination: denom_uri.prefixed_denom().to_string(),
        receiver: receiver.to_string(),
        sender: sender.map(str::to_string),
    }
}

/// Serialize a packet to wire bytes.
pub fn encode_packet(packet: &FungibleTransferPacket) -> Result<Vec<u8>, PegError> {
    serde_json::to_vec(packet).map_err(|e| PegError::MalformedPacket(e.to_string()))
}

/// Deserialize wire bytes into a packet.
pub fn decode_packet(bytes: &[u8]) -> Result<FungibleTransferPacket, PegError> {
    serde_json::from_slice(bytes).map_err(|e| PegError::MalformedPacket(e.to_string()))
}

/// Serialize an acknowledgement.
///
/// Acknowledgements contain only a bool and a JSON value, so this cannot
/// fail in practice; a hand-written fallback keeps the handler total.
pub fn encode_ack(ack: &Acknowledgement) -> Vec<u8> {
    serde_json::to_vec(ack).unwrap_or_else(|_| br#"{"success":false}"#.to_vec())
}

/// Deserialize an acknowledgement.
pub fn decode_ack(bytes: &[u8]) -> Result<Acknowledgement, PegError> {
    serde_json::from_slice(bytes).map_err(|e| PegError::MalformedPacket(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::build_denom_uri;
    use crate::domain::Brand;

    #[test]
    fn test_parse_amount_valid() {
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount("100").unwrap(), 100);
        assert_eq!(
            parse_amount("340282366920938463463374607431768211455").unwrap(),
            u128::MAX
        );
    }

    #[test]
    fn test_parse_amount_rejects_non_integers() {
        for bad in ["", "-1", "+1", "1.5", "1e3", " 1", "abc", "0x10"] {
            assert!(
                matches!(parse_amount(bad), Err(PegError::InvalidAmount(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_amount_rejects_overflow() {
        assert!(parse_amount("340282366920938463463374607431768211456").is_err());
    }

    #[test]
    fn test_outbound_packet_scenario() {
        let uri = build_denom_uri("/ibc-port/portdef/ibc-channel/chanabc", "uatom", "ics20-1")
            .unwrap();
        let packet = make_outbound_packet(Amount::new(Brand(1), 100), &uri, "markaccount", None);
        let json: serde_json::Value =
            serde_json::from_slice(&encode_packet(&packet).unwrap()).unwrap();
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
    fn test_decode_packet_with_sender() {
        let bytes = br#"{"amount":"100","denomination":"portdef/chanabc/uatom","receiver":"0x1234","sender":"cosmos1abc"}"#;
        let packet = decode_packet(bytes).unwrap();
        assert_eq!(packet.sender.as_deref(), Some("cosmos1abc"));
        assert_eq!(packet.receiver, "0x1234");
    }

    #[test]
    fn test_decode_packet_malformed() {
        assert!(matches!(
            decode_packet(b"not json"),
            Err(PegError::MalformedPacket(_))
        ));
        assert!(matches!(
            decode_packet(br#"{"amount":"1"}"#),
            Err(PegError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_decode_ack_with_structured_error() {
        let ack = decode_ack(br#"{"success":false,"error":{"code":7}}"#).unwrap();
        assert!(!ack.success);
        assert_eq!(ack.error, Some(serde_json::json!({"code": 7})));
    }

    #[test]
    fn test_encode_ack() {
        assert_eq!(encode_ack(&Acknowledgement::success()), br#"{"success":true}"#);
    }
}
