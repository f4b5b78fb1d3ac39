//! # Denomination Codec
//!
//! Derives and splits the canonical denomination URI of a remote asset
//! scoped to a channel endpoint.
//!
//! IBC endpoints are multiaddr-style `/key/value` sequences, for example
//! `/ibc-hop/gaia/ibc-port/transfer/ordered/ics20-1/ibc-channel/chtedite`.
//! The URI keeps only the port and channel:
//! `ics20-1:transfer/chtedite/<denom>`.

use crate::domain::{DenomUri, PegError, TransferProtocol};

/// Endpoint key naming the IBC port.
pub const PORT_KEY: &str = "ibc-port";

/// Endpoint key naming the IBC channel.
pub const CHANNEL_KEY: &str = "ibc-channel";

/// Split an endpoint into its `(key, value)` pairs, in order.
pub fn parse_endpoint(endpoint: &str) -> Result<Vec<(&str, &str)>, PegError> {
    let malformed = |reason: &str| PegError::MalformedEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let rest = endpoint
        .strip_prefix('/')
        .ok_or_else(|| malformed("must start with '/'"))?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.len() % 2 != 0 {
        return Err(malformed("odd number of segments"));
    }

    segments
        .chunks(2)
        .map(|pair| {
            if pair[0].is_empty() || pair[1].is_empty() {
                Err(malformed("empty segment"))
            } else {
                Ok((pair[0], pair[1]))
            }
        })
        .collect()
}

/// Build the denomination URI for `raw_denom` on `endpoint`.
///
/// The protocol is checked first, so an unsupported protocol fails without
/// looking at the endpoint.
pub fn build_denom_uri(
    endpoint: &str,
    raw_denom: &str,
    protocol: &str,
) -> Result<DenomUri, PegError> {
    let protocol: TransferProtocol = protocol.parse()?;
    build_denom_uri_for(endpoint, raw_denom, protocol)
}

/// Typed variant of [`build_denom_uri`].
pub fn build_denom_uri_for(
    endpoint: &str,
    raw_denom: &str,
    protocol: TransferProtocol,
) -> Result<DenomUri, PegError> {
    match protocol {
        TransferProtocol::Ics20V1 => {
            let pairs = parse_endpoint(endpoint)?;
            let find = |key: &'static str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| PegError::MissingEndpointSegment {
                        key,
                        endpoint: endpoint.to_string(),
                    })
            };
            let port = find(PORT_KEY)?;
            let channel = find(CHANNEL_KEY)?;

            Ok(DenomUri::from_validated(format!(
                "{}{}/{}/{}",
                protocol.uri_prefix(),
                port,
                channel,
                raw_denom
            )))
        }
    }
}

/// Strip the protocol prefix, returning the channel-scoped denomination.
pub fn split_denom_uri(uri: &str, protocol: TransferProtocol) -> Result<&str, PegError> {
    let prefix = protocol.uri_prefix();
    uri.strip_prefix(prefix.as_str())
        .ok_or_else(|| PegError::DenomUriPrefixMismatch {
            uri: uri.to_string(),
            prefix,
        })
}

/// Parse a full URI string, checking the protocol prefix.
pub fn parse_denom_uri(uri: &str, protocol: TransferProtocol) -> Result<DenomUri, PegError> {
    split_denom_uri(uri, protocol)?;
    Ok(DenomUri::from_validated(uri.to_string()))
}

/// URI of an inbound packet's denomination.
///
/// The packet carries `port/channel/denom` as seen by the sender; it is
/// scoped to the fixed protocol prefix without further validation since it
/// is only used as a lookup key.
pub fn denom_uri_for_packet(denomination: &str, protocol: TransferProtocol) -> DenomUri {
    DenomUri::from_validated(format!("{}{}", protocol.uri_prefix(), denomination))
}
