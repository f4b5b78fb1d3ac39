//! # Algorithms Module
//!
//! Pure codecs: denomination URIs and wire records.

pub mod denom_uri;
pub mod packet;

pub use denom_uri::{
    build_denom_uri, build_denom_uri_for, denom_uri_for_packet, parse_denom_uri, parse_endpoint,
    split_denom_uri, CHANNEL_KEY, PORT_KEY,
};
pub use packet::{
    decode_ack, decode_packet, encode_ack, encode_packet, make_outbound_packet, parse_amount,
};
