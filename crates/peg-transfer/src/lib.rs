//! # Peg Transfer
//!
//! Cross-chain asset pegging over ordered, message-based channels.
//!
//! **Protocol:** `ics20-1` fungible token transfer
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Bind local asset types to denominations on remote chains and move value
//! across a channel without creating or losing it:
//! - Remote pegs mint a shadow asset on the way in and burn it on the way out
//! - Local pegs keep a real asset in a custody pool while it is abroad
//! - A failed send always refunds the retained amount
//!
//! ## Commit Points
//!
//! | Direction | Commit | On failure after commit |
//! |-----------|--------|-------------------------|
//! | Outbound | retain (burn / pool debit) | redeem and refund |
//! | Inbound | redeem (mint / pool credit) | forwarding failure reported, ack stays positive |
//!
//! A refund that cannot be redeemed is [`PegError::RefundFailed`], the one
//! fatal error.
//!
//! ## Module Structure
//!
//! ```text
//! peg-transfer/
//! ├── domain/          # Brand, Amount, Asset, DenomUri, Peg, errors
//! ├── algorithms/      # Denomination URIs, packet codec
//! ├── ports/           # PegApi, ConnectionHandler, AssetLedger, Connection
//! ├── adapters/        # In-memory ledger, address registry, loopback transport
//! └── service/         # Channel registry, courier, peg registry
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports
pub use adapters::{
    InMemoryAddressRegistry, InMemoryAssetLedger, InMemoryPurse, LoopbackConnection,
    LoopbackNetwork,
};
pub use algorithms::{build_denom_uri, parse_endpoint, split_denom_uri};
pub use config::PegConfig;
pub use domain::{
    AccountId, Acknowledgement, Amount, Asset, Brand, ConnectionId, DenomUri, ErrorClass,
    ForwardingFailure, FungibleTransferPacket, Issuer, MathKind, Peg, PegDescriptor, PegError,
    PegId, PoolId, TransferProtocol, TransferResult, Value,
};
pub use ports::{
    AddressRegistry, AssetLedger, AssetRejected, Connection, ConnectionHandler, DepositFacet,
    MockConnection, MockReply, PegApi, PegLocalRequest, PegRemoteRequest,
};
pub use service::{
    Courier, CourierKind, PegNotifier, PegRegistry, PegSnapshot, TransferInvitation,
    TransferOutcome,
};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
