//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-process implementations of the outbound ports: an asset ledger, an
//! address registry with purses, and a loopback transport.

mod address_book;
mod asset_ledger;
mod loopback;

pub use address_book::{InMemoryAddressRegistry, InMemoryPurse};
pub use asset_ledger::InMemoryAssetLedger;
pub use loopback::{LoopbackConnection, LoopbackNetwork};
