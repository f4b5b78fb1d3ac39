//! # Outbound Ports
//!
//! Traits for the collaborators this subsystem drives: the asset ledger,
//! the address registry and the channel transport.

use crate::domain::{
    AccountId, Amount, Asset, Brand, ConnectionId, Issuer, MathKind, PegError, PoolId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Host ledger primitives. Every call is atomic.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    /// Create a fresh asset type this ledger can mint (a shadow asset).
    async fn create_asset_type(
        &self,
        alleged_name: &str,
        math_kind: MathKind,
    ) -> Result<Issuer, PegError>;

    /// Make an asset type known to the ledger's settlement machinery.
    async fn register_asset_type(&self, issuer: &Issuer) -> Result<(), PegError>;

    /// Take an exclusive claim on `amount` from an account.
    async fn escrow(&self, account: &AccountId, amount: Amount) -> Result<Asset, PegError>;

    /// Pay an asset into an account.
    async fn deposit(&self, account: &AccountId, asset: Asset) -> Result<Amount, PegError>;

    /// Destroy an asset. Only valid for asset types this ledger mints.
    ///
    /// On failure the asset comes back untouched.
    async fn burn(&self, asset: Asset) -> Result<Amount, AssetRejected>;

    /// Create an asset. Only valid for asset types this ledger mints.
    async fn mint(&self, amount: Amount) -> Result<Asset, PegError>;

    /// Open a dedicated custody pool for a brand.
    async fn open_pool(&self, brand: Brand) -> Result<PoolId, PegError>;

    /// Move an asset into custody, removing it from circulation.
    ///
    /// On failure the asset comes back untouched.
    async fn pool_debit(&self, pool: PoolId, asset: Asset) -> Result<Amount, AssetRejected>;

    /// Close an empty custody pool.
    async fn close_pool(&self, pool: PoolId) -> Result<(), PegError>;

    /// Release `amount` from custody back into circulation.
    async fn pool_credit(&self, pool: PoolId, amount: Amount) -> Result<Asset, PegError>;
}

/// An asset that was refused by a deposit or a retain. It is handed back
/// untouched.
#[derive(Debug)]
pub struct AssetRejected {
    /// Why the asset was refused.
    pub error: PegError,
    /// The asset offered.
    pub asset: Asset,
}

/// Something that accepts deposits.
#[async_trait]
pub trait DepositFacet: Send + Sync {
    /// Accept an asset.
    async fn receive(&self, asset: Asset) -> Result<Amount, AssetRejected>;
}

/// Resolves receiver address strings to deposit facets.
#[async_trait]
pub trait AddressRegistry: Send + Sync {
    /// Look up the deposit facet for an address.
    async fn resolve(&self, address: &str) -> Result<Arc<dyn DepositFacet>, PegError>;
}

/// An ordered, message-based channel to a remote chain.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Transport-assigned identity.
    fn id(&self) -> ConnectionId;

    /// Local endpoint address.
    fn local_address(&self) -> &str;

    /// Remote endpoint address.
    fn remote_address(&self) -> &str;

    /// Send a packet and wait for the remote acknowledgement bytes.
    async fn send(&self, packet: Vec<u8>) -> Result<Vec<u8>, PegError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// How a [`MockConnection`] answers the next send.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return these acknowledgement bytes.
    Ack(Vec<u8>),
    /// Fail the send with a transport error.
    Fail(String),
    /// Never answer.
    Hang,
}

/// Mock connection for testing. Records every packet sent.
pub struct MockConnection {
    id: ConnectionId,
    local_address: String,
    remote_address: String,
    reply: Mutex<MockReply>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockConnection {
    /// Create a mock that acknowledges every packet successfully.
    pub fn new(id: u64, local_address: &str) -> Self {
        Self {
            id: ConnectionId(id),
            local_address: local_address.to_string(),
            remote_address: "/ibc-port/transfer/ibc-channel/remote".to_string(),
            reply: Mutex::new(MockReply::Ack(br#"{"success":true}"#.to_vec())),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Change how subsequent sends are answered.
    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock() = reply;
    }

    /// Packets sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn local_address(&self) -> &str {
        &self.local_address
    }

    fn remote_address(&self) -> &str {
        &self.remote_address
    }

    async fn send(&self, packet: Vec<u8>) -> Result<Vec<u8>, PegError> {
        self.sent.lock().push(packet);
        let reply = self.reply.lock().clone();
        match reply {
            MockReply::Ack(bytes) => Ok(bytes),
            MockReply::Fail(reason) => Err(PegError::Transport(reason)),
            MockReply::Hang => std::future::pending().await,
        }
    }
}
