//! # Inbound Ports
//!
//! What the pegging subsystem offers: the peg API used by callers and the
//! connection handler driven by the channel transport.

use crate::domain::{Brand, ConnectionId, Issuer, Peg, PegError};
use crate::ports::outbound::Connection;
use crate::service::{PegNotifier, TransferInvitation};
use async_trait::async_trait;
use std::sync::Arc;

/// Parameters for pegging a remote asset.
///
/// `math_kind` and `protocol` are kept as strings so that unsupported values
/// are reported as validation errors by the registry. Left unset, they fall
/// back to the registry's [`PegConfig`](crate::config::PegConfig).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PegRemoteRequest {
    /// Debug name for the peg.
    pub alleged_name: String,
    /// Connection to peg over.
    pub connection: ConnectionId,
    /// Remote denomination, e.g. `uatom`.
    pub remote_denom: String,
    /// Amount math kind, or the configured one.
    pub math_kind: Option<String>,
    /// Transfer protocol, or the configured one.
    pub protocol: Option<String>,
}

impl PegRemoteRequest {
    /// Request using the configured math kind and protocol.
    pub fn new(
        alleged_name: impl Into<String>,
        connection: ConnectionId,
        remote_denom: impl Into<String>,
    ) -> Self {
        Self {
            alleged_name: alleged_name.into(),
            connection,
            remote_denom: remote_denom.into(),
            math_kind: None,
            protocol: None,
        }
    }

    /// Override the math kind.
    pub fn math_kind(mut self, math_kind: impl Into<String>) -> Self {
        self.math_kind = Some(math_kind.into());
        self
    }

    /// Override the protocol.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// Parameters for pegging an existing local asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PegLocalRequest {
    /// Debug name for the peg.
    pub alleged_name: String,
    /// Connection to peg over.
    pub connection: ConnectionId,
    /// Issuer of the local asset to back the peg.
    pub issuer: Issuer,
    /// Transfer protocol, or the configured one.
    pub protocol: Option<String>,
}

impl PegLocalRequest {
    /// Request using the configured protocol.
    pub fn new(alleged_name: impl Into<String>, connection: ConnectionId, issuer: Issuer) -> Self {
        Self {
            alleged_name: alleged_name.into(),
            connection,
            issuer,
            protocol: None,
        }
    }

    /// Override the protocol.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// Peg API - inbound port.
#[async_trait]
pub trait PegApi: Send + Sync {
    /// Peg a remote asset, creating (or reusing) its shadow asset type.
    async fn peg_remote(&self, request: PegRemoteRequest) -> Result<Peg, PegError>;

    /// Peg an existing local asset, backed by a custody pool.
    async fn peg_local(&self, request: PegLocalRequest) -> Result<Peg, PegError>;

    /// Issuer registered for a brand.
    fn get_issuer_for(&self, brand: Brand) -> Result<Issuer, PegError>;

    /// Observable list of every peg ever created.
    fn notifier_of_all_pegs(&self) -> PegNotifier;

    /// Capability to move value of the peg's brand to `destination`.
    fn initiate_transfer(
        &self,
        peg: &Peg,
        destination: &str,
    ) -> Result<TransferInvitation, PegError>;
}

/// Callbacks the channel transport invokes. Never invoked concurrently for
/// one connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Connection established. A connection may be opened exactly once.
    async fn on_open(
        &self,
        connection: Arc<dyn Connection>,
        local_address: &str,
        remote_address: &str,
    ) -> Result<(), PegError>;

    /// Inbound packet; returns the acknowledgement bytes. Never fails.
    async fn on_receive(&self, connection: &Arc<dyn Connection>, packet: &[u8]) -> Vec<u8>;

    /// Connection torn down.
    async fn on_close(&self, connection: &Arc<dyn Connection>);
}
