//! # Courier
//!
//! Send and receive algorithms for one (connection, denomination) pair.
//!
//! A courier moves value in two steps around a commit point:
//!
//! | Direction | Commit | Then |
//! |-----------|--------|------|
//! | send | `retain` the escrowed asset | transmit, redeem on failure |
//! | receive | `redeem` the packet amount | forward to the receiver in a spawned task |
//!
//! `retain`/`redeem` depend on the [`CourierKind`] chosen at peg creation.

use crate::algorithms::{decode_ack, encode_packet, make_outbound_packet, parse_amount};
use crate::domain::{
    invariant_brand_match, invariant_packet_conserves, Acknowledgement, Amount, Asset, Brand,
    DenomUri, ForwardingFailure, FungibleTransferPacket, PegError, PoolId, TransferResult,
};
use crate::ports::{AddressRegistry, AssetLedger, AssetRejected, Connection};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a courier retains and redeems value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CourierKind {
    /// Shadow asset minted locally for a remote denomination.
    /// Retain burns, redeem mints.
    RemotePeg,
    /// Real local asset held in a custody pool.
    /// Retain moves into the pool, redeem releases from it.
    LocalPeg {
        /// Custody pool backing the peg.
        pool: PoolId,
    },
}

/// Everything a courier is built from.
pub struct CourierParams {
    /// Brand this courier handles.
    pub local_brand: Brand,
    /// Denomination URI it serves.
    pub denom_uri: DenomUri,
    /// Retain/redeem strategy.
    pub kind: CourierKind,
    /// Connection packets are sent over.
    pub connection: Arc<dyn Connection>,
    /// Ledger used for retain, redeem and refunds.
    pub ledger: Arc<dyn AssetLedger>,
    /// Resolves inbound receivers.
    pub address_registry: Arc<dyn AddressRegistry>,
    /// Bound on the wait for an acknowledgement.
    pub ack_timeout: Duration,
    /// Side channel for inbound value that could not be forwarded.
    pub forwarding_failures: mpsc::UnboundedSender<ForwardingFailure>,
}

/// Transfer engine for one denomination on one connection.
pub struct Courier {
    local_brand: Brand,
    denom_uri: DenomUri,
    kind: CourierKind,
    connection: Arc<dyn Connection>,
    ledger: Arc<dyn AssetLedger>,
    address_registry: Arc<dyn AddressRegistry>,
    ack_timeout: Duration,
    forwarding_failures: mpsc::UnboundedSender<ForwardingFailure>,
}

impl Courier {
    /// Build a courier.
    pub fn new(params: CourierParams) -> Self {
        Self {
            local_brand: params.local_brand,
            denom_uri: params.denom_uri,
            kind: params.kind,
            connection: params.connection,
            ledger: params.ledger,
            address_registry: params.address_registry,
            ack_timeout: params.ack_timeout,
            forwarding_failures: params.forwarding_failures,
        }
    }

    /// Brand this courier handles.
    pub fn local_brand(&self) -> Brand {
        self.local_brand
    }

    /// Denomination URI it serves.
    pub fn denom_uri(&self) -> &DenomUri {
        &self.denom_uri
    }

    /// Retain/redeem strategy.
    pub fn kind(&self) -> CourierKind {
        self.kind
    }

    async fn retain(&self, asset: Asset) -> Result<Amount, AssetRejected> {
        match self.kind {
            CourierKind::RemotePeg => self.ledger.burn(asset).await,
            CourierKind::LocalPeg { pool } => self.ledger.pool_debit(pool, asset).await,
        }
    }

    async fn redeem(&self, amount: Amount) -> Result<Asset, PegError> {
        match self.kind {
            CourierKind::RemotePeg => self.ledger.mint(amount).await,
            CourierKind::LocalPeg { pool } => self.ledger.pool_credit(pool, amount).await,
        }
    }

    /// Send an escrowed asset to `receiver` on the remote chain.
    ///
    /// Failures before the commit hand the asset back untouched as the
    /// refund. After the commit every network or acknowledgement failure is
    /// answered by redeeming the retained amount. The only `Err` after the
    /// commit is [`PegError::RefundFailed`].
    pub async fn send(
        &self,
        asset: Asset,
        receiver: &str,
        sender: Option<&str>,
    ) -> Result<TransferResult, PegError> {
        if let Err(e) = invariant_brand_match(self.local_brand, asset.brand()) {
            warn!(denom_uri = %self.denom_uri, "[peg] rejecting send: {}", e);
            return Ok(TransferResult::refunded(e.to_string().into(), asset));
        }

        let packet = make_outbound_packet(asset.amount(), &self.denom_uri, receiver, sender);
        let bytes = match encode_packet(&packet) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(TransferResult::refunded(e.to_string().into(), asset)),
        };

        // Commit point: the asset no longer exists locally once this succeeds.
        let retained = match self.retain(asset).await {
            Ok(retained) => retained,
            Err(AssetRejected { error, asset }) => {
                warn!(denom_uri = %self.denom_uri, error = %error, "[peg] retain refused, nothing sent");
                return Ok(TransferResult::refunded(error.to_string().into(), asset));
            }
        };
        let attempt = Uuid::new_v4();
        info!(
            %attempt,
            denom_uri = %self.denom_uri,
            amount = %retained.value,
            receiver,
            "[peg] retained for send"
        );

        if !invariant_packet_conserves(retained, &packet.amount) {
            let reason = format!(
                "retained {} but packet carries {}",
                retained.value, packet.amount
            );
            return self.refund(attempt, retained, reason.into()).await;
        }

        match self.transmit(bytes).await {
            Ok(ack) if ack.success => {
                info!(%attempt, denom_uri = %self.denom_uri, "[peg] transfer acknowledged");
                Ok(TransferResult::delivered())
            }
            Ok(ack) => {
                let reason = ack
                    .error
                    .unwrap_or_else(|| JsonValue::String("transfer rejected".to_string()));
                warn!(%attempt, denom_uri = %self.denom_uri, error = %reason, "[peg] transfer rejected by remote");
                self.refund(attempt, retained, reason).await
            }
            Err(e) => {
                warn!(%attempt, denom_uri = %self.denom_uri, error = %e, "[peg] transfer failed in transit");
                self.refund(attempt, retained, e.to_string().into()).await
            }
        }
    }

    async fn transmit(&self, bytes: Vec<u8>) -> Result<Acknowledgement, PegError> {
        let ack_bytes = tokio::time::timeout(self.ack_timeout, self.connection.send(bytes))
            .await
            .map_err(|_| PegError::AckTimeout(self.ack_timeout.as_secs()))??;
        decode_ack(&ack_bytes)
    }

    async fn refund(
        &self,
        attempt: Uuid,
        retained: Amount,
        reason: JsonValue,
    ) -> Result<TransferResult, PegError> {
        let refund = match self.redeem(retained).await {
            Ok(refund) => refund,
            Err(e) => {
                error!(
                    %attempt,
                    denom_uri = %self.denom_uri,
                    amount = %retained.value,
                    error = %e,
                    "[peg] FATAL: refund failed after retain, value is stuck"
                );
                return Err(PegError::RefundFailed {
                    denom_uri: self.denom_uri.to_string(),
                    amount: retained.value.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        info!(%attempt, denom_uri = %self.denom_uri, amount = %retained.value, "[peg] refunded");
        Ok(TransferResult::refunded(reason, refund))
    }

    /// Accept an inbound packet already routed to this courier.
    ///
    /// Returns the redeemed amount as soon as redeem commits. Forwarding to
    /// the receiver runs in a spawned task and never affects the result.
    /// Must be called from within a tokio runtime.
    pub async fn receive(&self, packet: FungibleTransferPacket) -> Result<Amount, PegError> {
        let value = parse_amount(&packet.amount)?;

        // Commit point: the value exists locally once this returns.
        let asset = self.redeem(Amount::new(self.local_brand, value)).await?;
        let redeemed = asset.amount();
        info!(
            denom_uri = %self.denom_uri,
            amount = %redeemed.value,
            receiver = %packet.receiver,
            "[peg] redeemed inbound transfer"
        );

        tokio::spawn(forward(
            self.address_registry.clone(),
            self.forwarding_failures.clone(),
            self.denom_uri.clone(),
            asset,
            packet.receiver,
        ));
        Ok(redeemed)
    }
}

/// Deposit a redeemed asset with its receiver. Anything that goes wrong is
/// reported on `failures` together with the asset.
async fn forward(
    address_registry: Arc<dyn AddressRegistry>,
    failures: mpsc::UnboundedSender<ForwardingFailure>,
    denom_uri: DenomUri,
    asset: Asset,
    receiver: String,
) {
    let (error, asset) = match address_registry.resolve(&receiver).await {
        Ok(facet) => match facet.receive(asset).await {
            Ok(amount) => {
                debug!(receiver = %receiver, amount = %amount, "[peg] forwarded");
                return;
            }
            Err(AssetRejected { error, asset }) => (error, asset),
        },
        Err(error) => (error, asset),
    };

    error!(
        denom_uri = %denom_uri,
        receiver = %receiver,
        amount = %asset.value(),
        error = %error,
        "[peg] forwarding failed after acknowledgement"
    );
    let failure = ForwardingFailure {
        denom_uri,
        receiver,
        error: error.to_string(),
        asset,
    };
    if let Err(mpsc::error::SendError(lost)) = failures.send(failure) {
        error!(
            denom_uri = %lost.denom_uri,
            amount = %lost.asset.value(),
            "[peg] no listener for forwarding failures, asset dropped"
        );
    }
}
