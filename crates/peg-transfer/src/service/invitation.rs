//! # Transfer Invitation
//!
//! Single-use capability to send value of one peg's brand to one
//! destination. Exercising it escrows from the payer, drives the courier
//! and settles any refund back into the payer's account.

use crate::domain::{invariant_brand_match, AccountId, Amount, Peg, PegError};
use crate::service::peg_registry::PegRegistry;
use serde_json::Value as JsonValue;
use tracing::{error, info};

/// How an exercised invitation settled.
#[derive(Clone, Debug, PartialEq)]
pub enum TransferOutcome {
    /// The remote side acknowledged the transfer.
    Delivered {
        /// Amount that left the payer.
        amount: Amount,
    },
    /// The transfer failed and the payer was made whole.
    Refunded {
        /// Remote or transport error.
        error: JsonValue,
        /// Amount paid back to the payer.
        refunded: Amount,
    },
}

impl TransferOutcome {
    /// True if the transfer was delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Capability returned by `initiate_transfer`.
pub struct TransferInvitation {
    registry: PegRegistry,
    peg: Peg,
    destination: String,
    sender: Option<String>,
}

impl TransferInvitation {
    pub(crate) fn new(registry: PegRegistry, peg: Peg, destination: String) -> Self {
        Self {
            registry,
            peg,
            destination,
            sender: None,
        }
    }

    /// Put a sender address on the outbound packet.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Peg this invitation transfers over.
    pub fn peg(&self) -> &Peg {
        &self.peg
    }

    /// Remote deposit address.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Escrow `amount` from `payer` and send it.
    ///
    /// Brand and connectivity are checked before anything is escrowed.
    pub async fn exercise(
        self,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<TransferOutcome, PegError> {
        invariant_brand_match(self.peg.local_brand(), amount.brand)?;
        let courier = self.registry.resolve_courier(&self.peg)?;
        let ledger = self.registry.ledger().clone();

        let asset = ledger.escrow(payer, amount).await?;
        let result = courier
            .send(asset, &self.destination, self.sender.as_deref())
            .await?;

        if result.success {
            info!(
                payer = %payer,
                destination = %self.destination,
                amount = %amount.value,
                "[peg] transfer delivered"
            );
            return Ok(TransferOutcome::Delivered { amount });
        }

        let reason = result.error.unwrap_or(JsonValue::Null);
        let refund = result.refund.ok_or_else(|| PegError::RefundFailed {
            denom_uri: self.peg.denom_uri().to_string(),
            amount: amount.value.to_string(),
            reason: "courier returned no refund".to_string(),
        })?;
        let refund_value = refund.value();
        match ledger.deposit(payer, refund).await {
            Ok(refunded) => Ok(TransferOutcome::Refunded {
                error: reason,
                refunded,
            }),
            Err(e) => {
                error!(
                    payer = %payer,
                    amount = %refund_value,
                    error = %e,
                    "[peg] FATAL: could not pay refund back to payer"
                );
                Err(PegError::RefundFailed {
                    denom_uri: self.peg.denom_uri().to_string(),
                    amount: refund_value.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
