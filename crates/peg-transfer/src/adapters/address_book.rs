//! Address Registry Adapter
//!
//! Resolves receiver addresses to in-process deposit facets.

use crate::domain::{Amount, Asset, Brand, PegError, Value};
use crate::ports::outbound::{AddressRegistry, AssetRejected, DepositFacet};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Address -> deposit facet table.
#[derive(Default)]
pub struct InMemoryAddressRegistry {
    facets: RwLock<HashMap<String, Arc<dyn DepositFacet>>>,
}

impl InMemoryAddressRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a deposit facet under an address.
    pub fn insert(&self, address: &str, facet: Arc<dyn DepositFacet>) {
        self.facets.write().insert(address.to_string(), facet);
    }
}

#[async_trait]
impl AddressRegistry for InMemoryAddressRegistry {
    async fn resolve(&self, address: &str) -> Result<Arc<dyn DepositFacet>, PegError> {
        self.facets
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| PegError::UnknownDepositAddress(address.to_string()))
    }
}

/// A purse that accumulates whatever is deposited into it.
#[derive(Default)]
pub struct InMemoryPurse {
    balances: RwLock<HashMap<Brand, Value>>,
    refusing: bool,
}

impl InMemoryPurse {
    /// Purse accepting every brand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Purse that refuses every deposit.
    pub fn refusing() -> Self {
        Self {
            refusing: true,
            ..Self::default()
        }
    }

    /// Balance held of one brand.
    pub fn balance(&self, brand: Brand) -> Value {
        self.balances.read().get(&brand).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DepositFacet for InMemoryPurse {
    async fn receive(&self, asset: Asset) -> Result<Amount, AssetRejected> {
        if self.refusing {
            return Err(AssetRejected {
                error: PegError::Ledger("purse refuses deposits".to_string()),
                asset,
            });
        }
        let amount = asset.amount();
        let mut balances = self.balances.write();
        let balance = balances.entry(amount.brand).or_insert(0);
        match balance.checked_add(amount.value) {
            Some(total) => *balance = total,
            None => {
                return Err(AssetRejected {
                    error: PegError::Ledger("purse balance overflow".to_string()),
                    asset,
                })
            }
        }
        debug!("[peg] Purse received {}", amount);
        Ok(asset.into_amount())
    }
}
