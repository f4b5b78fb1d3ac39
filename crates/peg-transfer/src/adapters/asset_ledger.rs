//! Asset Ledger Adapter
//!
//! Implements the `AssetLedger` port with in-process balances.

use crate::domain::{AccountId, Amount, Asset, Brand, Issuer, MathKind, PegError, PoolId, Value};
use crate::ports::outbound::{AssetLedger, AssetRejected};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Default)]
struct LedgerState {
    next_brand: u64,
    next_pool: u64,
    issuers: HashMap<Brand, Issuer>,
    /// Brands this ledger may mint and burn.
    mintable: HashSet<Brand>,
    registered: HashSet<Brand>,
    accounts: HashMap<(AccountId, Brand), Value>,
    /// Pool -> (brand, custody).
    pools: HashMap<PoolId, (Brand, Value)>,
    /// Outstanding minted supply per mintable brand.
    supply: HashMap<Brand, Value>,
    minting_paused: bool,
}

impl LedgerState {
    fn new_brand(&mut self, alleged_name: &str, math_kind: MathKind) -> Issuer {
        self.next_brand += 1;
        let issuer = Issuer {
            brand: Brand(self.next_brand),
            alleged_name: alleged_name.to_string(),
            math_kind,
        };
        self.issuers.insert(issuer.brand, issuer.clone());
        issuer
    }
}

/// In-memory asset ledger.
///
/// Accounts, custody pools and minted supply are plain counters. Natively
/// issued brands (see [`InMemoryAssetLedger::native_asset_type`]) can be
/// escrowed and pooled but never minted.
pub struct InMemoryAssetLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryAssetLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Create an asset type that exists independently of any peg.
    pub fn native_asset_type(&self, alleged_name: &str) -> Issuer {
        self.state.write().new_brand(alleged_name, MathKind::Nat)
    }

    /// Credit an account out of thin air, for testing.
    pub fn credit(&self, account: &AccountId, amount: Amount) {
        *self
            .state
            .write()
            .accounts
            .entry((account.clone(), amount.brand))
            .or_insert(0) += amount.value;
    }

    /// Account balance of one brand.
    pub fn balance(&self, account: &AccountId, brand: Brand) -> Value {
        self.state
            .read()
            .accounts
            .get(&(account.clone(), brand))
            .copied()
            .unwrap_or(0)
    }

    /// Outstanding minted supply of a brand.
    pub fn supply(&self, brand: Brand) -> Value {
        self.state.read().supply.get(&brand).copied().unwrap_or(0)
    }

    /// Outstanding minted supply across every brand.
    pub fn total_supply(&self) -> Value {
        self.state.read().supply.values().sum()
    }

    /// Value held in a custody pool.
    pub fn pool_balance(&self, pool: PoolId) -> Value {
        self.state
            .read()
            .pools
            .get(&pool)
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }

    /// Number of open custody pools.
    pub fn pool_count(&self) -> usize {
        self.state.read().pools.len()
    }

    /// Number of asset types, native or minted.
    pub fn asset_type_count(&self) -> usize {
        self.state.read().issuers.len()
    }

    /// True once `register_asset_type` has accepted the brand.
    pub fn is_registered(&self, brand: Brand) -> bool {
        self.state.read().registered.contains(&brand)
    }

    /// Make every subsequent mint fail, for testing.
    pub fn pause_minting(&self, paused: bool) {
        self.state.write().minting_paused = paused;
    }
}

impl Default for InMemoryAssetLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetLedger for InMemoryAssetLedger {
    async fn create_asset_type(
        &self,
        alleged_name: &str,
        math_kind: MathKind,
    ) -> Result<Issuer, PegError> {
        let mut state = self.state.write();
        let issuer = state.new_brand(alleged_name, math_kind);
        state.mintable.insert(issuer.brand);
        info!("[peg] Created asset type {} ({})", issuer.brand, alleged_name);
        Ok(issuer)
    }

    async fn register_asset_type(&self, issuer: &Issuer) -> Result<(), PegError> {
        let mut state = self.state.write();
        if !state.issuers.contains_key(&issuer.brand) {
            return Err(PegError::Ledger(format!(
                "unknown asset type {}",
                issuer.brand
            )));
        }
        state.registered.insert(issuer.brand);
        Ok(())
    }

    async fn escrow(&self, account: &AccountId, amount: Amount) -> Result<Asset, PegError> {
        let mut state = self.state.write();
        let balance = state
            .accounts
            .get_mut(&(account.clone(), amount.brand))
            .filter(|balance| **balance >= amount.value)
            .ok_or_else(|| {
                PegError::Ledger(format!("{} has insufficient funds for {}", account, amount))
            })?;
        *balance -= amount.value;
        debug!("[peg] Escrowed {} from {}", amount, account);
        Ok(Asset::new(amount))
    }

    async fn deposit(&self, account: &AccountId, asset: Asset) -> Result<Amount, PegError> {
        let amount = asset.into_amount();
        let mut state = self.state.write();
        let balance = state
            .accounts
            .entry((account.clone(), amount.brand))
            .or_insert(0);
        *balance = balance
            .checked_add(amount.value)
            .ok_or_else(|| PegError::Ledger(format!("balance overflow for {}", account)))?;
        debug!("[peg] Deposited {} into {}", amount, account);
        Ok(amount)
    }

    async fn burn(&self, asset: Asset) -> Result<Amount, AssetRejected> {
        let mut state = self.state.write();
        let brand = asset.brand();
        if !state.mintable.contains(&brand) {
            return Err(AssetRejected {
                error: PegError::Ledger(format!("cannot burn {}", brand)),
                asset,
            });
        }
        let outstanding = state.supply.get(&brand).copied().unwrap_or(0);
        let Some(remaining) = outstanding.checked_sub(asset.value()) else {
            return Err(AssetRejected {
                error: PegError::Ledger(format!(
                    "burn of {} exceeds outstanding supply {}",
                    asset.amount(),
                    outstanding
                )),
                asset,
            });
        };
        state.supply.insert(brand, remaining);
        let amount = asset.into_amount();
        debug!("[peg] Burned {}", amount);
        Ok(amount)
    }

    async fn mint(&self, amount: Amount) -> Result<Asset, PegError> {
        let mut state = self.state.write();
        if !state.mintable.contains(&amount.brand) {
            return Err(PegError::Ledger(format!("cannot mint {}", amount.brand)));
        }
        if state.minting_paused {
            return Err(PegError::Ledger("minting paused".to_string()));
        }
        let supply = state.supply.entry(amount.brand).or_insert(0);
        *supply = supply
            .checked_add(amount.value)
            .ok_or_else(|| PegError::Ledger(format!("supply overflow for {}", amount.brand)))?;
        debug!("[peg] Minted {}", amount);
        Ok(Asset::new(amount))
    }

    async fn open_pool(&self, brand: Brand) -> Result<PoolId, PegError> {
        let mut state = self.state.write();
        if !state.issuers.contains_key(&brand) {
            return Err(PegError::Ledger(format!("unknown asset type {}", brand)));
        }
        state.next_pool += 1;
        let pool = PoolId(state.next_pool);
        state.pools.insert(pool, (brand, 0));
        info!("[peg] Opened custody pool {} for {}", pool.0, brand);
        Ok(pool)
    }

    async fn pool_debit(&self, pool: PoolId, asset: Asset) -> Result<Amount, AssetRejected> {
        let mut state = self.state.write();
        let Some((brand, custody)) = state.pools.get_mut(&pool) else {
            return Err(AssetRejected {
                error: PegError::Ledger(format!("unknown pool {}", pool.0)),
                asset,
            });
        };
        if *brand != asset.brand() {
            let error = PegError::Ledger(format!(
                "pool {} holds {}, not {}",
                pool.0,
                brand,
                asset.brand()
            ));
            return Err(AssetRejected { error, asset });
        }
        let Some(total) = custody.checked_add(asset.value()) else {
            return Err(AssetRejected {
                error: PegError::Ledger(format!("custody overflow in pool {}", pool.0)),
                asset,
            });
        };
        *custody = total;
        let amount = asset.into_amount();
        debug!("[peg] Pool {} took custody of {}", pool.0, amount);
        Ok(amount)
    }

    async fn close_pool(&self, pool: PoolId) -> Result<(), PegError> {
        let mut state = self.state.write();
        match state.pools.get(&pool) {
            None => Err(PegError::Ledger(format!("unknown pool {}", pool.0))),
            Some((_, custody)) if *custody > 0 => Err(PegError::Ledger(format!(
                "pool {} still holds {}",
                pool.0, custody
            ))),
            Some(_) => {
                state.pools.remove(&pool);
                info!("[peg] Closed custody pool {}", pool.0);
                Ok(())
            }
        }
    }

    async fn pool_credit(&self, pool: PoolId, amount: Amount) -> Result<Asset, PegError> {
        let mut state = self.state.write();
        let (brand, custody) = state
            .pools
            .get_mut(&pool)
            .ok_or_else(|| PegError::Ledger(format!("unknown pool {}", pool.0)))?;
        if *brand != amount.brand || *custody < amount.value {
            return Err(PegError::Ledger(format!(
                "pool {} cannot release {}",
                pool.0, amount
            )));
        }
        *custody -= amount.value;
        debug!("[peg] Pool {} released {}", pool.0, amount);
        Ok(Asset::new(amount))
    }
}
