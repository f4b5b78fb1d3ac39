//! # Peg Registry
//!
//! Creates pegs, owns the channel registry and routes inbound packets.
//!
//! ## Locking
//!
//! All mutable state sits behind one `parking_lot::Mutex`. The lock is
//! never held across an `.await`: ledger calls and sends happen between
//! short critical sections. A peg's denomination URI is reserved on its
//! channel before the first ledger call, so concurrent requests for the same
//! URI fail before touching the ledger.

use crate::algorithms::{build_denom_uri_for, decode_packet, denom_uri_for_packet, encode_ack};
use crate::config::PegConfig;
use crate::domain::{
    invariant_denom_format, Acknowledgement, Amount, Brand, ConnectionId, DenomUri,
    ForwardingFailure, Issuer, MathKind, Peg, PegDescriptor, PegError, PegId, TransferProtocol,
};
use crate::ports::{
    AddressRegistry, AssetLedger, Connection, ConnectionHandler, PegApi, PegLocalRequest,
    PegRemoteRequest,
};
use crate::service::channel::ChannelRegistry;
use crate::service::courier::{Courier, CourierKind, CourierParams};
use crate::service::invitation::TransferInvitation;
use crate::service::notifier::{PegNotifier, PegSnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

struct RegisteredIssuer {
    issuer: Issuer,
    keyword: String,
}

#[derive(Default)]
struct RegistryState {
    channels: ChannelRegistry,
    issuers: HashMap<Brand, RegisteredIssuer>,
    peg_to_connection: HashMap<PegId, ConnectionId>,
    uri_to_shadow: HashMap<DenomUri, Issuer>,
    pegs: HashMap<PegId, Peg>,
    next_peg_id: u64,
    issuer_nonce: u64,
}

impl RegistryState {
    fn remember_issuer(&mut self, issuer: &Issuer) {
        if self.issuers.contains_key(&issuer.brand) {
            return;
        }
        self.issuer_nonce += 1;
        let keyword = format!("Local{}", self.issuer_nonce);
        debug!(brand = %issuer.brand, keyword = %keyword, "[peg] issuer registered");
        self.issuers.insert(
            issuer.brand,
            RegisteredIssuer {
                issuer: issuer.clone(),
                keyword,
            },
        );
    }
}

/// Claim on a denomination URI while its peg is built. Dropping it releases
/// the claim; after the courier is registered that is a no-op.
struct Reservation<'a> {
    state: &'a Mutex<RegistryState>,
    connection: ConnectionId,
    denom_uri: DenomUri,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .channels
            .release(self.connection, &self.denom_uri);
    }
}

struct Inner {
    config: PegConfig,
    protocol: TransferProtocol,
    math_kind: MathKind,
    ledger: Arc<dyn AssetLedger>,
    address_registry: Arc<dyn AddressRegistry>,
    state: Mutex<RegistryState>,
    pegs_tx: watch::Sender<PegSnapshot>,
    forwarding_tx: mpsc::UnboundedSender<ForwardingFailure>,
    forwarding_rx: Mutex<Option<mpsc::UnboundedReceiver<ForwardingFailure>>>,
}

/// Peg registry. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PegRegistry {
    inner: Arc<Inner>,
}

impl PegRegistry {
    /// Create a registry over a ledger and an address registry.
    pub fn new(
        config: PegConfig,
        ledger: Arc<dyn AssetLedger>,
        address_registry: Arc<dyn AddressRegistry>,
    ) -> Result<Self, PegError> {
        let protocol = config.validate()?;
        let math_kind = config.math_kind.parse()?;
        let (pegs_tx, _) = watch::channel(PegSnapshot::default());
        let (forwarding_tx, forwarding_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                protocol,
                math_kind,
                ledger,
                address_registry,
                state: Mutex::new(RegistryState::default()),
                pegs_tx,
                forwarding_tx,
                forwarding_rx: Mutex::new(Some(forwarding_rx)),
            }),
        })
    }

    fn reservation(&self, connection: ConnectionId, denom_uri: DenomUri) -> Reservation<'_> {
        Reservation {
            state: &self.inner.state,
            connection,
            denom_uri,
        }
    }

    fn request_protocol(&self, requested: Option<&str>) -> Result<TransferProtocol, PegError> {
        requested.map_or(Ok(self.inner.protocol), str::parse)
    }

    /// Active configuration.
    pub fn config(&self) -> &PegConfig {
        &self.inner.config
    }

    /// Keyword assigned to a registered issuer (`Local1`, `Local2`, ...).
    pub fn keyword_for(&self, brand: Brand) -> Result<String, PegError> {
        self.inner
            .state
            .lock()
            .issuers
            .get(&brand)
            .map(|r| r.keyword.clone())
            .ok_or_else(|| PegError::UnknownBrand(brand.to_string()))
    }

    /// Pegs created on a live connection, in creation order.
    pub fn pegs_for_connection(&self, connection: ConnectionId) -> Result<Vec<Peg>, PegError> {
        let state = self.inner.state.lock();
        let ids = state.channels.pegs(connection)?;
        Ok(ids
            .iter()
            .filter_map(|id| state.pegs.get(id).cloned())
            .collect())
    }

    /// Most recently created peg for a brand.
    pub fn peg_by_brand(&self, brand: Brand) -> Result<Peg, PegError> {
        self.inner
            .state
            .lock()
            .pegs
            .values()
            .filter(|peg| peg.local_brand() == brand)
            .max_by_key(|peg| peg.id())
            .cloned()
            .ok_or_else(|| PegError::UnknownBrand(brand.to_string()))
    }

    /// Receiver of inbound value that was acknowledged but could not be
    /// forwarded. Available once.
    pub fn take_forwarding_failures(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<ForwardingFailure>> {
        self.inner.forwarding_rx.lock().take()
    }

    /// Courier currently serving a peg.
    pub(crate) fn resolve_courier(&self, peg: &Peg) -> Result<Arc<Courier>, PegError> {
        let state = self.inner.state.lock();
        match state.pegs.get(&peg.id()) {
            Some(known) if known.descriptor() == peg.descriptor() => {}
            _ => return Err(PegError::UnknownPeg(peg.id().0)),
        }
        let connection = state
            .peg_to_connection
            .get(&peg.id())
            .ok_or_else(|| PegError::PegDisconnected(peg.alleged_name().to_string()))?;
        state.channels.courier(*connection, peg.denom_uri())
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn AssetLedger> {
        &self.inner.ledger
    }

    fn build_courier(
        &self,
        local_brand: Brand,
        denom_uri: DenomUri,
        kind: CourierKind,
        connection: Arc<dyn Connection>,
    ) -> Arc<Courier> {
        Arc::new(Courier::new(CourierParams {
            local_brand,
            denom_uri,
            kind,
            connection,
            ledger: self.inner.ledger.clone(),
            address_registry: self.inner.address_registry.clone(),
            ack_timeout: self.inner.config.ack_timeout(),
            forwarding_failures: self.inner.forwarding_tx.clone(),
        }))
    }

    /// Register the peg handle and publish the new peg list.
    fn add_peg(
        &self,
        state: &mut RegistryState,
        connection: ConnectionId,
        alleged_name: String,
        local_brand: Brand,
        denom_uri: DenomUri,
    ) -> Result<Peg, PegError> {
        let id = PegId(state.next_peg_id + 1);
        state.channels.add_peg(connection, id)?;
        state.next_peg_id = id.0;

        let peg = Peg::new(
            id,
            PegDescriptor {
                alleged_name,
                local_brand,
                denom_uri,
            },
        );
        state.peg_to_connection.insert(id, connection);
        state.pegs.insert(id, peg.clone());
        self.inner.pegs_tx.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.pegs.push(peg.clone());
        });
        Ok(peg)
    }

    async fn route_inbound(&self, connection: ConnectionId, bytes: &[u8]) -> Result<Amount, PegError> {
        let packet = decode_packet(bytes)?;
        let denom_uri = denom_uri_for_packet(&packet.denomination, self.inner.protocol);
        let courier = self
            .inner
            .state
            .lock()
            .channels
            .courier(connection, &denom_uri)?;
        debug!(connection = %connection, denom_uri = %denom_uri, "[peg] routing inbound packet");
        courier.receive(packet).await
    }
}

#[async_trait]
impl PegApi for PegRegistry {
    async fn peg_remote(&self, request: PegRemoteRequest) -> Result<Peg, PegError> {
        invariant_denom_format(&request.remote_denom)?;
        let math_kind = request
            .math_kind
            .as_deref()
            .map_or(Ok(self.inner.math_kind), str::parse)?;
        let protocol = self.request_protocol(request.protocol.as_deref())?;
        let id = request.connection;

        let (connection, reservation, shadow) = {
            let mut state = self.inner.state.lock();
            let local_address = state.channels.local_address(id)?;
            let denom_uri = build_denom_uri_for(local_address, &request.remote_denom, protocol)?;
            let connection = state.channels.connection(id)?;
            state.channels.reserve(id, &denom_uri)?;
            let shadow = state.uri_to_shadow.get(&denom_uri).cloned();
            (connection, self.reservation(id, denom_uri), shadow)
        };
        let denom_uri = reservation.denom_uri.clone();

        let issuer = match shadow {
            Some(issuer) => {
                debug!(denom_uri = %denom_uri, brand = %issuer.brand, "[peg] reusing shadow asset");
                issuer
            }
            None => {
                let issuer = self
                    .inner
                    .ledger
                    .create_asset_type(denom_uri.as_str(), math_kind)
                    .await?;
                self.inner.ledger.register_asset_type(&issuer).await?;
                // Kept even if the channel closes before registration.
                self.inner
                    .state
                    .lock()
                    .uri_to_shadow
                    .insert(denom_uri.clone(), issuer.clone());
                issuer
            }
        };

        let courier = self.build_courier(
            issuer.brand,
            denom_uri.clone(),
            CourierKind::RemotePeg,
            connection,
        );
        let peg = {
            let mut state = self.inner.state.lock();
            state
                .channels
                .register_courier(id, denom_uri.clone(), courier)?;
            state.remember_issuer(&issuer);
            self.add_peg(&mut state, id, request.alleged_name, issuer.brand, denom_uri)?
        };
        drop(reservation);

        info!(
            peg = peg.id().0,
            connection = %id,
            denom_uri = %peg.denom_uri(),
            brand = %peg.local_brand(),
            "[peg] remote asset pegged"
        );
        Ok(peg)
    }

    async fn peg_local(&self, request: PegLocalRequest) -> Result<Peg, PegError> {
        let protocol = self.request_protocol(request.protocol.as_deref())?;
        let id = request.connection;
        let issuer = request.issuer;

        let (connection, known, reservation) = {
            let mut state = self.inner.state.lock();
            let connection = state.channels.connection(id)?;
            let nonce = state.channels.next_local_denom(id)?;
            let raw_denom = format!("{}{}", self.inner.config.local_denom_prefix, nonce);
            let denom_uri =
                build_denom_uri_for(state.channels.local_address(id)?, &raw_denom, protocol)?;
            state.channels.reserve(id, &denom_uri)?;
            (
                connection,
                state.issuers.contains_key(&issuer.brand),
                self.reservation(id, denom_uri),
            )
        };
        let denom_uri = reservation.denom_uri.clone();

        if !known {
            self.inner.ledger.register_asset_type(&issuer).await?;
        }
        let pool = self.inner.ledger.open_pool(issuer.brand).await?;

        let courier = self.build_courier(
            issuer.brand,
            denom_uri.clone(),
            CourierKind::LocalPeg { pool },
            connection,
        );
        let registered = {
            let mut state = self.inner.state.lock();
            match state.channels.register_courier(id, denom_uri.clone(), courier) {
                Ok(()) => {
                    state.remember_issuer(&issuer);
                    self.add_peg(&mut state, id, request.alleged_name, issuer.brand, denom_uri)
                }
                Err(e) => Err(e),
            }
        };
        drop(reservation);

        let peg = match registered {
            Ok(peg) => peg,
            Err(e) => {
                // The channel went away while the pool was being opened.
                if let Err(close_err) = self.inner.ledger.close_pool(pool).await {
                    warn!(pool = pool.0, error = %close_err, "[peg] could not close unused pool");
                }
                return Err(e);
            }
        };

        info!(
            peg = peg.id().0,
            connection = %id,
            denom_uri = %peg.denom_uri(),
            brand = %peg.local_brand(),
            "[peg] local asset pegged"
        );
        Ok(peg)
    }

    fn get_issuer_for(&self, brand: Brand) -> Result<Issuer, PegError> {
        self.inner
            .state
            .lock()
            .issuers
            .get(&brand)
            .map(|r| r.issuer.clone())
            .ok_or_else(|| PegError::UnknownBrand(brand.to_string()))
    }

    fn notifier_of_all_pegs(&self) -> PegNotifier {
        PegNotifier::new(self.inner.pegs_tx.subscribe())
    }

    fn initiate_transfer(
        &self,
        peg: &Peg,
        destination: &str,
    ) -> Result<TransferInvitation, PegError> {
        self.resolve_courier(peg)?;
        Ok(TransferInvitation::new(
            self.clone(),
            peg.clone(),
            destination.to_string(),
        ))
    }
}

#[async_trait]
impl ConnectionHandler for PegRegistry {
    async fn on_open(
        &self,
        connection: Arc<dyn Connection>,
        local_address: &str,
        remote_address: &str,
    ) -> Result<(), PegError> {
        let id = connection.id();
        self.inner
            .state
            .lock()
            .channels
            .on_open(connection, local_address, remote_address)?;
        info!(connection = %id, local_address, remote_address, "[peg] channel opened");
        Ok(())
    }

    async fn on_receive(&self, connection: &Arc<dyn Connection>, packet: &[u8]) -> Vec<u8> {
        let id = connection.id();
        let ack = match self.route_inbound(id, packet).await {
            Ok(_) => Acknowledgement::success(),
            Err(e) => {
                warn!(connection = %id, error = %e, "[peg] rejecting inbound packet");
                Acknowledgement::failure(e)
            }
        };
        encode_ack(&ack)
    }

    async fn on_close(&self, connection: &Arc<dyn Connection>) {
        let id = connection.id();
        let mut state = self.inner.state.lock();
        match state.channels.on_close(id) {
            Some(channel) => {
                for peg in channel.pegs() {
                    state.peg_to_connection.remove(peg);
                }
                info!(
                    connection = %id,
                    pegs = channel.pegs().len(),
                    "[peg] channel closed, pegs disconnected"
                );
            }
            None => debug!(connection = %id, "[peg] close for unbound connection"),
        }
    }
}
