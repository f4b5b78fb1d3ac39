//! # Channel Registry
//!
//! Per-connection state: the courier table keyed by denomination URI, the
//! local denomination nonce and the set of pegs created on the channel.
//!
//! Entries live in an explicit table keyed by [`ConnectionId`] and are
//! removed on close, so a torn-down channel stops routing immediately.

use crate::domain::{ConnectionId, DenomUri, PegError, PegId};
use crate::ports::Connection;
use crate::service::courier::Courier;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// State bound to one open connection.
pub struct LocalChannelState {
    connection: Arc<dyn Connection>,
    local_address: String,
    remote_address: String,
    couriers: HashMap<DenomUri, Arc<Courier>>,
    /// URIs claimed by a peg still being built.
    reserved: HashSet<DenomUri>,
    nonce: u64,
    pegs: HashSet<PegId>,
}

impl LocalChannelState {
    fn new(connection: Arc<dyn Connection>, local_address: &str, remote_address: &str) -> Self {
        Self {
            connection,
            local_address: local_address.to_string(),
            remote_address: remote_address.to_string(),
            couriers: HashMap::new(),
            reserved: HashSet::new(),
            nonce: 0,
            pegs: HashSet::new(),
        }
    }

    /// The bound connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Local endpoint address given at open.
    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Remote endpoint address given at open.
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Pegs created on this channel.
    pub fn pegs(&self) -> &HashSet<PegId> {
        &self.pegs
    }
}

/// Table of open channels.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<ConnectionId, LocalChannelState>,
}

impl ChannelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind fresh state to a connection. A connection opens exactly once.
    pub fn on_open(
        &mut self,
        connection: Arc<dyn Connection>,
        local_address: &str,
        remote_address: &str,
    ) -> Result<(), PegError> {
        let id = connection.id();
        if self.channels.contains_key(&id) {
            return Err(PegError::ConnectionAlreadyOpen(id.0));
        }
        self.channels.insert(
            id,
            LocalChannelState::new(connection, local_address, remote_address),
        );
        debug!(connection = %id, local_address, remote_address, "[peg] channel bound");
        Ok(())
    }

    /// Remove a connection's binding, returning its state.
    pub fn on_close(&mut self, id: ConnectionId) -> Option<LocalChannelState> {
        self.channels.remove(&id)
    }

    /// True while the connection is bound.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.channels.contains_key(&id)
    }

    fn channel(&self, id: ConnectionId) -> Result<&LocalChannelState, PegError> {
        self.channels
            .get(&id)
            .ok_or(PegError::ConnectionNotOpen(id.0))
    }

    fn channel_mut(&mut self, id: ConnectionId) -> Result<&mut LocalChannelState, PegError> {
        self.channels
            .get_mut(&id)
            .ok_or(PegError::ConnectionNotOpen(id.0))
    }

    /// Claim `denom_uri` for a peg under construction. Fails if a courier
    /// serves it or another claim holds it.
    pub fn reserve(&mut self, id: ConnectionId, denom_uri: &DenomUri) -> Result<(), PegError> {
        let channel = self.channel_mut(id)?;
        if channel.couriers.contains_key(denom_uri) || !channel.reserved.insert(denom_uri.clone())
        {
            return Err(PegError::CourierAlreadyRegistered(denom_uri.to_string()));
        }
        Ok(())
    }

    /// Drop a claim taken with [`ChannelRegistry::reserve`]. No-op once the
    /// courier is registered or the channel is gone.
    pub fn release(&mut self, id: ConnectionId, denom_uri: &DenomUri) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.reserved.remove(denom_uri);
        }
    }

    /// Bind a courier to a denomination URI. Never overwrites. Consumes any
    /// reservation held for the URI.
    pub fn register_courier(
        &mut self,
        id: ConnectionId,
        denom_uri: DenomUri,
        courier: Arc<Courier>,
    ) -> Result<(), PegError> {
        let channel = self.channel_mut(id)?;
        if channel.couriers.contains_key(&denom_uri) {
            return Err(PegError::CourierAlreadyRegistered(denom_uri.to_string()));
        }
        debug!(connection = %id, denom_uri = %denom_uri, "[peg] courier registered");
        channel.reserved.remove(&denom_uri);
        channel.couriers.insert(denom_uri, courier);
        Ok(())
    }

    /// True if a courier serves or a reservation holds `denom_uri` on the
    /// connection.
    pub fn has_courier(&self, id: ConnectionId, denom_uri: &DenomUri) -> Result<bool, PegError> {
        let channel = self.channel(id)?;
        Ok(channel.couriers.contains_key(denom_uri) || channel.reserved.contains(denom_uri))
    }

    /// Courier serving `denom_uri` on the connection.
    pub fn courier(&self, id: ConnectionId, denom_uri: &DenomUri) -> Result<Arc<Courier>, PegError> {
        self.channel(id)?
            .couriers
            .get(denom_uri)
            .cloned()
            .ok_or_else(|| PegError::UnknownDenomination(denom_uri.to_string()))
    }

    /// Increment and return the channel's local denomination nonce.
    pub fn next_local_denom(&mut self, id: ConnectionId) -> Result<u64, PegError> {
        let channel = self.channel_mut(id)?;
        channel.nonce += 1;
        Ok(channel.nonce)
    }

    /// Record a peg as created on the connection.
    pub fn add_peg(&mut self, id: ConnectionId, peg: PegId) -> Result<(), PegError> {
        self.channel_mut(id)?.pegs.insert(peg);
        Ok(())
    }

    /// Local endpoint address of the connection.
    pub fn local_address(&self, id: ConnectionId) -> Result<&str, PegError> {
        Ok(self.channel(id)?.local_address())
    }

    /// The bound connection.
    pub fn connection(&self, id: ConnectionId) -> Result<Arc<dyn Connection>, PegError> {
        Ok(self.channel(id)?.connection.clone())
    }

    /// Pegs created on the connection, in id order.
    pub fn pegs(&self, id: ConnectionId) -> Result<Vec<PegId>, PegError> {
        let mut pegs: Vec<PegId> = self.channel(id)?.pegs.iter().copied().collect();
        pegs.sort();
        Ok(pegs)
    }
}
