//! Loopback Transport Adapter
//!
//! Implements the `Connection` port as an in-process pair of endpoints.
//! Each endpoint delivers to its peer's [`ConnectionHandler`]; deliveries
//! into one endpoint are serialized in send order.

use crate::domain::{ConnectionId, PegError};
use crate::ports::inbound::ConnectionHandler;
use crate::ports::outbound::Connection;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// One side of a loopback connection.
pub struct LoopbackConnection {
    id: ConnectionId,
    local_address: String,
    remote_address: String,
    handler: Arc<dyn ConnectionHandler>,
    peer: RwLock<Weak<LoopbackConnection>>,
    closed: AtomicBool,
    /// Held while a packet is delivered into this endpoint.
    delivery: tokio::sync::Mutex<()>,
}

impl LoopbackConnection {
    fn new(
        id: ConnectionId,
        local_address: &str,
        remote_address: &str,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            id,
            local_address: local_address.to_string(),
            remote_address: remote_address.to_string(),
            handler,
            peer: RwLock::new(Weak::new()),
            closed: AtomicBool::new(false),
            delivery: tokio::sync::Mutex::new(()),
        }
    }

    /// True once either side closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for LoopbackConnection {
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
        if self.is_closed() {
            return Err(PegError::Transport(format!("{} is closed", self.id)));
        }
        let peer = self
            .peer
            .read()
            .upgrade()
            .ok_or_else(|| PegError::Transport(format!("{} has no peer", self.id)))?;

        let _delivery = peer.delivery.lock().await;
        if peer.is_closed() {
            return Err(PegError::Transport(format!("{} is closed", peer.id)));
        }
        debug!("[peg] Loopback {} -> {} ({} bytes)", self.id, peer.id, packet.len());
        let target: Arc<dyn Connection> = peer.clone();
        Ok(peer.handler.on_receive(&target, &packet).await)
    }
}

/// Factory for loopback connection pairs.
#[derive(Default)]
pub struct LoopbackNetwork {
    next_id: AtomicU64,
}

impl LoopbackNetwork {
    /// Create a network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect two handlers, opening both ends.
    ///
    /// Returns the connection seen by side A and the one seen by side B.
    pub async fn connect(
        &self,
        handler_a: Arc<dyn ConnectionHandler>,
        address_a: &str,
        handler_b: Arc<dyn ConnectionHandler>,
        address_b: &str,
    ) -> Result<(Arc<LoopbackConnection>, Arc<LoopbackConnection>), PegError> {
        let id_a = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let id_b = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let a = Arc::new(LoopbackConnection::new(id_a, address_a, address_b, handler_a));
        let b = Arc::new(LoopbackConnection::new(id_b, address_b, address_a, handler_b));
        *a.peer.write() = Arc::downgrade(&b);
        *b.peer.write() = Arc::downgrade(&a);

        a.handler.on_open(a.clone(), address_a, address_b).await?;
        b.handler.on_open(b.clone(), address_b, address_a).await?;
        info!("[peg] Loopback connected {} <-> {}", id_a, id_b);
        Ok((a, b))
    }

    /// Close both ends of a connection and notify both handlers.
    pub async fn close(&self, connection: &Arc<LoopbackConnection>) {
        let peer = connection.peer.read().upgrade();
        let ends = std::iter::once(connection.clone()).chain(peer);
        for end in ends {
            if end.closed.swap(true, Ordering::SeqCst) {
                continue;
            }
            let as_dyn: Arc<dyn Connection> = end.clone();
            end.handler.on_close(&as_dyn).await;
        }
        info!("[peg] Loopback closed {}", connection.id);
    }
}
