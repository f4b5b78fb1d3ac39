//! # End-to-end Peg Scenarios
//!
//! Drives a `PegRegistry` over the loopback transport against a scripted
//! remote chain, and two registries against each other.
//!
//! ## Test Categories
//!
//! 1. **Inbound** - redeem and forward, unknown denominations, forwarding failures,
//!    acks that do not wait on the receiver
//! 2. **Outbound** - packet contents, negative acks, timeouts, refund conservation,
//!    refused retains
//! 3. **Lifecycle** - duplicate registration, channel teardown
//! 4. **Round trip** - local asset out and back between two registries

use parking_lot::Mutex;
use peg_transfer::{
    AccountId, Amount, Asset, AssetLedger, AssetRejected, Connection, ConnectionHandler,
    DepositFacet, InMemoryAddressRegistry, InMemoryAssetLedger, InMemoryPurse, LoopbackConnection,
    LoopbackNetwork, Peg, PegApi, PegConfig, PegError, PegLocalRequest, PegRegistry,
    PegRemoteRequest, TransferOutcome,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;

const ENDPOINT: &str = "/ibc-port/portdef/ibc-channel/chanabc";
const REMOTE_ENDPOINT: &str = "/ibc-port/transfer/ibc-channel/channel-7";

// =============================================================================
// TEST HELPERS
// =============================================================================

enum Reply {
    Ack(JsonValue),
    Hang,
}

/// Remote chain that records packets and answers from a script.
struct ScriptedChain {
    packets: Mutex<Vec<JsonValue>>,
    reply: Mutex<Reply>,
}

impl ScriptedChain {
    fn new() -> Self {
        Self {
            packets: Mutex::new(Vec::new()),
            reply: Mutex::new(Reply::Ack(json!({ "success": true }))),
        }
    }

    fn reply_with(&self, reply: Reply) {
        *self.reply.lock() = reply;
    }

    fn packets(&self) -> Vec<JsonValue> {
        self.packets.lock().clone()
    }
}

#[async_trait::async_trait]
impl ConnectionHandler for ScriptedChain {
    async fn on_open(
        &self,
        _connection: Arc<dyn Connection>,
        _local_address: &str,
        _remote_address: &str,
    ) -> Result<(), PegError> {
        Ok(())
    }

    async fn on_receive(&self, _connection: &Arc<dyn Connection>, packet: &[u8]) -> Vec<u8> {
        self.packets
            .lock()
            .push(serde_json::from_slice(packet).unwrap_or(JsonValue::Null));
        let ack = match &*self.reply.lock() {
            Reply::Ack(ack) => Some(serde_json::to_vec(ack).unwrap()),
            Reply::Hang => None,
        };
        match ack {
            Some(ack) => ack,
            None => std::future::pending().await,
        }
    }

    async fn on_close(&self, _connection: &Arc<dyn Connection>) {}
}

struct Chain {
    registry: PegRegistry,
    ledger: Arc<InMemoryAssetLedger>,
    addresses: Arc<InMemoryAddressRegistry>,
}

fn chain() -> Chain {
    let ledger = Arc::new(InMemoryAssetLedger::new());
    let addresses = Arc::new(InMemoryAddressRegistry::new());
    let registry =
        PegRegistry::new(PegConfig::for_testing(), ledger.clone(), addresses.clone()).unwrap();
    Chain {
        registry,
        ledger,
        addresses,
    }
}

struct Harness {
    network: LoopbackNetwork,
    local: Chain,
    remote: Arc<ScriptedChain>,
    /// Our end of the channel.
    ours: Arc<LoopbackConnection>,
    /// The scripted chain's end of the channel.
    theirs: Arc<LoopbackConnection>,
}

async fn harness() -> Harness {
    let network = LoopbackNetwork::new();
    let local = chain();
    let remote = Arc::new(ScriptedChain::new());
    let (ours, theirs) = network
        .connect(
            Arc::new(local.registry.clone()),
            ENDPOINT,
            remote.clone(),
            REMOTE_ENDPOINT,
        )
        .await
        .unwrap();
    Harness {
        network,
        local,
        remote,
        ours,
        theirs,
    }
}

async fn peg_uatom(h: &Harness) -> Peg {
    h.local
        .registry
        .peg_remote(PegRemoteRequest::new("Gaia ATOM", h.ours.id(), "uatom"))
        .await
        .unwrap()
}

async fn fund(ledger: &InMemoryAssetLedger, account: &AccountId, amount: Amount) {
    let asset = ledger.mint(amount).await.unwrap();
    ledger.deposit(account, asset).await.unwrap();
}

/// Wait for spawned forwards to land.
async fn settled(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("forward did not settle");
}

/// Receiver whose deposit never completes.
struct HangingFacet;

#[async_trait::async_trait]
impl DepositFacet for HangingFacet {
    async fn receive(&self, _asset: Asset) -> Result<Amount, AssetRejected> {
        std::future::pending().await
    }
}

fn packet_bytes(amount: &str, denomination: &str, receiver: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "amount": amount,
        "denomination": denomination,
        "receiver": receiver,
    }))
    .unwrap()
}

// =============================================================================
// INBOUND
// =============================================================================

#[tokio::test]
async fn test_inbound_transfer_redeems_and_acks() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let purse = Arc::new(InMemoryPurse::new());
    h.local.addresses.insert("0x1234", purse.clone());

    let ack = h
        .theirs
        .send(packet_bytes("100", "portdef/chanabc/uatom", "0x1234"))
        .await
        .unwrap();

    assert_eq!(serde_json::from_slice::<JsonValue>(&ack).unwrap(), json!({ "success": true }));
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 100);
    settled(|| purse.balance(peg.local_brand()) == 100).await;
}

#[tokio::test]
async fn test_inbound_ack_does_not_wait_for_receiver() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    h.local.addresses.insert("0x1234", Arc::new(HangingFacet));
    let purse = Arc::new(InMemoryPurse::new());
    h.local.addresses.insert("0x5678", purse.clone());

    let ack = tokio::time::timeout(
        Duration::from_secs(2),
        h.theirs
            .send(packet_bytes("100", "portdef/chanabc/uatom", "0x1234")),
    )
    .await
    .expect("ack waited on the receiver")
    .unwrap();
    assert_eq!(serde_json::from_slice::<JsonValue>(&ack).unwrap(), json!({ "success": true }));
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 100);

    // The channel keeps delivering behind the stuck deposit.
    let ack = tokio::time::timeout(
        Duration::from_secs(2),
        h.theirs
            .send(packet_bytes("7", "portdef/chanabc/uatom", "0x5678")),
    )
    .await
    .expect("channel blocked behind the receiver")
    .unwrap();
    assert_eq!(serde_json::from_slice::<JsonValue>(&ack).unwrap(), json!({ "success": true }));
    settled(|| purse.balance(peg.local_brand()) == 7).await;
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 107);
}

#[tokio::test]
async fn test_inbound_unknown_denomination_changes_nothing() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;

    let ack = h
        .theirs
        .send(packet_bytes("100", "portdef/chanabc/uosmo", "0x1234"))
        .await
        .unwrap();
    let ack: JsonValue = serde_json::from_slice(&ack).unwrap();

    assert_eq!(ack["success"], json!(false));
    assert!(ack["error"].as_str().unwrap().contains("Unknown denomination"));
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 0);
}

#[tokio::test]
async fn test_inbound_forwarding_failure_is_observable() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let mut failures = h.local.registry.take_forwarding_failures().unwrap();
    assert!(h.local.registry.take_forwarding_failures().is_none());

    let ack = h
        .theirs
        .send(packet_bytes("100", "portdef/chanabc/uatom", "nobody"))
        .await
        .unwrap();

    // Acknowledged regardless of the forward.
    assert_eq!(serde_json::from_slice::<JsonValue>(&ack).unwrap(), json!({ "success": true }));
    let failure = failures.recv().await.unwrap();
    assert_eq!(failure.receiver, "nobody");
    assert_eq!(failure.denom_uri, *peg.denom_uri());
    assert_eq!(failure.asset.amount(), Amount::new(peg.local_brand(), 100));
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[tokio::test]
async fn test_outbound_packet_contents() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let alice = AccountId::new("alice");
    let amount = Amount::new(peg.local_brand(), 100);
    fund(&h.local.ledger, &alice, amount).await;

    let outcome = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap()
        .exercise(&alice, amount)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Delivered { amount });
    assert_eq!(
        h.remote.packets(),
        vec![json!({
            "amount": "100",
            "denomination": "portdef/chanabc/uatom",
            "receiver": "markaccount",
        })]
    );
    assert_eq!(h.local.ledger.balance(&alice, peg.local_brand()), 0);
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 0);
}

#[tokio::test]
async fn test_outbound_negative_ack_refunds() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let alice = AccountId::new("alice");
    let amount = Amount::new(peg.local_brand(), 100);
    fund(&h.local.ledger, &alice, amount).await;
    h.remote
        .reply_with(Reply::Ack(json!({ "success": false, "error": "oops" })));

    let outcome = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap()
        .exercise(&alice, amount)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TransferOutcome::Refunded {
            error: json!("oops"),
            refunded: amount,
        }
    );
    assert_eq!(h.local.ledger.balance(&alice, peg.local_brand()), 100);
    assert_eq!(h.local.ledger.supply(peg.local_brand()), 100);
}

#[tokio::test]
async fn test_refund_equals_retained_for_every_amount() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let alice = AccountId::new("alice");
    fund(&h.local.ledger, &alice, Amount::new(peg.local_brand(), u64::MAX as u128)).await;
    h.remote
        .reply_with(Reply::Ack(json!({ "success": false, "error": "full" })));

    for value in [0u128, 1, 99, 1_000_000, u64::MAX as u128] {
        let amount = Amount::new(peg.local_brand(), value);
        let outcome = h
            .local
            .registry
            .initiate_transfer(&peg, "markaccount")
            .unwrap()
            .exercise(&alice, amount)
            .await
            .unwrap();
        match outcome {
            TransferOutcome::Refunded { refunded, .. } => assert_eq!(refunded, amount),
            other => panic!("expected refund, got {:?}", other),
        }
    }
    assert_eq!(
        h.local.ledger.balance(&alice, peg.local_brand()),
        u64::MAX as u128
    );
}

#[tokio::test(start_paused = true)]
async fn test_outbound_timeout_refunds() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let alice = AccountId::new("alice");
    let amount = Amount::new(peg.local_brand(), 10);
    fund(&h.local.ledger, &alice, amount).await;
    h.remote.reply_with(Reply::Hang);

    let outcome = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap()
        .exercise(&alice, amount)
        .await
        .unwrap();

    match outcome {
        TransferOutcome::Refunded { error, refunded } => {
            assert!(error.as_str().unwrap().contains("timed out"));
            assert_eq!(refunded, amount);
        }
        other => panic!("expected refund, got {:?}", other),
    }
    assert_eq!(h.local.ledger.balance(&alice, peg.local_brand()), 10);
}

#[tokio::test]
async fn test_refused_retain_refunds_payer() {
    let h = harness().await;
    let bld = h.local.ledger.native_asset_type("BLD");
    let peg = h
        .local
        .registry
        .peg_local(PegLocalRequest::new("BLD", h.ours.id(), bld.clone()))
        .await
        .unwrap();
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    h.local.ledger.credit(&alice, Amount::new(bld.brand, u128::MAX));
    h.local.ledger.credit(&bob, Amount::new(bld.brand, 1));

    let outcome = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap()
        .exercise(&alice, Amount::new(bld.brand, u128::MAX))
        .await
        .unwrap();
    assert!(outcome.is_delivered());

    // Custody is full, so the pool cannot take bob's unit.
    let outcome = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap()
        .exercise(&bob, Amount::new(bld.brand, 1))
        .await
        .unwrap();
    match outcome {
        TransferOutcome::Refunded { error, refunded } => {
            assert!(error.as_str().unwrap().contains("overflow"));
            assert_eq!(refunded, Amount::new(bld.brand, 1));
        }
        other => panic!("expected refund, got {:?}", other),
    }
    assert_eq!(h.local.ledger.balance(&bob, bld.brand), 1);
    assert_eq!(h.remote.packets().len(), 1);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_duplicate_peg_rejected() {
    let h = harness().await;
    peg_uatom(&h).await;
    let again = h
        .local
        .registry
        .peg_remote(PegRemoteRequest::new("Gaia ATOM", h.ours.id(), "uatom"))
        .await;
    assert!(matches!(again, Err(PegError::CourierAlreadyRegistered(_))));
}

#[tokio::test]
async fn test_teardown_disconnects_pegs() {
    let h = harness().await;
    let peg = peg_uatom(&h).await;
    let alice = AccountId::new("alice");
    let amount = Amount::new(peg.local_brand(), 5);
    fund(&h.local.ledger, &alice, amount).await;
    let pending = h
        .local
        .registry
        .initiate_transfer(&peg, "markaccount")
        .unwrap();

    h.network.close(&h.ours).await;

    assert!(matches!(
        h.local.registry.initiate_transfer(&peg, "markaccount"),
        Err(PegError::PegDisconnected(_))
    ));
    assert!(matches!(
        pending.exercise(&alice, amount).await,
        Err(PegError::PegDisconnected(_))
    ));
    assert_eq!(peg.alleged_name(), "Gaia ATOM");
    assert_eq!(peg.denom_uri().as_str(), "ics20-1:portdef/chanabc/uatom");
    assert_eq!(
        h.local.registry.get_issuer_for(peg.local_brand()).unwrap().brand,
        peg.local_brand()
    );
    assert_eq!(h.local.ledger.balance(&alice, peg.local_brand()), 5);
    assert!(h.remote.packets().is_empty());
}

// =============================================================================
// ROUND TRIP
// =============================================================================

#[tokio::test]
async fn test_local_asset_round_trip_between_registries() {
    let network = LoopbackNetwork::new();
    let home = chain();
    let away = chain();
    // Symmetric channel naming so both sides scope denominations alike.
    let (home_conn, away_conn) = network
        .connect(
            Arc::new(home.registry.clone()),
            REMOTE_ENDPOINT,
            Arc::new(away.registry.clone()),
            REMOTE_ENDPOINT,
        )
        .await
        .unwrap();

    let bld = home.ledger.native_asset_type("BLD");
    let outbound = home
        .registry
        .peg_local(PegLocalRequest::new("BLD", home_conn.id(), bld.clone()))
        .await
        .unwrap();
    assert_eq!(
        outbound.denom_uri().as_str(),
        "ics20-1:transfer/channel-7/localpeg1"
    );
    let inbound = away
        .registry
        .peg_remote(PegRemoteRequest::new("home BLD", away_conn.id(), "localpeg1"))
        .await
        .unwrap();

    // Out: alice's BLD goes into custody, bob receives shadow BLD.
    let alice = AccountId::new("alice");
    home.ledger.credit(&alice, Amount::new(bld.brand, 50));
    let bob_purse = Arc::new(InMemoryPurse::new());
    away.addresses.insert("bob", bob_purse.clone());

    let outcome = home
        .registry
        .initiate_transfer(&outbound, "bob")
        .unwrap()
        .exercise(&alice, Amount::new(bld.brand, 30))
        .await
        .unwrap();
    assert!(outcome.is_delivered());
    assert_eq!(home.ledger.balance(&alice, bld.brand), 20);
    settled(|| bob_purse.balance(inbound.local_brand()) == 30).await;
    assert_eq!(away.ledger.supply(inbound.local_brand()), 30);

    // Back: carol burns shadow BLD, dave receives real BLD out of custody.
    let carol = AccountId::new("carol");
    fund(&away.ledger, &carol, Amount::new(inbound.local_brand(), 12)).await;
    let dave_purse = Arc::new(InMemoryPurse::new());
    home.addresses.insert("dave", dave_purse.clone());

    let outcome = away
        .registry
        .initiate_transfer(&inbound, "dave")
        .unwrap()
        .with_sender("carol")
        .exercise(&carol, Amount::new(inbound.local_brand(), 12))
        .await
        .unwrap();
    assert!(outcome.is_delivered());
    settled(|| dave_purse.balance(bld.brand) == 12).await;
    assert_eq!(away.ledger.supply(inbound.local_brand()), 30);

    // Custody cannot release more than it holds: the remote refunds.
    fund(&away.ledger, &carol, Amount::new(inbound.local_brand(), 100)).await;
    let outcome = away
        .registry
        .initiate_transfer(&inbound, "dave")
        .unwrap()
        .exercise(&carol, Amount::new(inbound.local_brand(), 100))
        .await
        .unwrap();
    assert!(!outcome.is_delivered());
    assert_eq!(away.ledger.balance(&carol, inbound.local_brand()), 100);
    assert_eq!(dave_purse.balance(bld.brand), 12);
}

#[tokio::test]
async fn test_notifier_and_lookups_across_pegs() {
    let h = harness().await;
    let mut notifier = h.local.registry.notifier_of_all_pegs();
    let atom = peg_uatom(&h).await;
    let osmo = h
        .local
        .registry
        .peg_remote(PegRemoteRequest::new("Osmosis", h.ours.id(), "uosmo"))
        .await
        .unwrap();

    let snapshot = notifier.update_since(0).await.unwrap();
    assert_eq!(snapshot.pegs, vec![atom.clone(), osmo.clone()]);
    assert_eq!(
        h.local.registry.pegs_for_connection(h.ours.id()).unwrap(),
        vec![atom.clone(), osmo.clone()]
    );
    assert_eq!(h.local.registry.peg_by_brand(osmo.local_brand()).unwrap(), osmo);
    assert_eq!(h.local.registry.keyword_for(atom.local_brand()).unwrap(), "Local1");
    assert_eq!(h.local.registry.keyword_for(osmo.local_brand()).unwrap(), "Local2");
}
