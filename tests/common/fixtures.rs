//! Keys, configurations and committee descriptors shared by the integration tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use committee_rs::{
    config::Configuration,
    events::{DialPeerEvent, PutCommitteeEvent, RejectNodeEvent, ResolveNodeEvent, StopCommitteeEvent},
    registry::{Node, NodeSpec},
    types::{
        committee::{CommitteeInfo, CommitteeMember},
        data_types::{BlockHeight, ChainID, CommitteeID},
    },
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::OsRng;

use super::provider::StubProvider;

/// How long tests wait for the connection driver to act.
pub(crate) const DRIVER_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn signing_keys(n: usize) -> Vec<SigningKey> {
    let mut csprg = OsRng {};
    (0..n).map(|_| SigningKey::generate(&mut csprg)).collect()
}

pub(crate) fn configuration(me: SigningKey) -> Configuration {
    Configuration::builder()
        .me(me)
        .chain_id(ChainID::new(100))
        .moniker("test-node".to_string())
        .listen_address_1("127.0.0.1:30310".parse().unwrap())
        .listen_address_2("127.0.0.1:30311".parse().unwrap())
        .log_events(true)
        .build()
}

pub(crate) fn committee(id: u64, members: &[VerifyingKey]) -> CommitteeInfo {
    CommitteeInfo::new(
        CommitteeID::new(id),
        BlockHeight::new(id * 100),
        members.iter().map(|key| CommitteeMember::new(*key)).collect(),
    )
}

/// A node and the provider its committees were allocated from.
pub(crate) struct TestNode {
    pub(crate) node: Node<StubProvider>,
    pub(crate) provider: StubProvider,
    pub(crate) dialed: Arc<Mutex<Vec<String>>>,

    /// Lifecycle and announcement events, as `"<kind> <committee>"`, in the order handled.
    pub(crate) events: Arc<Mutex<Vec<String>>>,
}

/// Start a node for `me`, with handlers that record every successful dial and every lifecycle and
/// announcement event reported to it.
pub(crate) fn start_node(me: SigningKey) -> TestNode {
    let config = configuration(me);
    let provider = StubProvider::new(config.address());
    let dialed = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let record = dialed.clone();
    let (on_put, on_resolve, on_reject, on_stop) =
        (events.clone(), events.clone(), events.clone(), events.clone());

    let node = NodeSpec::builder()
        .provider(provider.clone())
        .configuration(config)
        .on_put_committee(move |event: &PutCommitteeEvent| {
            on_put.lock().unwrap().push(format!("PutCommittee {}", event.committee))
        })
        .on_stop_committee(move |event: &StopCommitteeEvent| {
            on_stop.lock().unwrap().push(format!("StopCommittee {}", event.committee))
        })
        .on_resolve_node(move |event: &ResolveNodeEvent| {
            on_resolve.lock().unwrap().push(format!("ResolveNode {}", event.committee))
        })
        .on_reject_node(move |event: &RejectNodeEvent| {
            on_reject.lock().unwrap().push(format!("RejectNode {}", event.committee))
        })
        .on_dial_peer(move |event: &DialPeerEvent| {
            record.lock().unwrap().push(event.address.to_string())
        })
        .build()
        .start();

    TestNode {
        node,
        provider,
        dialed,
        events,
    }
}
