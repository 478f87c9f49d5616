/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The service that owns the resources of a single committee and drives its peer connections.
//!
//! A [`CommitteeService`] is created by the [registry](crate::registry::Node) when the agent registers a
//! committee, and owns, for that committee:
//! - The [consensus handle](ConsensusState).
//! - The [transport](Switch) and [address book](AddrBook).
//! - The [health manager](HealthManager).
//! - The node table and validator set ([`SharedPeers`]).
//! - The [event bus](crate::event_bus) and the [connection driver](crate::connection_driver).
//!
//! ## Lifecycle
//!
//! 1. [`build`](CommitteeService::build): allocates every resource, seeds the node table and the health
//!    manager, and starts health tracking. No networking happens yet.
//! 2. [`start`](CommitteeService::start): starts the event bus, the transport and the connection driver.
//! 3. [`stop`](CommitteeService::stop): tells the connection driver to exit and waits for it, then stops
//!    health tracking, the event bus, and finally the transport. The driver is gone before the transport
//!    closes, so it never dials a closing transport.
//!
//! Endpoint announcements ([`put_nodes`](CommitteeService::put_nodes)) and validator set replacements
//! ([`update_validators`](CommitteeService::update_validators)) can arrive at any point after `build`.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::SystemTime;

use crate::config::Configuration;
use crate::connection_driver::{start_connection_driver, DriverSignals, SharedPeers};
use crate::error::{ConstructionError, ServiceStartError};
use crate::event_bus::{EventBus, EventHandlers};
use crate::events::*;
use crate::listen_profile::ListenProfile;
use crate::node_table::{NodeTable, PeerAddress, ResolveOutcome};
use crate::pluggables::{AddrBook, CommitteeProvider, ConsensusState, HealthManager, NodeInfo, Switch};
use crate::status::{CommitteeSnapshot, NodeStatus};
use crate::types::{
    committee::{CommitteeInfo, CommitteeNode},
    data_types::{BlockHeight, CommitteeID},
    identity::{parse_public_key, peer_id_of, Address},
    validators::{Validator, ValidatorSet, MEMBER_POWER},
};

/// What a [`update_validators`](CommitteeService::update_validators) call decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateOutcome {
    /// The committee carries on under the new validator set.
    Continue,

    /// The consensus handle asked for the committee to halt on this node.
    Halt,
}

pub(crate) struct CommitteeService<P: CommitteeProvider> {
    id: CommitteeID,
    profile: ListenProfile,
    me: Address,
    consensus: P::Consensus,
    switch: P::Switch,
    addr_book: P::AddrBook,
    health: P::Health,
    health_running: bool,
    peers: SharedPeers,
    signals: Arc<DriverSignals>,
    driver: Option<JoinHandle<()>>,
    event_bus: EventBus,
    stopped: bool,
}

impl<P: CommitteeProvider> CommitteeService<P> {
    /// Allocate and wire the resources of the committee described by `committee`.
    ///
    /// Fails if the descriptor has no ID or no members, or if no member other than the local node
    /// (`me`) is left to connect to. In the last case the partially built service is stopped before
    /// returning.
    pub(crate) fn build(
        provider: &P,
        committee: &CommitteeInfo,
        me: Address,
        handlers: Arc<EventHandlers>,
    ) -> Result<CommitteeService<P>, ConstructionError> {
        let validator_set = ValidatorSet::from_committee(committee)?;
        let id = committee.id.ok_or(ConstructionError::MissingCommitteeID)?;

        let node_table = NodeTable::from_members(&committee.members, &me);
        let mut service: CommitteeService<P> = CommitteeService {
            id,
            profile: ListenProfile::for_committee(id),
            me,
            consensus: provider.new_consensus_state(id, committee.start_height, &validator_set),
            switch: provider.new_switch(id),
            addr_book: provider.new_addr_book(id),
            health: provider.new_health_manager(id),
            health_running: false,
            peers: SharedPeers::new(node_table, validator_set),
            signals: DriverSignals::new(),
            driver: None,
            event_bus: EventBus::new(id, handlers),
            stopped: false,
        };

        for member in &committee.members {
            if Address::of(&member.public_key) == me {
                continue;
            }
            let validator = Validator::new(member.public_key, MEMBER_POWER);
            service.health.put_work_health(peer_id_of(&member.public_key), validator);
        }
        for member in &committee.back_members {
            let validator = Validator::new(member.public_key, MEMBER_POWER);
            service.health.put_back_health(peer_id_of(&member.public_key), validator);
        }
        service.health.on_start();
        service.health_running = true;

        if service.peers.lock().node_table.is_empty() {
            log::error!("PutCommittee, committee {} has no peers besides the local node", id);
            service.stop();
            return Err(ConstructionError::EmptyNodeTable);
        }

        provider.attach_consensus_reactor(&mut service.consensus, &mut service.switch, &mut service.health);

        service.event_bus.publish(Event::PutCommittee(PutCommitteeEvent {
            timestamp: SystemTime::now(),
            committee: id,
            start_height: committee.start_height,
            members: committee.members.len(),
            back_members: committee.back_members.len(),
        }));

        Ok(service)
    }

    /// Start the committee's event bus, transport and connection driver.
    ///
    /// Starting a service whose connection driver is already running has no effect. On failure, the
    /// first error is returned and the resources started so far are left for [`stop`](Self::stop) to
    /// release. Calling `start` again after a failure resumes from the first resource not yet running.
    pub(crate) fn start(
        &mut self,
        config: &Configuration,
        node_info: &NodeInfo,
    ) -> Result<(), ServiceStartError> {
        if self.driver.is_some() {
            log::info!("committee {} is already running", self.id);
            return Ok(());
        }

        self.event_bus
            .start()
            .map_err(ServiceStartError::EventBusStartFailed)?;

        let listen_addr = self.profile.listen_address(config);
        let mut node_info = node_info.clone();
        node_info.listen_addr = listen_addr;

        // Add ourselves to the address book to prevent dialing ourselves.
        let our_address = PeerAddress {
            id: node_info.id.clone(),
            ip: listen_addr.ip().to_string(),
            port: listen_addr.port(),
        };
        self.addr_book.add_our_address(&our_address);
        self.addr_book.add_private_ids(&config.private_peer_ids);

        self.switch.set_node_info(node_info);
        self.switch.set_node_key(config.me.clone());
        self.consensus.set_signing_key(config.me.clone());
        log::info!("committee {} start, listen {}", self.id, listen_addr);

        if !self.switch.is_running() {
            self.switch.start()?;
        }

        let driver = start_connection_driver(
            self.id,
            self.switch.clone(),
            self.peers.clone(),
            self.signals.clone(),
            self.event_bus.publisher(),
        )
        .map_err(ServiceStartError::DriverStartFailed)?;
        self.driver = Some(driver);

        self.event_bus.publish(Event::StartCommittee(StartCommitteeEvent {
            timestamp: SystemTime::now(),
            committee: self.id,
            listen_addr,
        }));
        Ok(())
    }

    /// Stop the committee. See the [module-level docs](self#lifecycle) for the order resources are
    /// stopped in. Stopping a stopped service only repeats the call to stop the transport.
    ///
    /// The StopCommittee event is published whether or not the service was started, and every event
    /// still queued on the event bus is handled before this returns.
    pub(crate) fn stop(&mut self) {
        if self.switch.is_running() || self.driver.is_some() {
            self.signals.terminate();
            if let Some(driver) = self.driver.take() {
                if driver.join().is_err() {
                    log::error!("connection driver of committee {} panicked", self.id);
                }
            }
        }

        if self.health_running {
            self.health.on_stop();
            self.health_running = false;
        }

        if self.event_bus.is_open() {
            self.event_bus.publish(Event::StopCommittee(StopCommitteeEvent {
                timestamp: SystemTime::now(),
                committee: self.id,
            }));
            self.event_bus.stop();
        }

        self.switch.stop();
        self.stopped = true;
    }

    /// Check whether [`stop`](Self::stop) has been called. A stopped service is never started again.
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Accept endpoint announcements for members of the committee.
    ///
    /// Each announcement is checked on its own, and a bad one does not affect the others:
    /// - Announcements with a malformed public key or IP are skipped.
    /// - Announcements for keys outside the current validator set are skipped.
    /// - Valid announcements are recorded by the health manager, and resolve the node table entry of
    ///   the member if it is still unresolved. Resolved entries are never overwritten.
    ///
    /// If any entry was resolved and the local node is itself in the validator set, the connection
    /// driver is signalled.
    pub(crate) fn put_nodes(&mut self, nodes: &[CommitteeNode]) {
        let mut state = self.peers.lock();
        let mut update = false;

        for node in nodes {
            let public_key = match parse_public_key(&node.public_key) {
                Ok(public_key) => public_key,
                Err(err) => {
                    log::warn!("PutNodes, committee {}, {}: {}", self.id, node.ip, err);
                    self.reject(node, err.to_string());
                    continue;
                }
            };

            let address = Address::of(&public_key);
            if !state.validator_set.has_address(&address) {
                log::warn!(
                    "PutNodes, committee {}, {} is not in the validator set: {}:{}",
                    self.id,
                    address.peer_id(),
                    node.ip,
                    node.port
                );
                self.reject(node, "not in validator set".to_string());
                continue;
            }

            let port = self.profile.peer_port(node);
            let peer_address = match PeerAddress::new(address.peer_id(), &node.ip, port) {
                Ok(peer_address) => peer_address,
                Err(err) => {
                    log::warn!("PutNodes, committee {}, {}", self.id, err);
                    self.reject(node, err.to_string());
                    continue;
                }
            };

            if state.node_table.resolve(peer_address.clone()) == ResolveOutcome::Resolved {
                log::info!("PutNodes, committee {}, resolved {}", self.id, peer_address);
                update = true;
                self.event_bus.publish(Event::ResolveNode(ResolveNodeEvent {
                    timestamp: SystemTime::now(),
                    committee: self.id,
                    address: peer_address.clone(),
                }));
            }
            self.health
                .update_health_info(&peer_address.id, &peer_address.ip, port, &public_key);
        }

        log::debug!(
            "PutNodes, committee {}, {}",
            self.id,
            nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join("\n")
        );

        if update && state.validator_set.has_address(&self.me) {
            self.signals.request_update();
        }
    }

    /// Replace the validator set of the committee with one built from `committee`.
    ///
    /// Unresolved entries are added to the node table for active members that have none. If the
    /// consensus handle decides the committee should halt, returns [`UpdateOutcome::Halt`] and leaves
    /// stopping the service to the caller. Otherwise signals the connection driver and hands the new
    /// members to the health manager.
    pub(crate) fn update_validators(
        &mut self,
        committee: &CommitteeInfo,
    ) -> Result<UpdateOutcome, ConstructionError> {
        let validator_set = ValidatorSet::from_committee(committee)?;
        let validators = validator_set.len();
        let halt = self.consensus.update_validator_set(committee, &validator_set);

        {
            let mut state = self.peers.lock();
            state.validator_set = validator_set;
            state.node_table.add_placeholders(&committee.members, &self.me);
        }

        self.event_bus.publish(Event::UpdateCommittee(UpdateCommitteeEvent {
            timestamp: SystemTime::now(),
            committee: self.id,
            validators,
            halted: halt,
        }));

        if halt {
            return Ok(UpdateOutcome::Halt);
        }

        self.signals.request_update();
        self.health
            .update_from_committee(&committee.members, &committee.back_members);
        Ok(UpdateOutcome::Continue)
    }

    /// Set the height after which the committee's consensus instance winds down.
    pub(crate) fn set_end_height(&mut self, height: BlockHeight) {
        self.consensus.set_end_height(height)
    }

    /// Get a snapshot of the committee's node table.
    pub(crate) fn snapshot(&self) -> CommitteeSnapshot {
        let nodes = self.peers.lock().node_table.entries();
        CommitteeSnapshot {
            id: self.id,
            nodes_count: nodes.len() as u32,
            nodes,
        }
    }

    /// Get the progress of the committee's consensus instance.
    pub(crate) fn node_status(&self) -> NodeStatus {
        NodeStatus {
            height: self.consensus.height(),
            votes: self.consensus.votes(),
        }
    }

    /// Get the current height of the committee's consensus instance.
    pub(crate) fn height(&self) -> BlockHeight {
        self.consensus.height()
    }

    fn reject(&self, node: &CommitteeNode, reason: String) {
        self.event_bus.publish(Event::RejectNode(RejectNodeEvent {
            timestamp: SystemTime::now(),
            committee: self.id,
            ip: node.ip.clone(),
            reason,
        }));
    }
}
