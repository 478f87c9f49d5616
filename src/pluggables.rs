/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for the external components that a committee service drives but does not implement.
//!
//! The committee layer orchestrates, but does not contain, the BFT state machine, the peer-to-peer
//! transport, and health tracking. The library user provides these by implementing:
//! - [`ConsensusState`]: a handle to one committee's consensus instance.
//! - [`Switch`]: one committee's transport, able to dial peers.
//! - [`AddrBook`]: one committee's book of known addresses.
//! - [`HealthManager`]: liveness tracking of one committee's members.
//!
//! and a [`CommitteeProvider`], which the [registry](crate::registry::Node) calls to allocate a fresh
//! set of these for each committee it creates.
//!
//! ## Threading
//!
//! A service's consensus handle, address book and health manager are only called from the threads of
//! the registry's callers, one at a time. The [`Switch`] is cloned into the committee's
//! connection driver thread, so clones of a switch must share the same
//! underlying transport, in the way clones of a network handle do.

use std::net::SocketAddr;

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::error::{DialError, TransportError};
use crate::node_table::PeerAddress;
use crate::status::VoteSummary;
use crate::types::{
    committee::{CommitteeInfo, CommitteeMember},
    data_types::{BlockHeight, CommitteeID},
    identity::PeerID,
    validators::{Validator, ValidatorSet},
};

/// Version string advertised by the local node.
pub const NODE_INFO_VERSION: &str = "0.1.0";

/// Self-description of the local node, handed to a committee's transport when it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: PeerID,
    pub network: String,
    pub version: String,
    pub moniker: String,
    pub listen_addr: SocketAddr,
    pub external_addr: Option<SocketAddr>,
}

/// Handle to the consensus instance of a single committee.
pub trait ConsensusState: Send + 'static {
    /// Get the height the consensus instance is currently deciding.
    fn height(&self) -> BlockHeight;

    /// Get a summary of the votes collected at the current height.
    fn votes(&self) -> VoteSummary;

    /// Bind the local node's signing key to the consensus instance and to its local validator identity.
    fn set_signing_key(&mut self, key: SigningKey);

    /// Replace the validator set of the consensus instance. Returns `true` if, under the new set, the
    /// committee should halt on this node (e.g., because the local node was dropped from it).
    fn update_validator_set(&mut self, committee: &CommitteeInfo, validator_set: &ValidatorSet) -> bool;

    /// Set the height after which the consensus instance winds down.
    fn set_end_height(&mut self, height: BlockHeight);
}

/// Transport of a single committee.
pub trait Switch: Clone + Send + 'static {
    /// Set the self-description the transport announces to peers.
    fn set_node_info(&mut self, node_info: NodeInfo);

    /// Set the key the transport authenticates connections with.
    fn set_node_key(&mut self, key: SigningKey);

    /// Start listening and accepting connections.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Stop the transport. Stopping a stopped transport has no effect.
    fn stop(&mut self);

    /// Check whether the transport is running.
    fn is_running(&self) -> bool;

    /// Dial the peer at `address`, blocking until the connection is established or fails.
    fn dial_peer(&mut self, address: &PeerAddress) -> Result<(), DialError>;
}

/// Book of known peer addresses of a single committee.
pub trait AddrBook: Send + 'static {
    /// Register the local node's own address, so that it is never dialed.
    fn add_our_address(&mut self, address: &PeerAddress);

    /// Register identities of peers that must never be gossiped to others.
    fn add_private_ids(&mut self, ids: &[PeerID]);
}

/// Liveness tracking of the members of a single committee.
pub trait HealthManager: Send + 'static {
    /// Start tracking an active member.
    fn put_work_health(&mut self, id: PeerID, validator: Validator);

    /// Start tracking a backup member.
    fn put_back_health(&mut self, id: PeerID, validator: Validator);

    /// Record the announced endpoint of a member.
    fn update_health_info(&mut self, id: &PeerID, ip: &str, port: u16, public_key: &VerifyingKey);

    /// Replace the tracked members with those of an updated committee descriptor.
    fn update_from_committee(&mut self, members: &[CommitteeMember], back_members: &[CommitteeMember]);

    /// Start background health tracking.
    fn on_start(&mut self);

    /// Stop background health tracking.
    fn on_stop(&mut self);
}

/// Allocates the external components of a new committee.
pub trait CommitteeProvider: Send + Sync + 'static {
    type Consensus: ConsensusState;
    type Switch: Switch;
    type AddrBook: AddrBook;
    type Health: HealthManager;

    /// Allocate a consensus instance for `committee`, starting at `start_height` with `validator_set`.
    fn new_consensus_state(
        &self,
        committee: CommitteeID,
        start_height: BlockHeight,
        validator_set: &ValidatorSet,
    ) -> Self::Consensus;

    /// Allocate a fresh, stopped transport for `committee`.
    fn new_switch(&self, committee: CommitteeID) -> Self::Switch;

    /// Allocate an address book for `committee`.
    fn new_addr_book(&self, committee: CommitteeID) -> Self::AddrBook;

    /// Allocate a health manager for `committee`.
    fn new_health_manager(&self, committee: CommitteeID) -> Self::Health;

    /// Attach the consensus reactor of `consensus` to `switch`, and give both access to `health`.
    fn attach_consensus_reactor(
        &self,
        consensus: &mut Self::Consensus,
        switch: &mut Self::Switch,
        health: &mut Self::Health,
    );
}
