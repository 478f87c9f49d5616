/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by committee services, for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed (or, for
//! [`DialFailedEvent`] and [`RejectNodeEvent`], that it was attempted and abandoned). Every event
//! carries the ID of the committee it happened in.
//!
//! Handlers for these events are registered on the [`NodeSpec`](crate::registry::NodeSpec), and fired
//! by the event bus of the committee's service.

use std::net::SocketAddr;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::node_table::PeerAddress;
use crate::types::data_types::{BlockHeight, CommitteeID};

/// Enumerates all events defined for the committee layer.
pub enum Event {
    // Events that change the set of live committees.
    PutCommittee(PutCommitteeEvent),
    StartCommittee(StartCommitteeEvent),
    StopCommittee(StopCommitteeEvent),
    UpdateCommittee(UpdateCommitteeEvent),
    // Events that change a committee's node table.
    ResolveNode(ResolveNodeEvent),
    RejectNode(RejectNodeEvent),
    // Events emitted by the connection driver.
    DialPeer(DialPeerEvent),
    DialFailed(DialFailedEvent),
}

impl Event {
    /// Publish `event` to the event bus behind `event_publisher`. Events published after the bus is
    /// gone are dropped.
    pub(crate) fn publish(event_publisher: &Sender<Event>, event: Event) {
        let _ = event_publisher.send(event);
    }
}

/// A committee was registered.
pub struct PutCommitteeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub start_height: BlockHeight,
    pub members: usize,
    pub back_members: usize,
}

/// A committee's transport and connection driver were started.
pub struct StartCommitteeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub listen_addr: SocketAddr,
}

/// A committee was stopped.
pub struct StopCommitteeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
}

/// A committee's validator set was replaced.
pub struct UpdateCommitteeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub validators: usize,
    pub halted: bool,
}

/// An endpoint announcement resolved a node table entry.
pub struct ResolveNodeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub address: PeerAddress,
}

/// An endpoint announcement was rejected.
pub struct RejectNodeEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub ip: String,
    pub reason: String,
}

/// The connection driver connected to a peer.
pub struct DialPeerEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub address: PeerAddress,
}

/// The connection driver failed to connect to a peer. The peer stays eligible for the next pass.
pub struct DialFailedEvent {
    pub timestamp: SystemTime,
    pub committee: CommitteeID,
    pub address: PeerAddress,
    pub error: String,
}
