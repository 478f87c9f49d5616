//! Selection of the local listen address and of remote peers' ports for a committee.
//!
//! Every node declares two listen addresses and every peer announces two ports. Which of the two a
//! committee uses depends only on the parity of its ID: even committees use the primary profile, odd
//! committees the secondary. Since the committees that are live at the same time are consecutive (a
//! committee and its successor), they never contend for the same local port.

use std::net::SocketAddr;

use crate::config::Configuration;
use crate::types::{committee::CommitteeNode, data_types::CommitteeID};

/// One of the two listen profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenProfile {
    /// Profile of even committees: `listen_address_1` locally, `port` on peers.
    Primary,

    /// Profile of odd committees: `listen_address_2` locally, `port2` on peers.
    Secondary,
}

impl ListenProfile {
    /// Get the profile used by `committee`.
    pub const fn for_committee(committee: CommitteeID) -> ListenProfile {
        if committee.is_even() {
            ListenProfile::Primary
        } else {
            ListenProfile::Secondary
        }
    }

    /// Get the local listen address of this profile.
    pub fn listen_address(&self, config: &Configuration) -> SocketAddr {
        match self {
            ListenProfile::Primary => config.listen_address_1,
            ListenProfile::Secondary => config.listen_address_2,
        }
    }

    /// Get the port of `node` that peers in this profile should be dialed on.
    pub fn peer_port(&self, node: &CommitteeNode) -> u16 {
        match self {
            ListenProfile::Primary => node.port,
            ListenProfile::Secondary => node.port2,
        }
    }
}
