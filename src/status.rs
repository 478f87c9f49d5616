//! Read-only snapshots of the committees the local node participates in.
//!
//! Status types derive Borsh so that an API layer can ship them as they are.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::node_table::NodeEntry;
use crate::types::data_types::{BlockHeight, CommitteeID};

/// Summary of the votes a consensus instance has collected at its current height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VoteSummary {
    pub round: u32,
    pub prevotes: u32,
    pub precommits: u32,
}

/// Progress of a committee's consensus instance.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NodeStatus {
    pub height: BlockHeight,
    pub votes: VoteSummary,
}

/// Snapshot of one committee's node table.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitteeSnapshot {
    pub id: CommitteeID,
    pub nodes: Vec<NodeEntry>,
    pub nodes_count: u32,
}

/// Combined status of a committee and its successor, as returned by
/// [`Node::get_committee_status`](crate::registry::Node::get_committee_status).
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitteeStatus {
    pub committee_now: Option<CommitteeSnapshot>,
    pub node_status: Option<NodeStatus>,
    pub committee_next: Option<CommitteeSnapshot>,
}
