/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-committee mapping from peer identity to endpoint and connection state.
//!
//! ## Entry lifecycle
//!
//! A [`NodeEntry`] is created [`Unresolved`](NodeEntry::Unresolved) when the committee is formed: the
//! identity of the member is known, but not where to reach it. It becomes
//! [`Resolved`](NodeEntry::Resolved) once, when an endpoint announcement for the member is accepted, and
//! is never overwritten afterwards. A resolved entry's `connected` flag is set once a dial succeeds, and
//! is never cleared by this layer.
//!
//! Only active members of the committee (other than the local node) ever get an entry.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::IdentityError;
use crate::types::{
    committee::{CommitteeMember, MemberFlag},
    identity::{peer_id_of, Address, PeerID},
    validators::ValidatorSet,
};

/// Network address of a peer: its identity together with the IP and port to dial it on.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PeerAddress {
    pub id: PeerID,
    pub ip: String,
    pub port: u16,
}

impl PeerAddress {
    /// Create a `PeerAddress`, checking that `ip` is an IPv4 or IPv6 address.
    pub fn new(id: PeerID, ip: &str, port: u16) -> Result<PeerAddress, IdentityError> {
        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| IdentityError::InvalidIP(ip.to_string()))?;
        Ok(PeerAddress {
            id,
            ip: ip.to_string(),
            port,
        })
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.ip.contains(':') {
            write!(f, "{}@[{}]:{}", self.id, self.ip, self.port)
        } else {
            write!(f, "{}@{}:{}", self.id, self.ip, self.port)
        }
    }
}

/// A node table entry whose endpoint is known.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ResolvedNode {
    pub address: PeerAddress,
    pub connected: bool,
}

/// An entry of the [`NodeTable`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum NodeEntry {
    /// The member is known but no endpoint has been accepted for it yet.
    Unresolved(PeerID),

    /// The member's endpoint has been accepted.
    Resolved(ResolvedNode),
}

impl NodeEntry {
    /// Get the identity of the member this entry is for.
    pub fn id(&self) -> &PeerID {
        match self {
            NodeEntry::Unresolved(id) => id,
            NodeEntry::Resolved(node) => &node.address.id,
        }
    }

    /// Check whether the entry is resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, NodeEntry::Resolved(_))
    }

    /// Check whether a dial to the entry's peer has succeeded.
    pub fn is_connected(&self) -> bool {
        matches!(self, NodeEntry::Resolved(ResolvedNode { connected: true, .. }))
    }
}

/// What happened to an endpoint offered to [`NodeTable::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The entry was unresolved, and now is resolved.
    Resolved,

    /// The entry was already resolved, and was left as it was.
    AlreadyResolved,

    /// There is no entry for the identity.
    UnknownPeer,
}

/// Maps the identity of every other active member of a committee to a [`NodeEntry`].
#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    entries: HashMap<PeerID, NodeEntry>,
}

impl NodeTable {
    /// Create an empty node table.
    pub fn new() -> NodeTable {
        NodeTable {
            entries: HashMap::new(),
        }
    }

    /// Create a node table with an unresolved entry for each active member in `members`, except the
    /// member whose address is `me`.
    pub fn from_members(members: &[CommitteeMember], me: &Address) -> NodeTable {
        let mut table = NodeTable::new();
        table.add_placeholders(members, me);
        table
    }

    /// Add an unresolved entry for each active member in `members` that has no entry yet, skipping the
    /// member whose address is `me`. Returns how many entries were added.
    pub fn add_placeholders(&mut self, members: &[CommitteeMember], me: &Address) -> usize {
        let mut added = 0;
        for member in members {
            if member.flag != MemberFlag::Used || Address::of(&member.public_key) == *me {
                continue;
            }
            let id = peer_id_of(&member.public_key);
            if !self.entries.contains_key(&id) {
                log::debug!("CommitteeMember, {}", id);
                self.entries.insert(id.clone(), NodeEntry::Unresolved(id));
                added += 1;
            }
        }
        added
    }

    /// Resolve the entry for `address.id` with `address`, if that entry exists and is unresolved.
    pub fn resolve(&mut self, address: PeerAddress) -> ResolveOutcome {
        match self.entries.get_mut(&address.id) {
            None => ResolveOutcome::UnknownPeer,
            Some(NodeEntry::Resolved(_)) => ResolveOutcome::AlreadyResolved,
            Some(entry) => {
                *entry = NodeEntry::Resolved(ResolvedNode {
                    address,
                    connected: false,
                });
                ResolveOutcome::Resolved
            }
        }
    }

    /// Get the addresses of every resolved, not yet connected entry whose identity is in
    /// `validator_set`.
    pub fn dial_candidates(&self, validator_set: &ValidatorSet) -> Vec<PeerAddress> {
        let mut candidates: Vec<PeerAddress> = self
            .entries
            .values()
            .filter_map(|entry| match entry {
                NodeEntry::Resolved(node) if !node.connected => Some(&node.address),
                _ => None,
            })
            .filter(|address| match address.id.address() {
                Ok(address) => validator_set.has_address(&address),
                Err(_) => false,
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates
    }

    /// Mark the entry resolved to `address` as connected. Returns false if the table no longer holds an
    /// entry resolved to exactly that address.
    pub fn mark_connected(&mut self, address: &PeerAddress) -> bool {
        match self.entries.get_mut(&address.id) {
            Some(NodeEntry::Resolved(node)) if node.address == *address => {
                node.connected = true;
                true
            }
            _ => false,
        }
    }

    /// Get the entry for `id`.
    pub fn get(&self, id: &PeerID) -> Option<&NodeEntry> {
        self.entries.get(id)
    }

    /// Get a copy of every entry, in ascending order of identity.
    pub fn entries(&self) -> Vec<NodeEntry> {
        let mut entries: Vec<NodeEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.id().cmp(b.id()));
        entries
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
