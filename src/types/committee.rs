/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Inputs handed to the registry by the agent: committee descriptors and endpoint announcements.

use std::fmt::{self, Display, Formatter};

use ed25519_dalek::VerifyingKey;

use super::data_types::{BlockHeight, CommitteeID};
use super::identity::peer_id_of;

/// Whether a member currently takes part in consensus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberFlag {
    /// The member is active.
    Used,

    /// The member is a standby that may be rotated in.
    Unused,

    /// The member has been rotated out.
    Removed,
}

/// A member of a committee, as listed in a [`CommitteeInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeMember {
    pub public_key: VerifyingKey,
    pub flag: MemberFlag,
}

impl CommitteeMember {
    /// Create an active member.
    pub fn new(public_key: VerifyingKey) -> Self {
        Self {
            public_key,
            flag: MemberFlag::Used,
        }
    }

    /// Create a member with an explicit `flag`.
    pub fn with_flag(public_key: VerifyingKey, flag: MemberFlag) -> Self {
        Self { public_key, flag }
    }
}

/// Descriptor of a committee: its ID, the height it starts at, its active members, and its backup
/// members.
///
/// The ID is optional because descriptors arrive from an external agent, and a descriptor without an ID
/// must be rejected rather than assumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeInfo {
    pub id: Option<CommitteeID>,
    pub start_height: BlockHeight,
    pub members: Vec<CommitteeMember>,
    pub back_members: Vec<CommitteeMember>,
}

impl CommitteeInfo {
    /// Create a descriptor with no backup members.
    pub fn new(id: CommitteeID, start_height: BlockHeight, members: Vec<CommitteeMember>) -> Self {
        Self {
            id: Some(id),
            start_height,
            members,
            back_members: Vec::new(),
        }
    }

    /// Set the backup members of this descriptor.
    pub fn with_back_members(mut self, back_members: Vec<CommitteeMember>) -> Self {
        self.back_members = back_members;
        self
    }
}

impl Display for CommitteeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "committee {}", id)?,
            None => write!(f, "committee <none>")?,
        }
        write!(f, ", start {}, members [", self.start_height)?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", peer_id_of(&member.public_key))?;
        }
        write!(f, "], backups {}", self.back_members.len())
    }
}

/// An endpoint announcement for a committee member: the member's (untrusted) public key bytes, its IP,
/// and the two ports it listens on. Which port is used depends on the committee's
/// [listen profile](crate::listen_profile::ListenProfile).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeNode {
    pub public_key: Vec<u8>,
    pub ip: String,
    pub port: u16,
    pub port2: u16,
}

impl CommitteeNode {
    /// Create an announcement for `public_key`.
    pub fn new(public_key: &VerifyingKey, ip: impl Into<String>, port: u16, port2: u16) -> Self {
        Self {
            public_key: public_key.to_bytes().to_vec(),
            ip: ip.into(),
            port,
            port2,
        }
    }
}

impl Display for CommitteeNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}/{}",
            hex::encode(&self.public_key),
            self.ip,
            self.port,
            self.port2
        )
    }
}
