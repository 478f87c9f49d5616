/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The different ways calls into the committee registry and its components can fail.
//!
//! Errors returned to the agent are [`NodeError`]s. Errors specific to one component (building a
//! committee, starting a committee service, deriving an identity, talking to the transport) have their
//! own enum and convert into `NodeError` where they cross the registry boundary.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::types::data_types::CommitteeID;

/// Enumerates the different ways a call to any of [`Node`](crate::registry::Node)'s methods can fail.
#[derive(Debug)]
pub enum NodeError {
    /// A required argument was missing or empty, e.g., a committee without an ID, a committee with no
    /// members, or an empty list of endpoints.
    InvalidArgument(&'static str),

    /// No service is registered for the committee.
    UnknownCommittee(CommitteeID),

    /// A service is already registered for the committee. Registration is one-shot.
    DuplicateCommittee(CommitteeID),

    /// See: [`ConstructionError`].
    ConstructionFailed(ConstructionError),

    /// See: [`ServiceStartError`].
    StartFailed(ServiceStartError),
}

impl Display for NodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            NodeError::UnknownCommittee(id) => write!(f, "unknown committee: {}", id),
            NodeError::DuplicateCommittee(id) => write!(f, "duplicate committee: {}", id),
            NodeError::ConstructionFailed(err) => write!(f, "committee construction failed: {}", err),
            NodeError::StartFailed(err) => write!(f, "committee start failed: {}", err),
        }
    }
}

impl Error for NodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NodeError::ConstructionFailed(err) => Some(err),
            NodeError::StartFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConstructionError> for NodeError {
    fn from(value: ConstructionError) -> Self {
        match value {
            ConstructionError::MissingCommitteeID => NodeError::InvalidArgument("missing committee id"),
            ConstructionError::EmptyMembers => NodeError::InvalidArgument("empty member list"),
            other => NodeError::ConstructionFailed(other),
        }
    }
}

impl From<ServiceStartError> for NodeError {
    fn from(value: ServiceStartError) -> Self {
        NodeError::StartFailed(value)
    }
}

/// Enumerates the ways building the validator set or node table of a committee can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum ConstructionError {
    /// The committee descriptor carries no ID.
    MissingCommitteeID,

    /// The committee descriptor lists no active members.
    EmptyMembers,

    /// Every active member of the committee is the local node, so there is no peer to connect to.
    EmptyNodeTable,
}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::MissingCommitteeID => write!(f, "missing committee id"),
            ConstructionError::EmptyMembers => write!(f, "empty member list"),
            ConstructionError::EmptyNodeTable => write!(f, "node table has no peers"),
        }
    }
}

impl Error for ConstructionError {}

/// Enumerates the ways starting a committee (with [`Action::Start`](crate::registry::Action::Start))
/// can fail. Resources started before the failure are released by a later `stop`.
#[derive(Debug)]
pub enum ServiceStartError {
    /// The service's event bus thread could not be spawned.
    EventBusStartFailed(io::Error),

    /// The transport switch refused to start.
    TransportStartFailed(TransportError),

    /// The connection driver thread could not be spawned.
    DriverStartFailed(io::Error),
}

impl Display for ServiceStartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStartError::EventBusStartFailed(err) => write!(f, "event bus: {}", err),
            ServiceStartError::TransportStartFailed(err) => write!(f, "transport: {}", err),
            ServiceStartError::DriverStartFailed(err) => write!(f, "connection driver: {}", err),
        }
    }
}

impl Error for ServiceStartError {}

impl From<TransportError> for ServiceStartError {
    fn from(value: TransportError) -> Self {
        ServiceStartError::TransportStartFailed(value)
    }
}

/// An error reported by a [`Switch`](crate::pluggables::Switch) implementation when it fails to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for TransportError {}

/// An error reported by a [`Switch`](crate::pluggables::Switch) implementation when dialing a peer fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialError(pub String);

impl Display for DialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for DialError {}

/// Enumerates the ways deriving a peer identity or a peer address from untrusted input can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The bytes are not a valid Ed25519 public key.
    InvalidPublicKey(String),

    /// The string is not the hex encoding of an address.
    InvalidPeerID(String),

    /// The string is not an IPv4 or IPv6 address.
    InvalidIP(String),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidPublicKey(msg) => write!(f, "invalid public key: {}", msg),
            IdentityError::InvalidPeerID(msg) => write!(f, "invalid peer id: {}", msg),
            IdentityError::InvalidIP(msg) => write!(f, "invalid ip: {}", msg),
        }
    }
}

impl Error for IdentityError {}
