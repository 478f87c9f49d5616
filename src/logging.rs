/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [config](crate::config::Configuration).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least three values. The first three values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//! 3. The ID of the committee the event happened in.
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [DialPeer](crate::events::DialPeerEvent) is printed:
//!
//! ```text
//! DialPeer, 1701329264, 7, Id5u7f6, 10.0.0.2:30310
//! ```
//!
//! In the snippet, the fourth value is the first seven characters of the Base64 encoding of the address
//! of the peer, and the fifth value is the IP and port it was dialed on.

use std::sync::Arc;
use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::event_bus::HandlerPtr;
use crate::events::*;
use crate::types::identity::PeerID;

// Names of each event in PascalCase for printing:
pub const PUT_COMMITTEE: &str = "PutCommittee";
pub const START_COMMITTEE: &str = "StartCommittee";
pub const STOP_COMMITTEE: &str = "StopCommittee";
pub const UPDATE_COMMITTEE: &str = "UpdateCommittee";

pub const RESOLVE_NODE: &str = "ResolveNode";
pub const REJECT_NODE: &str = "RejectNode";

pub const DIAL_PEER: &str = "DialPeer";
pub const DIAL_FAILED: &str = "DialFailed";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> HandlerPtr<Self>;
}

impl Logger for PutCommitteeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &PutCommitteeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                PUT_COMMITTEE,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                event.start_height,
                event.members,
                event.back_members
            )
        };
        Arc::new(logger)
    }
}

impl Logger for StartCommitteeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &StartCommitteeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_COMMITTEE,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                event.listen_addr
            )
        };
        Arc::new(logger)
    }
}

impl Logger for StopCommitteeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &StopCommitteeEvent| {
            log::info!(
                "{}, {}, {}",
                STOP_COMMITTEE,
                secs_since_unix_epoch(event.timestamp),
                event.committee
            )
        };
        Arc::new(logger)
    }
}

impl Logger for UpdateCommitteeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &UpdateCommitteeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                UPDATE_COMMITTEE,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                event.validators,
                event.halted
            )
        };
        Arc::new(logger)
    }
}

impl Logger for ResolveNodeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &ResolveNodeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}:{}",
                RESOLVE_NODE,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                short_peer_id(&event.address.id),
                event.address.ip,
                event.address.port
            )
        };
        Arc::new(logger)
    }
}

impl Logger for RejectNodeEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &RejectNodeEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                REJECT_NODE,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                event.ip,
                event.reason
            )
        };
        Arc::new(logger)
    }
}

impl Logger for DialPeerEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &DialPeerEvent| {
            log::info!(
                "{}, {}, {}, {}, {}:{}",
                DIAL_PEER,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                short_peer_id(&event.address.id),
                event.address.ip,
                event.address.port
            )
        };
        Arc::new(logger)
    }
}

impl Logger for DialFailedEvent {
    fn get_logger() -> HandlerPtr<Self> {
        let logger = |event: &DialFailedEvent| {
            log::error!(
                "{}, {}, {}, {}, {}:{}, {}",
                DIAL_FAILED,
                secs_since_unix_epoch(event.timestamp),
                event.committee,
                short_peer_id(&event.address.id),
                event.address.ip,
                event.address.port,
                event.error
            )
        };
        Arc::new(logger)
    }
}

/// Get a more readable representation of a peer's identity by base64-encoding its address and taking
/// the first 7 characters.
pub(crate) fn short_peer_id(peer_id: &PeerID) -> String {
    match peer_id.address() {
        Ok(address) => first_seven_base64_chars(address.bytes()),
        Err(_) => peer_id.as_str().chars().take(7).collect(),
    }
}

/// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7
/// characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
