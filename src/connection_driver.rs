/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The connection driver thread, which turns node table and validator set facts into dials.
//!
//! Every running committee service has one connection driver. The driver does not poll: it sleeps until
//! it is [signalled](DriverSignals), and on every update signal makes one pass over the node table,
//! dialing every resolved, not yet connected peer that is in the committee's current validator set.
//!
//! ## Signals
//!
//! [`DriverSignals`] is a queue with room for exactly one pending update and one pending termination:
//! - Requesting an update while one is already pending has no further effect (updates coalesce).
//! - A pending termination is always delivered before a pending update, and once requested, is
//!   delivered on every subsequent wait.
//!
//! Sending a signal never blocks on the driver, so signals can be sent while holding the lock the driver
//! itself needs.
//!
//! ## Locking
//!
//! The driver reads the node table and validator set under the service's [`SharedPeers`] lock, releases
//! the lock, dials, and only re-acquires the lock to mark a dial as successful. A slow dial therefore
//! never blocks callers that update the node table.

use std::io;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crate::events::{DialFailedEvent, DialPeerEvent, Event};
use crate::node_table::{NodeTable, PeerAddress};
use crate::pluggables::Switch;
use crate::types::{data_types::CommitteeID, validators::ValidatorSet};

/// The state of a committee that is shared between its service and its connection driver.
pub(crate) struct PeerState {
    pub(crate) node_table: NodeTable,
    pub(crate) validator_set: ValidatorSet,
}

/// Lock-guarded [`PeerState`]. Every read and replacement of the validator set, and every read and write
/// of the node table, goes through this lock.
#[derive(Clone)]
pub(crate) struct SharedPeers(Arc<Mutex<PeerState>>);

impl SharedPeers {
    pub(crate) fn new(node_table: NodeTable, validator_set: ValidatorSet) -> SharedPeers {
        SharedPeers(Arc::new(Mutex::new(PeerState {
            node_table,
            validator_set,
        })))
    }

    /// Acquire the lock. A panic on another thread while holding the lock does not leave the node table
    /// or validator set half-updated, so a poisoned lock is recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, PeerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A signal received by the connection driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DriverSignal {
    /// Make a pass over the node table.
    Update,

    /// Exit the driver loop.
    Terminate,
}

#[derive(Default)]
struct PendingSignals {
    update: bool,
    terminate: bool,
}

/// The signal queue of a connection driver. See the [module-level docs](self#signals).
#[derive(Default)]
pub(crate) struct DriverSignals {
    pending: Mutex<PendingSignals>,
    ready: Condvar,
}

impl DriverSignals {
    pub(crate) fn new() -> Arc<DriverSignals> {
        Arc::new(DriverSignals::default())
    }

    /// Ask the driver to make a pass over the node table.
    pub(crate) fn request_update(&self) {
        self.pending().update = true;
        self.ready.notify_one();
    }

    /// Ask the driver to exit.
    pub(crate) fn terminate(&self) {
        self.pending().terminate = true;
        self.ready.notify_one();
    }

    /// Check whether termination has been requested.
    pub(crate) fn is_terminated(&self) -> bool {
        self.pending().terminate
    }

    /// Check whether an update is waiting to be received.
    #[cfg(test)]
    pub(crate) fn has_pending_update(&self) -> bool {
        self.pending().update
    }

    /// Block until a signal is pending, then receive it.
    pub(crate) fn wait(&self) -> DriverSignal {
        let mut pending = self.pending();
        loop {
            if pending.terminate {
                return DriverSignal::Terminate;
            }
            if pending.update {
                pending.update = false;
                return DriverSignal::Update;
            }
            pending = self
                .ready
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingSignals> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn the connection driver thread of `committee`.
pub(crate) fn start_connection_driver<S: Switch>(
    committee: CommitteeID,
    mut switch: S,
    peers: SharedPeers,
    signals: Arc<DriverSignals>,
    event_publisher: Sender<Event>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("committee-{}-driver", committee))
        .spawn(move || loop {
            match signals.wait() {
                DriverSignal::Update => {
                    update_nodes(committee, &mut switch, &peers, &signals, &event_publisher)
                }
                DriverSignal::Terminate => {
                    log::debug!("connection driver of committee {} exiting", committee);
                    return;
                }
            }
        })
}

/// Dial every resolved, unconnected peer in the node table whose identity is in the current validator
/// set. Stops early if termination is requested between dials.
pub(crate) fn update_nodes<S: Switch>(
    committee: CommitteeID,
    switch: &mut S,
    peers: &SharedPeers,
    signals: &DriverSignals,
    event_publisher: &Sender<Event>,
) {
    let candidates = {
        let state = peers.lock();
        state.node_table.dial_candidates(&state.validator_set)
    };

    for address in candidates {
        if signals.is_terminated() {
            return;
        }
        conn_to(committee, switch, peers, address, event_publisher);
    }
}

/// Dial a single peer. On success, marks its entry connected. On failure, leaves the entry eligible
/// for the next pass.
fn conn_to<S: Switch>(
    committee: CommitteeID,
    switch: &mut S,
    peers: &SharedPeers,
    address: PeerAddress,
    event_publisher: &Sender<Event>,
) {
    log::info!("ConnectionDriver, committee {}, dialing {}", committee, address);
    match switch.dial_peer(&address) {
        Ok(()) => {
            if !peers.lock().node_table.mark_connected(&address) {
                log::warn!(
                    "ConnectionDriver, committee {}, entry for {} changed while dialing",
                    committee,
                    address.id
                );
            }
            Event::publish(
                event_publisher,
                Event::DialPeer(DialPeerEvent {
                    timestamp: SystemTime::now(),
                    committee,
                    address,
                }),
            );
        }
        Err(err) => {
            log::error!("ConnectionDriver, committee {}, dial {} failed: {}", committee, address, err);
            Event::publish(
                event_publisher,
                Event::DialFailed(DialFailedEvent {
                    timestamp: SystemTime::now(),
                    committee,
                    address,
                    error: err.0,
                }),
            );
        }
    }
}
