/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The registry of committee services on the local node, and the interface the committee-selection
//! agent drives it through.
//!
//! A node can take part in several committees over its lifetime, and in two of them at once while one
//! committee hands over to its successor. For each committee it takes part in, the node runs one
//! committee service, keyed by [`CommitteeID`] in the registry held by [`Node`].
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the node](NodeSpec).
//! - The function to [start](NodeSpec::start) a [`Node`] given its specification.
//! - The methods of [`Node`], one for each request the agent can make.
//!
//! ## Starting a node
//!
//! ```ignore
//! let node =
//!     NodeSpec::builder()
//!     .provider(provider)
//!     .configuration(configuration)
//!     .on_dial_peer(dial_handler)
//!     .build()
//!     .start();
//!
//! node.put_committee(&committee)?;
//! node.put_nodes(committee_id, &endpoints)?;
//! node.notify(committee_id, Action::Start)?;
//! ```
//!
//! ### Required setters
//!
//! - `.provider(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters register user-defined event handlers for events from [crate::events]:
//! - `.on_put_committee(...)`
//! - `.on_start_committee(...)`
//! - `.on_stop_committee(...)`
//! - `.on_update_committee(...)`
//! - `.on_resolve_node(...)`
//! - `.on_reject_node(...)`
//! - `.on_dial_peer(...)`
//! - `.on_dial_failed(...)`
//!
//! ## Concurrency
//!
//! All methods of [`Node`] take `&self` and may be called from any thread. Two levels of locks are
//! involved:
//! 1. The registry lock guards the map from committee IDs to services. It is only held to look up,
//!    insert, or remove a service, and while registering a committee.
//! 2. Every service has its own lock, which serializes the requests made of that committee.
//!
//! A service's lock is never acquired while the registry lock is held. So a request for one committee
//! that blocks (e.g., stopping it, which waits for its connection driver to exit, or handing an
//! announcement to a slow health manager) only delays later requests for the same committee.
//!
//! A request that looked a service up just before it was removed finds it stopped once it acquires the
//! service's lock, and fails with [`NodeError::UnknownCommittee`] as if the lookup had missed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use typed_builder::TypedBuilder;

use crate::config::Configuration;
use crate::error::NodeError;
use crate::event_bus::{EventHandlers, HandlerPtr};
use crate::events::*;
use crate::pluggables::{CommitteeProvider, NodeInfo, NODE_INFO_VERSION};
use crate::service::{CommitteeService, UpdateOutcome};
use crate::status::CommitteeStatus;
use crate::types::{
    committee::{CommitteeInfo, CommitteeNode},
    data_types::{BlockHeight, CommitteeID},
};

/// Stores the trait implementations and parameters required to run a [`Node`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.provider(...)`
    - `.configuration(...)`

    Optional:
    - `.on_put_committee(...)`
    - `.on_start_committee(...)`
    - `.on_stop_committee(...)`
    - `.on_update_committee(...)`
    - `.on_resolve_node(...)`
    - `.on_reject_node(...)`
    - `.on_dial_peer(...)`
    - `.on_dial_failed(...)`
"))]
pub struct NodeSpec<P: CommitteeProvider> {
    // Required parameters
    #[builder(setter(doc = "Set the allocator of consensus instances, transports, address books and health managers. The argument must implement the [CommitteeProvider](crate::pluggables::CommitteeProvider) trait. Required."))]
    provider: P,
    #[builder(setter(doc = "Set the [configuration](Configuration) of the local node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&PutCommitteeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<PutCommitteeEvent>),
    doc = "Register a handler closure to be invoked after a committee is registered. Optional."))]
    on_put_committee: Option<HandlerPtr<PutCommitteeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartCommitteeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<StartCommitteeEvent>),
    doc = "Register a handler closure to be invoked after a committee's transport and connection driver start. Optional."))]
    on_start_committee: Option<HandlerPtr<StartCommitteeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StopCommitteeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<StopCommitteeEvent>),
    doc = "Register a handler closure to be invoked after a committee is stopped. Optional."))]
    on_stop_committee: Option<HandlerPtr<StopCommitteeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateCommitteeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<UpdateCommitteeEvent>),
    doc = "Register a handler closure to be invoked after a committee's validator set is replaced. Optional."))]
    on_update_committee: Option<HandlerPtr<UpdateCommitteeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ResolveNodeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<ResolveNodeEvent>),
    doc = "Register a handler closure to be invoked after an endpoint announcement resolves a member. Optional."))]
    on_resolve_node: Option<HandlerPtr<ResolveNodeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectNodeEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<RejectNodeEvent>),
    doc = "Register a handler closure to be invoked after an endpoint announcement is rejected. Optional."))]
    on_reject_node: Option<HandlerPtr<RejectNodeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DialPeerEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<DialPeerEvent>),
    doc = "Register a handler closure to be invoked after a connection driver connects to a peer. Optional."))]
    on_dial_peer: Option<HandlerPtr<DialPeerEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DialFailedEvent) + Send + Sync + 'static| Some(Arc::new(handler) as HandlerPtr<DialFailedEvent>),
    doc = "Register a handler closure to be invoked after a connection driver fails to connect to a peer. Optional."))]
    on_dial_failed: Option<HandlerPtr<DialFailedEvent>>,
}

impl<P: CommitteeProvider> NodeSpec<P> {
    /// Create the [`Node`] described by this specification. The node starts with no committees.
    pub fn start(self) -> Node<P> {
        let handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_put_committee,
            self.on_start_committee,
            self.on_stop_committee,
            self.on_update_committee,
            self.on_resolve_node,
            self.on_reject_node,
            self.on_dial_peer,
            self.on_dial_failed,
        );

        let node_info = NodeInfo {
            id: self.configuration.peer_id(),
            network: self.configuration.chain_id.to_string(),
            version: NODE_INFO_VERSION.to_string(),
            moniker: self.configuration.moniker.clone(),
            listen_addr: self.configuration.listen_address_1,
            external_addr: self.configuration.external_address,
        };
        log::info!("node {} started, moniker {}", node_info.id, node_info.moniker);

        Node {
            provider: self.provider,
            configuration: self.configuration,
            node_info,
            handlers: Arc::new(handlers),
            services: Mutex::new(HashMap::new()),
        }
    }
}

/// Requests the agent can make of a committee with [`Node::notify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Start the committee's transport and connection driver.
    Start,

    /// Stop the committee and remove it from the registry.
    Stop,

    /// Accepted and ignored.
    Switch,
}

/// A registered committee service, behind its own lock.
type ServiceHandle<P> = Arc<Mutex<CommitteeService<P>>>;

/// The local node's registry of committee services. When this value is dropped, every registered
/// committee is stopped.
pub struct Node<P: CommitteeProvider> {
    provider: P,
    configuration: Configuration,
    node_info: NodeInfo,
    handlers: Arc<EventHandlers>,
    services: Mutex<HashMap<CommitteeID, ServiceHandle<P>>>,
}

impl<P: CommitteeProvider> Node<P> {
    /// Register a service for `committee`, without starting it.
    ///
    /// ## Errors
    ///
    /// - [`NodeError::InvalidArgument`] if the descriptor has no ID or no members.
    /// - [`NodeError::DuplicateCommittee`] if a service is already registered under the same ID. The
    ///   registered service is left untouched.
    /// - [`NodeError::ConstructionFailed`] if the local node is the only member left to connect to.
    ///   Nothing is registered.
    pub fn put_committee(&self, committee: &CommitteeInfo) -> Result<(), NodeError> {
        let id = committee
            .id
            .ok_or(NodeError::InvalidArgument("committee has no id"))?;
        if committee.members.is_empty() {
            return Err(NodeError::InvalidArgument("committee has no members"));
        }
        log::info!("PutCommittee, {}", committee);

        let mut services = self.services();
        if services.contains_key(&id) {
            log::error!("PutCommittee, committee {} already exists", id);
            return Err(NodeError::DuplicateCommittee(id));
        }

        let service = CommitteeService::build(
            &self.provider,
            committee,
            self.configuration.address(),
            self.handlers.clone(),
        )?;
        services.insert(id, Arc::new(Mutex::new(service)));
        Ok(())
    }

    /// Announce the endpoints of members of the committee `id`.
    ///
    /// Each announcement is checked on its own. Announcements with a malformed key or IP, or for keys
    /// outside the committee's current validator set, are skipped. The others resolve the member's
    /// node table entry if it is still unresolved, and wake the committee's connection driver.
    ///
    /// ## Errors
    ///
    /// - [`NodeError::InvalidArgument`] if `nodes` is empty.
    /// - [`NodeError::UnknownCommittee`] if no service is registered under `id`.
    pub fn put_nodes(&self, id: CommitteeID, nodes: &[CommitteeNode]) -> Result<(), NodeError> {
        if nodes.is_empty() {
            return Err(NodeError::InvalidArgument("no nodes"));
        }
        let handle = self.service(id)?;
        let mut service = lock_live(&handle, id)?;
        service.put_nodes(nodes);
        Ok(())
    }

    /// Start or stop the committee `id`.
    ///
    /// - `Start`: starts the committee's transport and connection driver. Starting a running committee
    ///   has no effect. If starting fails, the error is returned and the service stays registered, so
    ///   that a later `Stop` releases whatever was started.
    /// - `Stop`: stops the committee and removes it from the registry. Stopping a committee that is
    ///   not registered has no effect.
    /// - `Switch`: has no effect.
    ///
    /// Returns [`NodeError::UnknownCommittee`] if `action` is `Start` or `Switch` and no service is
    /// registered under `id`.
    pub fn notify(&self, id: CommitteeID, action: Action) -> Result<(), NodeError> {
        log::info!("Notify, committee {}, {:?}", id, action);

        if action == Action::Stop {
            let removed = self.services().remove(&id);
            match removed {
                Some(handle) => lock_service(&handle).stop(),
                None => log::debug!("Notify, committee {} is not registered", id),
            }
            return Ok(());
        }

        let handle = self.service(id)?;
        let mut service = lock_live(&handle, id)?;
        if action == Action::Start {
            if let Err(err) = service.start(&self.configuration, &self.node_info) {
                log::error!("committee {} failed to start: {}", id, err);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Replace the validator set of the committee named by `committee.id` with one built from
    /// `committee`.
    ///
    /// If the committee's consensus instance decides to halt under the new set, the service is stopped
    /// and removed from the registry.
    pub fn update_committee(&self, committee: &CommitteeInfo) -> Result<(), NodeError> {
        let id = committee
            .id
            .ok_or(NodeError::InvalidArgument("committee has no id"))?;
        log::info!("UpdateCommittee, {}", committee);

        let handle = self.service(id)?;
        let mut service = lock_live(&handle, id)?;

        if service.update_validators(committee)? == UpdateOutcome::Halt {
            log::info!("UpdateCommittee, committee {} halted, height {}", id, service.height());
            // Removed first, so that requests arriving while it stops find it gone.
            self.remove_if_same(id, &handle);
            service.stop();
        }
        Ok(())
    }

    /// Set the height after which the committee `id` winds down.
    pub fn set_committee_stop(&self, id: CommitteeID, end_height: BlockHeight) -> Result<(), NodeError> {
        log::info!("SetCommitteeStop, committee {}, end height {}", id, end_height);
        let handle = self.service(id)?;
        lock_live(&handle, id)?.set_end_height(end_height);
        Ok(())
    }

    /// Get the status of the committee `id` and of its successor `id + 1`.
    ///
    /// Both services are looked up under one acquisition of the registry lock. A half whose committee
    /// is not registered, or is stopped before it can be read, is `None`.
    pub fn get_committee_status(&self, id: CommitteeID) -> CommitteeStatus {
        let (now, next) = {
            let services = self.services();
            (services.get(&id).cloned(), services.get(&id.successor()).cloned())
        };
        let mut status = CommitteeStatus::default();

        if let Some(handle) = now {
            let service = lock_service(&handle);
            if !service.is_stopped() {
                status.committee_now = Some(service.snapshot());
                status.node_status = Some(service.node_status());
            }
        }
        if let Some(handle) = next {
            let service = lock_service(&handle);
            if !service.is_stopped() {
                status.committee_next = Some(service.snapshot());
            }
        }
        status
    }

    /// Get the IDs of the registered committees, in ascending order.
    pub fn committees(&self) -> Vec<CommitteeID> {
        let mut ids: Vec<CommitteeID> = self.services().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Get the self-description the node hands to its committees' transports.
    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    /// Stop every registered committee and empty the registry.
    pub fn stop_all(&self) {
        let drained: Vec<(CommitteeID, ServiceHandle<P>)> = self.services().drain().collect();
        for (id, handle) in drained {
            log::info!("stopping committee {}", id);
            lock_service(&handle).stop();
            log::info!("committee {} stopped", id);
        }
    }

    fn services(&self) -> MutexGuard<'_, HashMap<CommitteeID, ServiceHandle<P>>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the service registered under `id`. The registry lock is released on return.
    fn service(&self, id: CommitteeID) -> Result<ServiceHandle<P>, NodeError> {
        self.services()
            .get(&id)
            .cloned()
            .ok_or(NodeError::UnknownCommittee(id))
    }

    /// Remove the service registered under `id` if it is still `handle`.
    fn remove_if_same(&self, id: CommitteeID, handle: &ServiceHandle<P>) {
        let mut services = self.services();
        if matches!(services.get(&id), Some(registered) if Arc::ptr_eq(registered, handle)) {
            services.remove(&id);
        }
    }
}

fn lock_service<P: CommitteeProvider>(handle: &ServiceHandle<P>) -> MutexGuard<'_, CommitteeService<P>> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock the service behind `handle`, failing if it was stopped after it was looked up.
fn lock_live<P: CommitteeProvider>(
    handle: &ServiceHandle<P>,
    id: CommitteeID,
) -> Result<MutexGuard<'_, CommitteeService<P>>, NodeError> {
    let service = lock_service(handle);
    if service.is_stopped() {
        return Err(NodeError::UnknownCommittee(id));
    }
    Ok(service)
}

impl<P: CommitteeProvider> Drop for Node<P> {
    fn drop(&mut self) {
        self.stop_all()
    }
}
