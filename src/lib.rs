/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Committee-lifecycle orchestration for nodes that take part in a sequence of rotating BFT committees.
//!
//! A committee-selection agent tells the local [`Node`](registry::Node) which committees exist, which
//! members they have, and where those members can be reached. For each committee, the node runs a
//! service that owns the committee's consensus handle, transport, address book and health manager, and
//! a connection driver that dials the committee's members once their endpoints are known.
//!
//! The consensus state machine, the transport and health tracking are not part of this crate. They are
//! provided by the library user through the traits in [`pluggables`].

pub mod config;

pub mod error;

pub mod events;

pub mod listen_profile;

pub mod logging;

pub mod node_table;

pub mod pluggables;

pub mod registry;

pub mod status;

pub mod types;

pub(crate) mod connection_driver;

pub(crate) mod event_bus;

pub(crate) mod service;

pub use event_bus::HandlerPtr;
