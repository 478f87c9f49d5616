/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Parameters of the local node that are shared by all of its committees.
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(signing_key)
//!     .chain_id(ChainID::new(100))
//!     .moniker("validator-3".to_string())
//!     .listen_address_1("0.0.0.0:30310".parse().unwrap())
//!     .listen_address_2("0.0.0.0:30311".parse().unwrap())
//!     .log_events(true)
//!     .build()
//! ```
//!
//! ## Log Events
//!
//! The committee layer logs using the [log](https://docs.rs/log/latest/log/) crate. If `log_events` is
//! set, every [committee event](crate::events) is also printed by a default handler. To get these
//! messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).

use std::net::SocketAddr;

use ed25519_dalek::{SigningKey, VerifyingKey};
use typed_builder::TypedBuilder;

use crate::types::{
    data_types::ChainID,
    identity::{peer_id_of, Address, PeerID},
};

/// Stores the user-defined parameters of the local node.
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.chain_id(...)`
    - `.moniker(...)`
    - `.listen_address_1(...)`
    - `.listen_address_2(...)`
    - `.log_events(...)`

    Optional:
    - `.external_address(...)`
    - `.private_peer_ids(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the node's signing key, from which its identity is derived. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Set the chain ID of the blockchain. Required."))]
    pub chain_id: ChainID,
    #[builder(setter(doc = "Set the human-readable name of the node. Required."))]
    pub moniker: String,
    #[builder(setter(doc = "Set the listen address used by even-numbered committees. Required."))]
    pub listen_address_1: SocketAddr,
    #[builder(setter(doc = "Set the listen address used by odd-numbered committees. Required."))]
    pub listen_address_2: SocketAddr,
    #[builder(default, setter(strip_option, doc = "Set the address advertised to peers, if it differs from the listen address. Optional."))]
    pub external_address: Option<SocketAddr>,
    #[builder(default, setter(doc = "Set the identities of peers that must never be gossiped to others. Optional."))]
    pub private_peer_ids: Vec<PeerID>,
    #[builder(setter(doc = "Enable logging of committee events? Required."))]
    pub log_events: bool,
}

impl Configuration {
    /// Get the public key of the local node.
    pub fn public_key(&self) -> VerifyingKey {
        self.me.verifying_key()
    }

    /// Get the address of the local node.
    pub fn address(&self) -> Address {
        Address::of(&self.public_key())
    }

    /// Get the identity of the local node.
    pub fn peer_id(&self) -> PeerID {
        peer_id_of(&self.public_key())
    }
}
