/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that store information about the validator set of a committee.

use std::{collections::HashMap, slice};

use ed25519_dalek::VerifyingKey;

use crate::error::ConstructionError;

use super::{
    committee::CommitteeInfo,
    data_types::Power,
    identity::Address,
};

/// Voting power given to every member of a committee.
pub const MEMBER_POWER: Power = Power::new(1);

/// A member of a validator set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validator {
    pub public_key: VerifyingKey,
    pub address: Address,
    pub power: Power,
}

impl Validator {
    /// Create a validator with `power`, deriving its address from `public_key`.
    pub fn new(public_key: VerifyingKey, power: Power) -> Self {
        Self {
            public_key,
            address: Address::of(&public_key),
            power,
        }
    }
}

/// Stores the identities of validators and their voting powers.
///
/// ## Ordering of validators
///
/// `ValidatorSet` keeps validators in the order they were [`put`](Self::put), which for a set built
/// with [`from_committee`](Self::from_committee) is the order of the committee's member list.
///
/// ## Replacement
///
/// A committee's validator set is never patched. When the agent supplies a new descriptor, a new set is
/// built with `from_committee` and swapped in wholesale.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    positions: HashMap<Address, usize>,
}

impl ValidatorSet {
    /// Create an empty validator set.
    pub fn new() -> ValidatorSet {
        Self {
            validators: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Build the validator set of a committee: one validator with power [`MEMBER_POWER`] for every
    /// member in `committee.members`.
    pub fn from_committee(committee: &CommitteeInfo) -> Result<ValidatorSet, ConstructionError> {
        if committee.id.is_none() {
            return Err(ConstructionError::MissingCommitteeID);
        }
        if committee.members.is_empty() {
            return Err(ConstructionError::EmptyMembers);
        }

        let mut validator_set = ValidatorSet::new();
        for member in &committee.members {
            validator_set.put(&member.public_key, MEMBER_POWER);
        }
        Ok(validator_set)
    }

    /// Put a `validator` with the specified `power` at the end of the validator set.
    ///
    /// If `validator` already exists in the validator set, this function updates its power instead.
    pub fn put(&mut self, validator: &VerifyingKey, power: Power) {
        let address = Address::of(validator);
        match self.positions.get(&address) {
            Some(pos) => self.validators[*pos].power = power,
            None => {
                self.positions.insert(address, self.validators.len());
                self.validators.push(Validator::new(*validator, power));
            }
        }
    }

    /// Check whether the validator set contains a validator with `address`.
    pub fn has_address(&self, address: &Address) -> bool {
        self.positions.contains_key(address)
    }

    /// Get an iterator through the validators in [order](Self#ordering-of-validators).
    pub fn validators(&self) -> slice::Iter<Validator> {
        self.validators.iter()
    }

    /// Get the number of validators currently in the validator set.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check whether the validator set is empty (i.e., `self.len() == 0`).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
