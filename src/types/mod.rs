//! Types that are used across multiple components of the committee layer.

pub mod committee;

pub mod data_types;

pub mod identity;

pub mod validators;
