pub(crate) mod logging;

pub(crate) mod provider;

pub(crate) mod fixtures;
