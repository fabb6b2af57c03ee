//! Configuration and the public entry point tying both output paths together.

pub(crate) mod config;
pub(crate) mod facade;
