//! Recorded-clip path: catalog ranking, cached retrieval and compositing.

pub(crate) mod cache;
pub(crate) mod catalog;
pub(crate) mod compose;
pub(crate) mod fetch;
pub(crate) mod loader;
