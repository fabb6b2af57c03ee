//! Stick-figure path: gesture definitions, keyframe interpolation and per-gloss generation.

pub(crate) mod generate;
pub(crate) mod interp;
pub(crate) mod library;
pub(crate) mod model;
