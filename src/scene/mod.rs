//! Dataset and configuration boundary types.
//!
//! Everything here is validated on construction; the interpolator and renderer consume these
//! types without re-checking them.

/// Validated colors.
pub mod color;
/// Render configuration documents.
pub mod config;
/// Dataset documents.
pub mod dataset;
/// Entities, snapshots and timelines.
pub mod model;
/// Built-in sample data.
pub mod sample;
