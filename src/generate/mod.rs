//! Dataset generation collaborators.

/// Generator trait and the external-command generator.
pub mod command;
