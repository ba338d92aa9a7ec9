//! Recording the race into a video artifact.

/// Finished recordings and where they go.
pub mod artifact;
/// Export state machine: capture, encode, finalize.
pub mod pipeline;
