//! Playback timing.

/// Progress clock driven by explicit ticks.
pub mod clock;
