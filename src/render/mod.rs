//! CPU drawing of race frames.

/// Bar layout and the race renderer.
pub mod chart;
/// Raster drawing surface and frame capture.
pub mod surface;
