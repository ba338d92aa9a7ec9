//! Timeline interpolation: progress in `[0, 1]` to ranked, continuous entity values.

/// Interpolated frames and the interpolation function.
pub mod frame;
