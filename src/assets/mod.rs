//! Icon and font asset handling.

/// Raster and SVG icon decoding.
pub mod decode;
/// System font discovery.
pub mod fonts;
/// Background icon loading with a URL-keyed cache.
pub mod icons;
/// Prepared images and text layout.
pub mod store;
