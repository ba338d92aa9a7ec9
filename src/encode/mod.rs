//! Streaming video encoders.
//!
//! An [`session::EncoderBackend`] opens [`session::EncoderSession`]s that accept captured frames
//! and hand back encoded WebM chunks as they are produced.

/// `ffmpeg`-based encoder (WebM on stdout via the system `ffmpeg`).
pub mod ffmpeg;
/// Encoder traits, session configuration and the in-memory test encoder.
pub mod session;
