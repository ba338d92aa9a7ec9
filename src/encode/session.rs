use std::sync::{Arc, Mutex};

use crate::foundation::core::Fps;
use crate::foundation::error::{DataraceError, DataraceResult};
use crate::render::surface::FrameRGBA;

/// Video codec requested from an encoder backend, in fallback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// VP9 in WebM.
    Vp9,
    /// VP8 in WebM.
    Vp8,
    /// Whatever the backend picks for WebM.
    EncoderDefault,
}

impl VideoCodec {
    /// Codecs tried when opening a session, most preferred first.
    pub const FALLBACK_ORDER: [VideoCodec; 3] =
        [VideoCodec::Vp9, VideoCodec::Vp8, VideoCodec::EncoderDefault];
}

/// Media type of every artifact produced by an encoder session.
pub const WEBM_MEDIA_TYPE: &str = "video/webm";

/// Parameters for one encoder session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture rate.
    pub fps: Fps,
    /// Requested codec.
    pub codec: VideoCodec,
    /// Opaque color that transparent pixels are flattened onto.
    pub background_rgb: [u8; 3],
}

impl SessionConfig {
    /// 60 fps session for `width x height`.
    pub fn new(width: u32, height: u32, codec: VideoCodec) -> Self {
        Self {
            width,
            height,
            fps: Fps { num: 60, den: 1 },
            codec,
            background_rgb: [0, 0, 0],
        }
    }

    /// Check dimensions and rate.
    pub fn validate(&self) -> DataraceResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DataraceError::validation(
                "encoder width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(DataraceError::validation(
                "encoder width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(DataraceError::validation("encoder fps must be non-zero"));
        }
        Ok(())
    }
}

/// A video encoder that can open streaming sessions.
pub trait EncoderBackend: Send {
    /// `true` when the encoder can run at all in this environment.
    fn is_available(&self) -> bool;
    /// `true` when `codec` can be requested.
    fn supports_codec(&self, codec: VideoCodec) -> bool;
    /// Open a session. Failures are [`DataraceError::EncoderStart`].
    fn start_session(&mut self, cfg: &SessionConfig) -> DataraceResult<Box<dyn EncoderSession>>;
}

/// A running encoder. Frames go in; encoded chunks come out in stream order.
pub trait EncoderSession: Send {
    /// Codec this session actually encodes with.
    fn codec(&self) -> VideoCodec;
    /// Submit one frame.
    fn push_frame(&mut self, frame: &FrameRGBA) -> DataraceResult<()>;
    /// Next chunk produced so far, if any. Never blocks.
    fn try_recv_chunk(&mut self) -> Option<Vec<u8>>;
    /// Flush and close the session, returning every chunk not yet received.
    fn stop(self: Box<Self>) -> DataraceResult<Vec<Vec<u8>>>;
}

/// What an [`InMemoryEncoder`] has seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryEncoderStats {
    /// Sessions opened.
    pub sessions_started: usize,
    /// Sessions stopped.
    pub sessions_stopped: usize,
    /// Codec of the most recent session.
    pub last_codec: Option<VideoCodec>,
    /// Frames pushed across all sessions.
    pub frames: u64,
}

/// Encoder test double.
///
/// Each session emits a `WEBM` header chunk, one 8-byte chunk per frame (the frame's ordinal,
/// little endian) interleaved with empty chunks, and an `END` trailer on stop.
#[derive(Clone, Debug)]
pub struct InMemoryEncoder {
    available: bool,
    supported: Vec<VideoCodec>,
    fail_start: bool,
    stats: Arc<Mutex<InMemoryEncoderStats>>,
}

impl Default for InMemoryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEncoder {
    /// Available encoder supporting every codec.
    pub fn new() -> Self {
        Self {
            available: true,
            supported: VideoCodec::FALLBACK_ORDER.to_vec(),
            fail_start: false,
            stats: Arc::new(Mutex::new(InMemoryEncoderStats::default())),
        }
    }

    /// Report the encoder as missing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Restrict supported codecs.
    pub fn with_codecs(mut self, codecs: &[VideoCodec]) -> Self {
        self.supported = codecs.to_vec();
        self
    }

    /// Make every `start_session` fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Snapshot of what has happened so far. Shared between clones.
    pub fn stats(&self) -> InMemoryEncoderStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EncoderBackend for InMemoryEncoder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn supports_codec(&self, codec: VideoCodec) -> bool {
        self.available && self.supported.contains(&codec)
    }

    fn start_session(&mut self, cfg: &SessionConfig) -> DataraceResult<Box<dyn EncoderSession>> {
        cfg.validate()?;
        if self.fail_start {
            return Err(DataraceError::encoder_start(
                "in-memory encoder configured to fail",
            ));
        }
        if !self.supports_codec(cfg.codec) {
            return Err(DataraceError::encoder_start(format!(
                "codec {:?} not supported",
                cfg.codec
            )));
        }
        {
            let mut s = self
                .stats
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            s.sessions_started += 1;
            s.last_codec = Some(cfg.codec);
        }
        Ok(Box::new(InMemorySession {
            cfg: cfg.clone(),
            pending: vec![b"WEBM".to_vec()].into(),
            frames: 0,
            stats: self.stats.clone(),
        }))
    }
}

struct InMemorySession {
    cfg: SessionConfig,
    pending: std::collections::VecDeque<Vec<u8>>,
    frames: u64,
    stats: Arc<Mutex<InMemoryEncoderStats>>,
}

impl EncoderSession for InMemorySession {
    fn codec(&self) -> VideoCodec {
        self.cfg.codec
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> DataraceResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(DataraceError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        self.pending.push_back(self.frames.to_le_bytes().to_vec());
        self.pending.push_back(Vec::new());
        self.frames += 1;
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .frames += 1;
        Ok(())
    }

    fn try_recv_chunk(&mut self) -> Option<Vec<u8>> {
        self.pending.pop_front()
    }

    fn stop(self: Box<Self>) -> DataraceResult<Vec<Vec<u8>>> {
        let mut rest: Vec<Vec<u8>> = self.pending.into_iter().collect();
        rest.push(b"END".to_vec());
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .sessions_stopped += 1;
        Ok(rest)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/session.rs"]
mod tests;
