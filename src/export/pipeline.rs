use std::time::{Duration, Instant, SystemTime};

use crate::encode::session::{EncoderBackend, EncoderSession, SessionConfig, VideoCodec};
use crate::export::artifact::{Artifact, ArtifactDelivery};
use crate::foundation::core::Fps;
use crate::foundation::error::{DataraceError, DataraceResult};
use crate::playback::clock::{AnimationClock, ClockObserver, ClockPhase, ClockTransition};
use crate::render::surface::CaptureSource;

/// Delay between opening the encoder and starting the clock.
pub const PRE_ROLL: Duration = Duration::from_millis(100);

/// Frames per second captured during export.
pub const CAPTURE_FPS: Fps = Fps { num: 60, den: 1 };

/// Export pipeline state. `Preparing` and `Finalizing` are transient within one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportState {
    /// No export in progress.
    Idle,
    /// Checking capabilities and opening the encoder.
    Preparing,
    /// Capturing frames while the clock runs.
    Recording,
    /// Stopping the encoder and delivering the artifact.
    Finalizing,
}

/// Records the race into a single WebM artifact.
///
/// The pipeline owns the encoder session and the chunk buffer. It never drives the clock other
/// than `reset()` on entry and one `start()` after the pre-roll; completion reaches it through
/// [`ClockObserver`].
pub struct ExportPipeline {
    state: ExportState,
    encoder: Box<dyn EncoderBackend>,
    delivery: Box<dyn ArtifactDelivery>,
    session: Option<Box<dyn EncoderSession>>,
    chunks: Vec<Vec<u8>>,
    background_rgb: [u8; 3],
    pending_clock_start: Option<Instant>,
    next_capture: Option<Instant>,
    frames_captured: u64,
    artifacts_delivered: usize,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("state", &self.state)
            .field("buffered_chunks", &self.chunks.len())
            .field("frames_captured", &self.frames_captured)
            .finish_non_exhaustive()
    }
}

impl ExportPipeline {
    /// Idle pipeline using `encoder` and handing results to `delivery`.
    pub fn new(encoder: Box<dyn EncoderBackend>, delivery: Box<dyn ArtifactDelivery>) -> Self {
        Self {
            state: ExportState::Idle,
            encoder,
            delivery,
            session: None,
            chunks: Vec::new(),
            background_rgb: [0, 0, 0],
            pending_clock_start: None,
            next_capture: None,
            frames_captured: 0,
            artifacts_delivered: 0,
        }
    }

    /// Color transparent pixels are flattened onto before encoding.
    pub fn set_background(&mut self, rgb: [u8; 3]) {
        self.background_rgb = rgb;
    }

    /// Current state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// `true` unless idle.
    pub fn is_active(&self) -> bool {
        self.state != ExportState::Idle
    }

    /// Codec of the open session, if recording.
    pub fn codec(&self) -> Option<VideoCodec> {
        self.session.as_ref().map(|s| s.codec())
    }

    /// Frames pushed into the current (or last) session.
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Non-empty chunks buffered so far in the current session.
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total artifacts delivered by this pipeline.
    pub fn artifacts_delivered(&self) -> usize {
        self.artifacts_delivered
    }

    /// Begin an export. A no-op unless idle.
    ///
    /// Missing capture or encoder support is [`DataraceError::CapabilityUnavailable`] and leaves
    /// everything untouched. A session that cannot be opened with any codec is
    /// [`DataraceError::EncoderStart`].
    #[tracing::instrument(skip_all)]
    pub fn start(
        &mut self,
        surface: &dyn CaptureSource,
        clock: &mut AnimationClock,
        now: Instant,
    ) -> DataraceResult<()> {
        if self.state != ExportState::Idle {
            tracing::debug!(state = ?self.state, "export already in progress");
            return Ok(());
        }
        self.state = ExportState::Preparing;

        if !surface.supports_capture() {
            self.state = ExportState::Idle;
            return Err(DataraceError::capability(
                "drawing surface does not support stream capture",
            ));
        }
        if !self.encoder.is_available() {
            self.state = ExportState::Idle;
            return Err(DataraceError::capability("no video encoder is available"));
        }

        clock.reset();
        self.chunks.clear();
        self.frames_captured = 0;

        let canvas = surface.capture_canvas();
        let session = match self.open_session(canvas.width, canvas.height) {
            Ok(s) => s,
            Err(e) => {
                self.state = ExportState::Idle;
                return Err(e);
            }
        };
        tracing::info!(codec = ?session.codec(), "export recording");

        self.session = Some(session);
        self.pending_clock_start = Some(now + PRE_ROLL);
        self.next_capture = Some(now);
        self.state = ExportState::Recording;
        Ok(())
    }

    fn open_session(&mut self, width: u32, height: u32) -> DataraceResult<Box<dyn EncoderSession>> {
        let mut last_err = None;
        for codec in VideoCodec::FALLBACK_ORDER {
            if !self.encoder.supports_codec(codec) {
                continue;
            }
            let mut cfg = SessionConfig::new(width, height, codec);
            cfg.fps = CAPTURE_FPS;
            cfg.background_rgb = self.background_rgb;
            match self.encoder.start_session(&cfg) {
                Ok(s) => return Ok(s),
                Err(e) => {
                    tracing::warn!(?codec, error = %e, "encoder session failed to start");
                    last_err = Some(e);
                }
            }
        }
        Err(DataraceError::encoder_start(match last_err {
            Some(e) => format!("could not open an encoder session: {e}"),
            None => "encoder supports none of the WebM codecs".to_owned(),
        }))
    }

    /// Start the clock once the pre-roll has elapsed and collect encoder output.
    ///
    /// Returns the clock transition produced by the delayed start, if it fired.
    pub fn poll(&mut self, now: Instant, clock: &mut AnimationClock) -> Option<ClockTransition> {
        if self.state != ExportState::Recording {
            return None;
        }
        self.drain_chunks();
        match self.pending_clock_start {
            Some(at) if now >= at => {
                self.pending_clock_start = None;
                clock.start()
            }
            _ => None,
        }
    }

    /// Push the current surface pixels at the capture cadence. Frames are only taken when
    /// `now` has reached the next capture slot.
    ///
    /// A failed grab or push aborts the export and pauses `clock`, leaving it `Idle` at its
    /// current progress.
    pub fn capture(
        &mut self,
        now: Instant,
        surface: &dyn CaptureSource,
        clock: &mut AnimationClock,
    ) -> DataraceResult<()> {
        if self.state != ExportState::Recording {
            return Ok(());
        }
        let Some(due) = self.next_capture else {
            return Ok(());
        };
        if now < due {
            return Ok(());
        }

        let pushed = surface.grab_frame().and_then(|frame| match self.session.as_mut() {
            Some(s) => s.push_frame(&frame),
            None => Err(DataraceError::encode("no open encoder session")),
        });
        if let Err(e) = pushed {
            self.abort();
            clock.pause();
            return Err(e);
        }
        self.frames_captured += 1;

        let step = CAPTURE_FPS.frame_duration();
        let mut next = due + step;
        if next <= now {
            next = now + step;
        }
        self.next_capture = Some(next);
        self.drain_chunks();
        Ok(())
    }

    /// Finish a recording early. A no-op when nothing is recording.
    ///
    /// Playback keeps going after a successful stop. If finalizing fails, `clock` is paused.
    pub fn stop(&mut self, clock: &mut AnimationClock) -> DataraceResult<Option<Artifact>> {
        if self.state != ExportState::Recording {
            return Ok(None);
        }
        tracing::info!("export stopped manually");
        match self.finalize() {
            Ok(a) => Ok(Some(a)),
            Err(e) => {
                clock.pause();
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip_all, fields(frames = self.frames_captured))]
    fn finalize(&mut self) -> DataraceResult<Artifact> {
        self.state = ExportState::Finalizing;
        self.pending_clock_start = None;
        self.next_capture = None;
        self.drain_chunks();

        let result = self.finish_session().and_then(|()| {
            if self.chunks.is_empty() {
                return Err(DataraceError::encode("encoder produced no output"));
            }
            let artifact = Artifact::from_chunks(&self.chunks, SystemTime::now());
            self.delivery.deliver(&artifact)?;
            Ok(artifact)
        });

        self.chunks = Vec::new();
        self.state = ExportState::Idle;
        match &result {
            Ok(a) => {
                self.artifacts_delivered += 1;
                tracing::info!(file = %a.file_name, bytes = a.len(), "export finished");
            }
            Err(e) => tracing::warn!(error = %e, "export failed during finalize"),
        }
        result
    }

    fn finish_session(&mut self) -> DataraceResult<()> {
        let session = self
            .session
            .take()
            .ok_or_else(|| DataraceError::encode("no open encoder session"))?;
        for chunk in session.stop()? {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
        Ok(())
    }

    fn drain_chunks(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        while let Some(chunk) = session.try_recv_chunk() {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
    }

    fn abort(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.stop()
        {
            tracing::debug!(error = %e, "encoder stop during abort failed");
        }
        self.chunks = Vec::new();
        self.pending_clock_start = None;
        self.next_capture = None;
        self.state = ExportState::Idle;
        tracing::warn!("export aborted");
    }
}

impl ClockObserver for ExportPipeline {
    fn on_clock_transition(&mut self, transition: ClockTransition) -> DataraceResult<()> {
        if self.state == ExportState::Recording && transition.to == ClockPhase::Completed {
            self.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/pipeline.rs"]
mod tests;
