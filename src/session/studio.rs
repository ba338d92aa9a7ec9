use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::time::{Duration, Instant};

use crate::export::pipeline::{CAPTURE_FPS, ExportPipeline, ExportState};
use crate::foundation::error::{DataraceError, DataraceResult, ErrorKind};
use crate::generate::command::DatasetGenerator;
use crate::interp::frame::InterpolatedFrame;
use crate::playback::clock::{AnimationClock, ClockObserver, ClockPhase, ClockTransition};
use crate::render::chart::RaceRenderer;
use crate::render::surface::RasterSurface;
use crate::scene::config::RenderConfig;
use crate::scene::dataset::Dataset;

/// A user-visible, non-fatal notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl Notification {
    fn from_error(e: &DataraceError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

struct GenerationTask {
    topic: String,
    result: Receiver<DataraceResult<Dataset>>,
}

/// Interactive race session: dataset, config, renderer, surface, clock and exporter behind a
/// cooperative `tick`.
///
/// Mutations (`set_dataset`, `set_config`, finished generations) are committed at the start of
/// the next tick. Failures never escape as errors; they are queued as [`Notification`]s.
pub struct Studio {
    dataset: Dataset,
    config: RenderConfig,
    pending_dataset: Option<Dataset>,
    pending_config: Option<RenderConfig>,
    renderer: RaceRenderer,
    surface: RasterSurface,
    clock: AnimationClock,
    export: ExportPipeline,
    generation: Option<GenerationTask>,
    notifications: Vec<Notification>,
    frame: InterpolatedFrame,
    drawn_progress: Option<f64>,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("title", &self.dataset.title)
            .field("clock", &self.clock.state())
            .field("export", &self.export.state())
            .field("generating", &self.is_generating())
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Assemble a session. Nothing is drawn until the first tick.
    pub fn new(
        dataset: Dataset,
        config: RenderConfig,
        renderer: RaceRenderer,
        surface: RasterSurface,
        mut export: ExportPipeline,
    ) -> Self {
        let bg = config.background();
        export.set_background([bg.r, bg.g, bg.b]);
        Self {
            clock: AnimationClock::new(config.duration()),
            dataset,
            config,
            pending_dataset: None,
            pending_config: None,
            renderer,
            surface,
            export,
            generation: None,
            notifications: Vec::new(),
            frame: InterpolatedFrame::default(),
            drawn_progress: None,
        }
    }

    /// Committed dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Committed configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Drawing surface (last drawn frame).
    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    /// Frame drawn by the last redraw.
    pub fn frame(&self) -> &InterpolatedFrame {
        &self.frame
    }

    /// Playback progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.clock.progress()
    }

    /// Playback phase.
    pub fn clock_phase(&self) -> ClockPhase {
        self.clock.phase()
    }

    /// Exporter state.
    pub fn export_state(&self) -> ExportState {
        self.export.state()
    }

    /// `true` while an export is running.
    pub fn is_exporting(&self) -> bool {
        self.export.is_active()
    }

    /// `true` while a generation request is in flight.
    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    /// Drain queued notifications.
    pub fn notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Play, pause, or replay after completion. Ignored while exporting.
    pub fn toggle_play(&mut self) {
        if self.is_exporting() {
            tracing::debug!("toggle_play ignored while exporting");
            return;
        }
        let t = match self.clock.phase() {
            ClockPhase::Running => self.clock.pause(),
            ClockPhase::Idle | ClockPhase::Completed => self.clock.start(),
        };
        self.forward(t);
    }

    /// Back to the start, paused. Ignored while exporting.
    pub fn reset(&mut self) {
        if self.is_exporting() {
            tracing::debug!("reset ignored while exporting");
            return;
        }
        let t = self.clock.reset();
        self.forward(t);
    }

    /// Replace the dataset at the next tick. Progress resets to 0.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.pending_dataset = Some(dataset);
    }

    /// Replace the configuration at the next tick.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.pending_config = Some(config);
    }

    /// Start recording. Not allowed while a generation request is in flight.
    pub fn start_export(&mut self, now: Instant) {
        if let Err(e) = self.try_start_export(now) {
            self.notify(&e);
        }
    }

    fn try_start_export(&mut self, now: Instant) -> DataraceResult<()> {
        if self.is_generating() {
            tracing::debug!("export ignored while generating");
            return Ok(());
        }
        self.commit_pending();
        self.export.start(&self.surface, &mut self.clock, now)?;
        if self.export.is_active() {
            // The first captured frame must already show progress 0.
            self.redraw();
        }
        Ok(())
    }

    /// Finish a recording early. A no-op when not exporting.
    pub fn stop_export(&mut self) {
        if let Err(e) = self.export.stop(&mut self.clock) {
            self.notify(&e);
        }
    }

    /// Ask `generator` for a new dataset about `topic`, off the tick thread. Ignored while a
    /// request is already in flight or an export is running.
    pub fn request_generation(
        &mut self,
        topic: impl Into<String>,
        generator: Arc<dyn DatasetGenerator>,
    ) {
        if self.is_generating() || self.is_exporting() {
            tracing::debug!("generation request ignored");
            return;
        }
        let topic = topic.into();
        let (tx, rx) = channel();
        let thread_topic = topic.clone();
        let spawned = std::thread::Builder::new()
            .name("datarace-generate".to_owned())
            .spawn(move || {
                let _ = tx.send(generator.generate(&thread_topic));
            });
        match spawned {
            Ok(_) => {
                tracing::info!(%topic, "generation requested");
                self.generation = Some(GenerationTask { topic, result: rx });
            }
            Err(e) => self.notify(&DataraceError::generation(format!(
                "failed to start generation: {e}"
            ))),
        }
    }

    /// One cooperative step: commit pending changes, run the exporter and clock, redraw when
    /// something changed, capture, then deliver clock transitions to the exporter.
    pub fn tick(&mut self, now: Instant) {
        self.poll_generation();
        self.commit_pending();

        let started = self.export.poll(now, &mut self.clock);
        self.forward(started);

        let transition = self.clock.tick(now);

        if self.drawn_progress != Some(self.clock.progress()) {
            self.redraw();
        }

        if let Err(e) = self.export.capture(now, &self.surface, &mut self.clock) {
            self.notify(&e);
        }
        self.forward(transition);
    }

    /// Record one full export in real time, blocking the calling thread.
    ///
    /// Returns the number of frames captured. Unlike [`Studio::start_export`], failures are
    /// returned instead of queued.
    pub fn run_export_blocking(&mut self) -> DataraceResult<u64> {
        let delivered_before = self.export.artifacts_delivered();
        self.try_start_export(Instant::now())?;
        if !self.export.is_active() {
            return Err(DataraceError::encode("export did not start"));
        }

        let step = CAPTURE_FPS.frame_duration();
        let mut next = Instant::now();
        while self.export.is_active() {
            self.tick(Instant::now());
            next += step;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                next = now;
            }
        }

        if self.export.artifacts_delivered() == delivered_before {
            let reason = self
                .notifications
                .last()
                .map(|n| n.message.clone())
                .unwrap_or_else(|| "no artifact was produced".to_owned());
            return Err(DataraceError::encode(reason));
        }
        Ok(self.export.frames_captured())
    }

    /// Wait (up to `timeout`) for all icons referenced by the committed dataset to settle.
    pub fn wait_for_icons(&self, timeout: Duration) -> bool {
        if !self.config.show_icons() {
            return true;
        }
        let urls = self.dataset.entities.iter().filter_map(|e| e.icon.as_deref());
        self.renderer.icons().preload(urls, timeout)
    }

    fn poll_generation(&mut self) {
        let Some(task) = self.generation.as_ref() else {
            return;
        };
        let outcome = match task.result.try_recv() {
            Ok(r) => r,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(DataraceError::generation(format!(
                "generator for '{}' stopped without a result",
                task.topic
            ))),
        };
        self.generation = None;

        match outcome {
            Ok(ds) => {
                let t = self.clock.pause();
                self.forward(t);
                self.pending_dataset = Some(ds);
            }
            Err(e) => {
                let e = match e {
                    DataraceError::Generation(_) => e,
                    other => DataraceError::generation(other.to_string()),
                };
                self.notify(&e);
            }
        }
    }

    fn commit_pending(&mut self) {
        if let Some(cfg) = self.pending_config.take() {
            self.clock.set_duration(cfg.duration());
            let bg = cfg.background();
            self.export.set_background([bg.r, bg.g, bg.b]);
            self.config = cfg;
            self.drawn_progress = None;
        }
        if let Some(ds) = self.pending_dataset.take() {
            tracing::info!(title = %ds.title, "dataset replaced");
            self.dataset = ds;
            if !self.is_exporting() {
                let t = self.clock.reset();
                self.forward(t);
            }
            self.drawn_progress = None;
        }
    }

    fn redraw(&mut self) {
        let progress = self.clock.progress();
        match self
            .renderer
            .render_progress(&mut self.surface, &self.dataset, &self.config, progress)
        {
            Ok(frame) => self.frame = frame,
            Err(e) => tracing::warn!(error = %e, "redraw failed"),
        }
        self.drawn_progress = Some(progress);
    }

    fn forward(&mut self, transition: Option<ClockTransition>) {
        let Some(t) = transition else {
            return;
        };
        if let Err(e) = self.export.on_clock_transition(t) {
            self.notify(&e);
        }
    }

    fn notify(&mut self, e: &DataraceError) {
        tracing::warn!(kind = ?e.kind(), error = %e, "notification");
        self.notifications.push(Notification::from_error(e));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/studio.rs"]
mod tests;
