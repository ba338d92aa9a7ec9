use super::*;
use crate::encode::session::InMemoryEncoder;
use crate::export::artifact::InMemoryDelivery;
use crate::foundation::core::Canvas;
use crate::foundation::error::ErrorKind;
use crate::render::surface::{FrameRGBA, RasterSurface, SurfaceCaps};
use std::cell::Cell;

fn surface() -> RasterSurface {
    RasterSurface::new(Canvas::new(64, 36).unwrap()).unwrap()
}

fn pipeline(enc: InMemoryEncoder) -> (ExportPipeline, InMemoryDelivery) {
    let delivery = InMemoryDelivery::new();
    (
        ExportPipeline::new(Box::new(enc), Box::new(delivery.clone())),
        delivery,
    )
}

/// One cooperative step, in the same order the studio uses.
fn step(p: &mut ExportPipeline, clock: &mut AnimationClock, s: &dyn CaptureSource, now: Instant) {
    if let Some(t) = p.poll(now, clock) {
        p.on_clock_transition(t).unwrap();
    }
    let tr = clock.tick(now);
    p.capture(now, s, clock).unwrap();
    if let Some(t) = tr {
        p.on_clock_transition(t).unwrap();
    }
}

#[test]
fn missing_capture_is_capability_error_without_side_effects() {
    let s = RasterSurface::with_caps(
        Canvas::new(64, 36).unwrap(),
        SurfaceCaps {
            rounded_rects: true,
            capture: false,
        },
    )
    .unwrap();
    let enc = InMemoryEncoder::new();
    let (mut p, delivery) = pipeline(enc.clone());

    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(10));
    clock.start();
    clock.tick(t0);
    clock.tick(t0 + Duration::from_secs(4));
    clock.pause();

    let err = p.start(&s, &mut clock, t0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
    assert_eq!(p.state(), ExportState::Idle);
    assert!((clock.progress() - 0.4).abs() < 1e-12);
    assert_eq!(enc.stats().sessions_started, 0);
    assert!(delivery.artifacts().is_empty());
}

#[test]
fn missing_encoder_is_capability_error() {
    let (mut p, _) = pipeline(InMemoryEncoder::unavailable());
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    let err = p.start(&surface(), &mut clock, Instant::now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityUnavailable);
    assert_eq!(p.state(), ExportState::Idle);
}

#[test]
fn encoder_start_failure_rolls_back_to_idle() {
    let (mut p, _) = pipeline(InMemoryEncoder::new().failing_start());
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    let err = p.start(&surface(), &mut clock, Instant::now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderStart);
    assert_eq!(p.state(), ExportState::Idle);

    let (mut p, _) = pipeline(InMemoryEncoder::new().with_codecs(&[]));
    let err = p.start(&surface(), &mut clock, Instant::now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncoderStart);
}

#[test]
fn codec_fallback_picks_first_supported() {
    let enc = InMemoryEncoder::new().with_codecs(&[VideoCodec::Vp8, VideoCodec::EncoderDefault]);
    let (mut p, _) = pipeline(enc.clone());
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    p.start(&surface(), &mut clock, Instant::now()).unwrap();
    assert_eq!(p.state(), ExportState::Recording);
    assert_eq!(p.codec(), Some(VideoCodec::Vp8));

    let enc = InMemoryEncoder::new().with_codecs(&[VideoCodec::EncoderDefault]);
    let (mut p, _) = pipeline(enc);
    p.start(&surface(), &mut clock, Instant::now()).unwrap();
    assert_eq!(p.codec(), Some(VideoCodec::EncoderDefault));
}

#[test]
fn clock_starts_only_after_pre_roll() {
    let (mut p, _) = pipeline(InMemoryEncoder::new());
    let s = surface();
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    p.start(&s, &mut clock, t0).unwrap();

    assert!(p.poll(t0 + Duration::from_millis(99), &mut clock).is_none());
    assert_eq!(clock.phase(), ClockPhase::Idle);
    let tr = p.poll(t0 + PRE_ROLL, &mut clock).unwrap();
    assert_eq!((tr.from, tr.to, tr.progress), (ClockPhase::Idle, ClockPhase::Running, 0.0));
    assert!(p.poll(t0 + Duration::from_millis(200), &mut clock).is_none());
}

#[test]
fn two_second_export_finalizes_on_its_own_with_one_artifact() {
    let enc = InMemoryEncoder::new();
    let (mut p, delivery) = pipeline(enc.clone());
    let s = surface();
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(2));

    // Start from a non-zero position: export always records from the beginning.
    clock.start();
    clock.tick(t0);
    clock.tick(t0 + Duration::from_millis(700));
    clock.pause();

    p.start(&s, &mut clock, t0).unwrap();
    assert_eq!(clock.progress(), 0.0);

    let frame = CAPTURE_FPS.frame_duration();
    let mut now = t0;
    let mut finished_at = None;
    for _ in 0..1000 {
        step(&mut p, &mut clock, &s, now);
        if p.state() == ExportState::Idle {
            finished_at = Some(now);
            break;
        }
        now += frame;
    }

    let finished_at = finished_at.expect("export never finalized");
    let bound = PRE_ROLL + Duration::from_secs(2) + frame * 2;
    assert!(finished_at - t0 <= bound, "{:?} > {:?}", finished_at - t0, bound);
    assert!(finished_at - t0 >= PRE_ROLL + Duration::from_secs(2));
    assert_eq!(clock.phase(), ClockPhase::Completed);

    let artifacts = delivery.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(p.artifacts_delivered(), 1);
    let bytes = &artifacts[0].bytes;
    assert!(bytes.starts_with(b"WEBM"));
    assert!(bytes.ends_with(b"END"));
    // Header + one 8-byte chunk per frame + trailer; empty chunks are dropped.
    assert_eq!(bytes.len() as u64, 4 + 8 * p.frames_captured() + 3);
    assert!(p.frames_captured() >= 120);
    assert_eq!(enc.stats().sessions_stopped, 1);

    // Nothing more happens on later ticks.
    step(&mut p, &mut clock, &s, now + Duration::from_secs(1));
    assert_eq!(delivery.artifacts().len(), 1);
}

#[test]
fn stop_while_idle_is_a_no_op() {
    let (mut p, delivery) = pipeline(InMemoryEncoder::new());
    let mut clock = AnimationClock::new(Duration::from_secs(1));
    assert!(p.stop(&mut clock).unwrap().is_none());
    assert_eq!(clock.phase(), ClockPhase::Idle);
    assert_eq!(p.state(), ExportState::Idle);
    assert!(delivery.artifacts().is_empty());
}

#[test]
fn manual_stop_finalizes_and_start_while_recording_is_ignored() {
    let enc = InMemoryEncoder::new();
    let (mut p, delivery) = pipeline(enc.clone());
    let s = surface();
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(10));
    p.start(&s, &mut clock, t0).unwrap();
    p.start(&s, &mut clock, t0).unwrap();
    assert_eq!(enc.stats().sessions_started, 1);

    let mut now = t0;
    for _ in 0..30 {
        step(&mut p, &mut clock, &s, now);
        now += CAPTURE_FPS.frame_duration();
    }
    let artifact = p.stop(&mut clock).unwrap().unwrap();
    assert_eq!(p.state(), ExportState::Idle);
    assert_eq!(clock.phase(), ClockPhase::Running);
    assert_eq!(p.buffered_chunks(), 0);
    assert_eq!(delivery.artifacts(), vec![artifact]);

    // Clock completion after a manual stop does not produce a second artifact.
    p.on_clock_transition(ClockTransition {
        from: ClockPhase::Running,
        to: ClockPhase::Completed,
        progress: 1.0,
    })
    .unwrap();
    assert_eq!(delivery.artifacts().len(), 1);
}

struct FlakySurface {
    inner: RasterSurface,
    grabs_left: Cell<u32>,
}

impl CaptureSource for FlakySurface {
    fn capture_canvas(&self) -> Canvas {
        self.inner.capture_canvas()
    }

    fn supports_capture(&self) -> bool {
        true
    }

    fn grab_frame(&self) -> DataraceResult<FrameRGBA> {
        let left = self.grabs_left.get();
        if left == 0 {
            return Err(DataraceError::encode("capture track ended"));
        }
        self.grabs_left.set(left - 1);
        self.inner.grab_frame()
    }
}

#[test]
fn capture_failure_aborts_without_artifact() {
    let (mut p, delivery) = pipeline(InMemoryEncoder::new());
    let s = FlakySurface {
        inner: surface(),
        grabs_left: Cell::new(3),
    };
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    p.start(&s, &mut clock, t0).unwrap();

    let mut now = t0;
    let mut failed = false;
    for _ in 0..10 {
        if p.capture(now, &s, &mut clock).is_err() {
            failed = true;
            break;
        }
        now += CAPTURE_FPS.frame_duration();
    }
    assert!(failed);
    assert_eq!(p.state(), ExportState::Idle);
    assert_eq!(p.buffered_chunks(), 0);
    assert!(delivery.artifacts().is_empty());
}

#[test]
fn capture_failure_mid_race_leaves_clock_idle_at_its_progress() {
    let (mut p, delivery) = pipeline(InMemoryEncoder::new());
    let s = FlakySurface {
        inner: surface(),
        grabs_left: Cell::new(20),
    };
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(2));
    p.start(&s, &mut clock, t0).unwrap();

    let mut now = t0;
    let mut err = None;
    for _ in 0..40 {
        if let Some(t) = p.poll(now, &mut clock) {
            p.on_clock_transition(t).unwrap();
        }
        clock.tick(now);
        if let Err(e) = p.capture(now, &s, &mut clock) {
            err = Some(e);
            break;
        }
        now += CAPTURE_FPS.frame_duration();
    }

    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Encode));
    assert_eq!(p.state(), ExportState::Idle);
    assert_eq!(clock.phase(), ClockPhase::Idle);
    assert!(!clock.is_scheduled());
    let progress = clock.progress();
    assert!(progress > 0.0 && progress < 1.0, "progress = {progress}");

    clock.tick(now + Duration::from_secs(1));
    assert_eq!(clock.progress(), progress);
    assert!(delivery.artifacts().is_empty());
}

struct RejectingDelivery;

impl ArtifactDelivery for RejectingDelivery {
    fn deliver(&mut self, _artifact: &Artifact) -> DataraceResult<()> {
        Err(DataraceError::encode("disk full"))
    }
}

#[test]
fn failed_manual_stop_pauses_the_clock() {
    let mut p = ExportPipeline::new(Box::new(InMemoryEncoder::new()), Box::new(RejectingDelivery));
    let s = surface();
    let t0 = Instant::now();
    let mut clock = AnimationClock::new(Duration::from_secs(10));
    p.start(&s, &mut clock, t0).unwrap();

    let mut now = t0;
    for _ in 0..30 {
        step(&mut p, &mut clock, &s, now);
        now += CAPTURE_FPS.frame_duration();
    }
    assert_eq!(clock.phase(), ClockPhase::Running);

    let err = p.stop(&mut clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert_eq!(p.state(), ExportState::Idle);
    assert_eq!(p.buffered_chunks(), 0);
    assert_eq!(clock.phase(), ClockPhase::Idle);
}
