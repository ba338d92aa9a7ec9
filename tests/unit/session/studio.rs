use super::*;
use crate::assets::icons::{IconCache, IconLoader};
use crate::assets::store::PreparedImage;
use crate::encode::session::InMemoryEncoder;
use crate::export::artifact::InMemoryDelivery;
use crate::foundation::core::Canvas;
use crate::render::surface::SurfaceCaps;
use crate::scene::config::RenderConfigDef;
use crate::scene::sample::sample_dataset;

struct NoIcons;

impl IconLoader for NoIcons {
    fn load(&self, url: &str) -> DataraceResult<PreparedImage> {
        Err(DataraceError::validation(format!("no icons in tests: {url}")))
    }
}

struct FixedGenerator(DataraceResult<Dataset>);

impl DatasetGenerator for FixedGenerator {
    fn generate(&self, _topic: &str) -> DataraceResult<Dataset> {
        match &self.0 {
            Ok(ds) => Ok(ds.clone()),
            Err(e) => Err(DataraceError::generation(e.to_string())),
        }
    }
}

struct SlowGenerator;

impl DatasetGenerator for SlowGenerator {
    fn generate(&self, _topic: &str) -> DataraceResult<Dataset> {
        std::thread::sleep(Duration::from_millis(300));
        small_dataset()
    }
}

fn small_dataset() -> DataraceResult<Dataset> {
    Dataset::from_json_str(
        r##"{
          "title": "Two Horses",
          "entities": [
            {"id": "a", "label": "Alpha", "color": "#ff0000"},
            {"id": "b", "label": "Beta", "color": "#00ff00"}
          ],
          "timeline": [
            {"label": "Start", "values": {"a": 1, "b": 2}},
            {"label": "End", "values": {"a": 5, "b": 3}}
          ]
        }"##,
    )
}

fn config(secs: f64) -> RenderConfig {
    RenderConfigDef {
        duration_seconds: secs,
        show_icons: false,
        ..RenderConfigDef::default()
    }
    .validate()
    .unwrap()
}

fn studio_with(surface: RasterSurface, enc: InMemoryEncoder) -> (Studio, InMemoryDelivery) {
    let delivery = InMemoryDelivery::new();
    let export = ExportPipeline::new(Box::new(enc), Box::new(delivery.clone()));
    let renderer = RaceRenderer::new(Arc::new(IconCache::new(Arc::new(NoIcons))));
    let studio = Studio::new(sample_dataset().unwrap(), config(1.0), renderer, surface, export);
    (studio, delivery)
}

fn studio() -> (Studio, InMemoryDelivery) {
    studio_with(
        RasterSurface::new(Canvas::new(320, 180).unwrap()).unwrap(),
        InMemoryEncoder::new(),
    )
}

fn wait_generation(s: &mut Studio) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while s.is_generating() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
        s.tick(Instant::now());
    }
    assert!(!s.is_generating(), "generation did not finish");
}

#[test]
fn first_tick_draws_the_first_snapshot() {
    let (mut s, _) = studio();
    assert!(s.frame().is_empty());
    s.tick(Instant::now());
    assert_eq!(s.frame().display_label, "2012");
    assert_eq!(s.clock_phase(), ClockPhase::Idle);

    let bg = s.config().background();
    let px = s.surface().snapshot();
    assert_eq!(&px.data[0..3], &[bg.r, bg.g, bg.b]);
}

#[test]
fn toggle_play_runs_pauses_and_replays() {
    let (mut s, _) = studio();
    let t0 = Instant::now();
    s.toggle_play();
    s.tick(t0);
    s.tick(t0 + Duration::from_millis(500));
    assert_eq!(s.clock_phase(), ClockPhase::Running);
    assert!((s.progress() - 0.5).abs() < 1e-9);

    s.toggle_play();
    assert_eq!(s.clock_phase(), ClockPhase::Idle);
    s.tick(t0 + Duration::from_millis(900));
    assert!((s.progress() - 0.5).abs() < 1e-9);

    s.toggle_play();
    s.tick(t0 + Duration::from_secs(2));
    s.tick(t0 + Duration::from_secs(4));
    assert_eq!(s.clock_phase(), ClockPhase::Completed);
    assert_eq!(s.frame().display_label, "2022");

    s.toggle_play();
    assert_eq!(s.clock_phase(), ClockPhase::Running);
    assert_eq!(s.progress(), 0.0);

    s.reset();
    assert_eq!(s.clock_phase(), ClockPhase::Idle);
}

#[test]
fn new_dataset_resets_progress_on_next_tick() {
    let (mut s, _) = studio();
    let t0 = Instant::now();
    s.toggle_play();
    s.tick(t0);
    s.tick(t0 + Duration::from_millis(400));
    assert!(s.progress() > 0.0);

    s.set_dataset(small_dataset().unwrap());
    assert_eq!(s.dataset().title, "Most Popular Social Media Platforms (2012-2022)");
    s.tick(t0 + Duration::from_millis(410));
    assert_eq!(s.dataset().title, "Two Horses");
    assert_eq!(s.clock_phase(), ClockPhase::Idle);
    assert_eq!(s.progress(), 0.0);
    assert_eq!(s.frame().display_label, "Start");
}

#[test]
fn new_config_keeps_position_and_changes_duration() {
    let (mut s, _) = studio();
    let t0 = Instant::now();
    s.toggle_play();
    s.tick(t0);
    s.tick(t0 + Duration::from_millis(500));

    s.set_config(config(2.0));
    s.tick(t0 + Duration::from_millis(500));
    assert_eq!(s.config().duration(), Duration::from_secs(2));
    assert!((s.progress() - 0.5).abs() < 1e-9);

    s.tick(t0 + Duration::from_millis(1500));
    assert!((s.progress() - 1.0).abs() < 1e-9);
}

#[test]
fn export_records_once_and_locks_controls() {
    let enc = InMemoryEncoder::new();
    let (mut s, delivery) = studio_with(
        RasterSurface::new(Canvas::new(320, 180).unwrap()).unwrap(),
        enc.clone(),
    );
    let t0 = Instant::now();
    s.start_export(t0);
    assert!(s.is_exporting());
    assert_eq!(s.frame().display_label, "2012");

    s.toggle_play();
    s.reset();
    assert_eq!(s.export_state(), ExportState::Recording);

    let step = CAPTURE_FPS.frame_duration();
    let mut ticks = 0u32;
    while s.is_exporting() && ticks < 600 {
        s.tick(t0 + step * ticks);
        ticks += 1;
    }

    assert_eq!(s.export_state(), ExportState::Idle);
    assert_eq!(s.clock_phase(), ClockPhase::Completed);
    assert!(s.notifications().is_empty());
    let artifacts = delivery.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].file_name.ends_with(".webm"));

    let stats = enc.stats();
    assert_eq!(stats.sessions_started, 1);
    assert_eq!(stats.sessions_stopped, 1);
    assert!(stats.frames >= 60, "captured {} frames", stats.frames);
}

#[test]
fn export_stopped_early_still_delivers() {
    let (mut s, delivery) = studio();
    let t0 = Instant::now();
    s.start_export(t0);
    s.tick(t0);
    s.tick(t0 + Duration::from_millis(300));
    s.stop_export();
    assert!(!s.is_exporting());
    assert_eq!(delivery.artifacts().len(), 1);
}

#[test]
fn export_failures_become_notifications() {
    let surface = RasterSurface::with_caps(
        Canvas::new(320, 180).unwrap(),
        SurfaceCaps {
            rounded_rects: true,
            capture: false,
        },
    )
    .unwrap();
    let (mut s, _) = studio_with(surface, InMemoryEncoder::new());
    s.start_export(Instant::now());
    assert!(!s.is_exporting());
    let notes = s.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, ErrorKind::CapabilityUnavailable);
    assert!(s.notifications().is_empty());

    let (mut s, _) = studio_with(
        RasterSurface::new(Canvas::new(320, 180).unwrap()).unwrap(),
        InMemoryEncoder::unavailable(),
    );
    s.start_export(Instant::now());
    assert_eq!(s.notifications()[0].kind, ErrorKind::CapabilityUnavailable);
}

#[test]
fn successful_generation_replaces_dataset_and_pauses() {
    let (mut s, _) = studio();
    let t0 = Instant::now();
    s.toggle_play();
    s.tick(t0);
    s.tick(t0 + Duration::from_millis(200));

    s.request_generation("horses", Arc::new(FixedGenerator(small_dataset())));
    assert!(s.is_generating());
    wait_generation(&mut s);

    assert_eq!(s.dataset().title, "Two Horses");
    assert_eq!(s.clock_phase(), ClockPhase::Idle);
    assert_eq!(s.progress(), 0.0);
    assert!(s.notifications().is_empty());
}

#[test]
fn failed_generation_keeps_dataset() {
    let (mut s, _) = studio();
    s.request_generation(
        "nothing",
        Arc::new(FixedGenerator(Err(DataraceError::generation("model offline")))),
    );
    wait_generation(&mut s);

    assert_eq!(s.dataset().title, "Most Popular Social Media Platforms (2012-2022)");
    let notes = s.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, ErrorKind::Generation);
    assert!(notes[0].message.contains("model offline"));
}

#[test]
fn export_is_ignored_while_generating() {
    let (mut s, _) = studio();
    s.request_generation("slow", Arc::new(SlowGenerator));
    s.start_export(Instant::now());
    assert!(!s.is_exporting());
    assert!(s.notifications().is_empty());
    wait_generation(&mut s);
    assert_eq!(s.dataset().title, "Two Horses");
}

#[test]
fn wait_for_icons_settles_failed_loads() {
    let (mut s, _) = studio();
    assert!(s.wait_for_icons(Duration::from_millis(1)));

    let mut def = config(1.0).to_def();
    def.show_icons = true;
    s.set_config(def.validate().unwrap());
    s.tick(Instant::now());
    assert!(s.wait_for_icons(Duration::from_secs(5)));
}
