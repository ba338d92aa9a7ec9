use super::*;
use crate::assets::icons::IconLoader;
use crate::interp::frame::InterpolatedEntity;
use crate::render::surface::SurfaceCaps;
use crate::scene::model::{Entity, Snapshot, Timeline};
use std::time::{Duration, Instant};

fn entity(id: &str, value: f64, rank: usize, icon: Option<&str>) -> InterpolatedEntity {
    InterpolatedEntity {
        id: id.to_owned(),
        label: id.to_uppercase(),
        color: Color::rgb(200, 10, 10),
        icon: icon.map(str::to_owned),
        value,
        rank,
    }
}

fn frame(values: &[f64]) -> InterpolatedFrame {
    InterpolatedFrame {
        display_label: "2020".to_owned(),
        entities: values
            .iter()
            .enumerate()
            .map(|(i, v)| entity(&format!("e{i}"), *v, i, None))
            .collect(),
    }
}

fn config(json: &str) -> RenderConfig {
    RenderConfig::from_json_str(json).unwrap()
}

fn pixel(surface: &RasterSurface, x: u32, y: u32) -> [u8; 4] {
    let f = surface.snapshot();
    let i = ((y * f.width + x) * 4) as usize;
    [f.data[i], f.data[i + 1], f.data[i + 2], f.data[i + 3]]
}

struct RedIcons;

impl IconLoader for RedIcons {
    fn load(&self, _url: &str) -> DataraceResult<PreparedImage> {
        PreparedImage::solid(8, 8, [255, 0, 0, 255])
    }
}

fn tiny_dataset() -> Dataset {
    let entities = vec![
        Entity {
            id: "a".to_owned(),
            label: "A".to_owned(),
            color: Color::rgb(0, 200, 0),
            icon: Some("a.png".to_owned()),
        },
        Entity {
            id: "b".to_owned(),
            label: "B".to_owned(),
            color: Color::rgb(0, 0, 200),
            icon: None,
        },
    ];
    let timeline = Timeline::new(vec![
        Snapshot::new("2000", [("a", 100.0), ("b", 50.0)]),
        Snapshot::new("2001", [("a", 200.0), ("b", 100.0)]),
    ])
    .unwrap();
    Dataset::new("T", "S", "src", entities, timeline).unwrap()
}

#[test]
fn leader_spans_max_bar_width_and_others_scale() {
    let bars = layout_bars(&frame(&[2000.0, 1000.0]), &RenderConfig::default(), Canvas::HD);
    assert_eq!(bars.len(), 2);
    let max_w = 1920.0 - 2.0 * PADDING - VALUE_AREA;
    assert_eq!(bars[0].rect, Rect::new(60.0, 200.0, 60.0 + max_w, 250.0));
    assert_eq!(bars[1].length, max_w / 2.0);
    assert_eq!(bars[1].rect.y0, 270.0);
    assert_eq!(bars[0].value_text, "2,000");
    assert_eq!(bars[0].value_origin, Point::new(60.0 + max_w + 30.0, 235.0));
}

#[test]
fn top_n_and_chart_bottom_limit_bars() {
    let values: Vec<f64> = (0..15).map(|i| 1000.0 - i as f64).collect();
    let bars = layout_bars(&frame(&values), &config(r#"{"topN":20}"#), Canvas::HD);
    // y = 200 + rank*70 must stay <= 980.
    assert_eq!(bars.len(), 12);
    assert_eq!(bars.last().unwrap().rank, 11);

    let bars = layout_bars(&frame(&values), &config(r#"{"topN":3}"#), Canvas::HD);
    assert_eq!(bars.iter().map(|b| b.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn tiny_bars_keep_min_width_and_drop_label() {
    let max_w = 1920.0 - 2.0 * PADDING - VALUE_AREA;
    let tiny = 20.0 / max_w * 1000.0;
    let bars = layout_bars(&frame(&[1000.0, tiny, 0.0]), &RenderConfig::default(), Canvas::HD);

    assert!(bars[0].label.is_some());
    assert!((bars[1].length - 20.0).abs() < 1e-9);
    assert!(bars[1].label.is_none());
    assert_eq!(bars[2].rect.width(), MIN_BAR_WIDTH);
    assert_eq!(bars[2].value_text, "0");
    assert_eq!(bars[2].value_origin.x, PADDING + 30.0);
}

#[test]
fn zero_leader_does_not_divide_by_zero() {
    let bars = layout_bars(&frame(&[0.0, 0.0]), &RenderConfig::default(), Canvas::HD);
    assert!(bars.iter().all(|b| b.length == 0.0 && b.rect.width() == MIN_BAR_WIDTH));
}

#[test]
fn icon_placement_follows_bar_end() {
    let mut f = frame(&[100.0]);
    f.entities[0].icon = Some("x.svg".to_owned());
    let bars = layout_bars(&f, &RenderConfig::default(), Canvas::HD);
    let icon = bars[0].icon.as_ref().unwrap();
    assert_eq!(icon.size, 40.0);
    assert_eq!(icon.halo_radius, 24.0);
    assert_eq!(icon.center, Point::new(bars[0].rect.x1, 225.0));

    let bars = layout_bars(&f, &config(r#"{"showIcons":false}"#), Canvas::HD);
    assert!(bars[0].icon.is_none());
}

#[test]
fn format_value_groups_thousands() {
    assert_eq!(format_value(2910.4), "2,910");
    assert_eq!(format_value(999.5), "1,000");
    assert_eq!(format_value(1_234_567.0), "1,234,567");
    assert_eq!(format_value(12.0), "12");
    assert_eq!(format_value(-4321.0), "-4,321");
    assert_eq!(format_value(f64::NAN), "0");
}

#[test]
fn render_without_fonts_draws_background_and_bars() {
    let icons = Arc::new(IconCache::new(Arc::new(RedIcons)));
    let mut r = RaceRenderer::new(icons);
    assert!(!r.has_text());

    let mut surface = RasterSurface::new(Canvas::HD).unwrap();
    let ds = tiny_dataset();
    let cfg = config(r##"{"showIcons":false,"backgroundColor":"#102030"}"##);
    let frame = r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    assert_eq!(frame.display_label, "2000");

    assert_eq!(pixel(&surface, 5, 5), [0x10, 0x20, 0x30, 255]);
    assert_eq!(pixel(&surface, 100, 225), [0, 200, 0, 255]);
    assert_eq!(pixel(&surface, 100, 295), [0, 0, 200, 255]);
    // Gap between the bars stays background.
    assert_eq!(pixel(&surface, 100, 260), [0x10, 0x20, 0x30, 255]);
}

#[test]
fn rounded_corners_depend_on_surface_caps() {
    let ds = tiny_dataset();
    let cfg = config(r#"{"showIcons":false}"#);
    let bar = [0, 200, 0, 255];

    let mut r = RaceRenderer::new(Arc::new(IconCache::new(Arc::new(RedIcons))));
    let mut rounded = RasterSurface::new(Canvas::HD).unwrap();
    r.render_progress(&mut rounded, &ds, &cfg, 0.0).unwrap();
    assert_ne!(pixel(&rounded, 1609, 200), bar);
    assert_eq!(pixel(&rounded, 1609, 225), bar);

    let mut plain = RasterSurface::with_caps(
        Canvas::HD,
        SurfaceCaps {
            rounded_rects: false,
            capture: true,
        },
    )
    .unwrap();
    r.render_progress(&mut plain, &ds, &cfg, 0.0).unwrap();
    assert_eq!(pixel(&plain, 1609, 200), bar);
}

#[test]
fn icons_appear_once_loaded() {
    let icons = Arc::new(IconCache::new(Arc::new(RedIcons)));
    let mut r = RaceRenderer::new(icons.clone());
    let mut surface = RasterSurface::new(Canvas::HD).unwrap();
    let ds = tiny_dataset();
    let cfg = RenderConfig::default();

    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    assert_eq!(icons.len(), 1);

    let handle = icons.request("a.png");
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.ready_image().is_none() {
        assert!(Instant::now() < deadline, "icon never loaded");
        std::thread::sleep(Duration::from_millis(2));
    }

    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    // Icon centre at the leader's bar end, white halo just outside the icon circle.
    assert_eq!(pixel(&surface, 1610, 225), [255, 0, 0, 255]);
    assert_eq!(pixel(&surface, 1610 + 22, 225), [255, 255, 255, 255]);
}

#[test]
fn text_renders_with_system_font_if_present() {
    let Some(files) = crate::assets::fonts::FontFiles::discover() else {
        return;
    };
    let fonts = files.load().unwrap();
    let mut r = RaceRenderer::new(Arc::new(IconCache::new(Arc::new(RedIcons))))
        .with_font_bytes(fonts.regular, fonts.bold)
        .unwrap();
    assert!(r.has_text());

    let mut surface = RasterSurface::new(Canvas::HD).unwrap();
    let ds = tiny_dataset();
    let cfg = config(r##"{"showIcons":false,"backgroundColor":"#000000","textColor":"#ffffff"}"##);
    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();

    // Some title pixels in the title band are lit.
    let f = surface.snapshot();
    let lit = (30..90u32)
        .flat_map(|y| (60..200u32).map(move |x| (x, y)))
        .filter(|&(x, y)| f.data[((y * f.width + x) * 4) as usize] > 128)
        .count();
    assert!(lit > 0);
}

fn renderer_with_optional_fonts() -> RaceRenderer {
    let r = RaceRenderer::new(Arc::new(IconCache::new(Arc::new(RedIcons))));
    match crate::assets::fonts::FontFiles::discover() {
        Some(files) => {
            let fonts = files.load().unwrap();
            r.with_font_bytes(fonts.regular, fonts.bold).unwrap()
        }
        None => r,
    }
}

#[test]
fn redrawing_the_same_frame_is_pixel_identical() {
    let mut r = renderer_with_optional_fonts();
    let mut surface = RasterSurface::new(Canvas::HD).unwrap();
    let ds = tiny_dataset();
    let cfg = config(r#"{"showIcons":false}"#);

    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    let first = surface.snapshot().data;

    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    assert!(surface.snapshot().data == first, "back-to-back redraw differs");

    r.render_progress(&mut surface, &ds, &cfg, 1.0).unwrap();
    assert!(surface.snapshot().data != first);

    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    assert!(surface.snapshot().data == first, "redraw after another frame differs");
}

#[test]
fn bars_are_drawn_over_the_watermark() {
    let Some(files) = crate::assets::fonts::FontFiles::discover() else {
        return;
    };
    let fonts = files.load().unwrap();
    let mut r = RaceRenderer::new(Arc::new(IconCache::new(Arc::new(RedIcons))))
        .with_font_bytes(fonts.regular, fonts.bold)
        .unwrap();

    let bar = Color::rgb(0, 0, 200);
    let entities: Vec<Entity> = (0..12)
        .map(|i| Entity {
            id: format!("e{i}"),
            label: format!("E{i}"),
            color: bar,
            icon: None,
        })
        .collect();
    let values: Vec<(String, f64)> = (0..12).map(|i| (format!("e{i}"), 100.0)).collect();
    let timeline = Timeline::new(vec![
        Snapshot::new("2000", values.clone()),
        Snapshot::new("2001", values),
    ])
    .unwrap();
    let ds = Dataset::new("T", "S", "src", entities, timeline).unwrap();
    let cfg = config(
        r##"{"topN":12,"showIcons":false,"backgroundColor":"#000000","textColor":"#ffffff"}"##,
    );

    let mut surface = RasterSurface::new(Canvas::HD).unwrap();
    r.render_progress(&mut surface, &ds, &cfg, 0.0).unwrap();
    let f = surface.snapshot();
    let px = |x: u32, y: u32| {
        let i = ((y * f.width + x) * 4) as usize;
        [f.data[i], f.data[i + 1], f.data[i + 2], f.data[i + 3]]
    };

    // Ranks 9..=11 sit inside the watermark's band above the bottom-right anchor.
    let mut watermark_in_gaps = 0;
    for rank in 9..=11u32 {
        let y0 = 200 + rank * 70;
        for x in (1100..1590u32).step_by(3) {
            for y in (y0 + 5)..(y0 + 45) {
                assert_eq!(px(x, y), [0, 0, 200, 255], "bar pixel ({x}, {y}) was tinted");
            }
            if rank < 11 {
                watermark_in_gaps += ((y0 + 52)..(y0 + 68))
                    .filter(|&y| px(x, y) != [0, 0, 0, 255])
                    .count();
            }
        }
    }
    assert!(watermark_in_gaps > 0, "watermark not visible between bars");
}
