use std::collections::HashMap;
use std::sync::Arc;

use kurbo::{Circle, Ellipse, RoundedRect, RoundedRectRadii, Shape as _};

use crate::assets::icons::IconCache;
use crate::assets::store::{FontFace, PreparedImage, TextBrushRgba8, TextLayoutEngine};
use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect};
use crate::foundation::error::{DataraceError, DataraceResult};
use crate::interp::frame::{InterpolatedFrame, interpolate};
use crate::render::surface::RasterSurface;
use crate::scene::color::Color;
use crate::scene::config::RenderConfig;
use crate::scene::dataset::Dataset;

/// Left/right page padding.
pub const PADDING: f64 = 60.0;
/// Y of the first bar.
pub const CHART_TOP: f64 = 200.0;
/// Bars whose top lies below `height - CHART_BOTTOM_MARGIN` are skipped.
pub const CHART_BOTTOM_MARGIN: f64 = 100.0;
/// Horizontal room kept free right of the longest bar for its value label.
pub const VALUE_AREA: f64 = 250.0;
/// Radius of the bar's leading corners.
pub const CORNER_RADIUS: f64 = 8.0;
/// Drawn bars are never thinner than this.
pub const MIN_BAR_WIDTH: f64 = 4.0;
/// Bar labels are suppressed below this width.
pub const LABEL_MIN_BAR_WIDTH: f64 = 20.0;

const TITLE_PX: f32 = 60.0;
const SUBTITLE_PX: f32 = 40.0;
const WATERMARK_PX: f32 = 350.0;
const SOURCE_PX: f32 = 24.0;
const LABEL_PX: f32 = 24.0;
const VALUE_PX: f32 = 30.0;

/// Where and how one ranked entity is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct BarLayout {
    /// Entity id.
    pub id: String,
    /// Dense rank (0 = leader).
    pub rank: usize,
    /// Filled bar rectangle (already floored to [`MIN_BAR_WIDTH`]).
    pub rect: Rect,
    /// Unclamped proportional bar length; label and value positions follow it.
    pub length: f64,
    /// Bar fill.
    pub color: Color,
    /// Bar label and its baseline origin, when the bar is long enough.
    pub label: Option<(String, Point)>,
    /// Formatted value text.
    pub value_text: String,
    /// Baseline origin of the value text.
    pub value_origin: Point,
    /// Icon placement, when icons are enabled and the entity references one.
    pub icon: Option<IconPlacement>,
}

/// Circular icon drawn over the bar end.
#[derive(Clone, Debug, PartialEq)]
pub struct IconPlacement {
    /// Icon URL (cache key).
    pub url: String,
    /// Center of the icon circle.
    pub center: Point,
    /// Icon edge length.
    pub size: f64,
    /// Radius of the white halo behind the icon.
    pub halo_radius: f64,
}

/// Pure bar geometry for `frame`. Drawing is a straight walk over the result.
pub fn layout_bars(
    frame: &InterpolatedFrame,
    config: &RenderConfig,
    canvas: Canvas,
) -> Vec<BarLayout> {
    let width = f64::from(canvas.width);
    let height = f64::from(canvas.height);
    let chart_bottom = height - CHART_BOTTOM_MARGIN;
    let max_bar_width = width - PADDING * 2.0 - VALUE_AREA;
    let bar_h = config.bar_height();

    let max_value = match frame.leader().map(|e| e.value) {
        Some(v) if v != 0.0 => v,
        _ => 1.0,
    };

    let mut out = Vec::new();
    for e in &frame.entities {
        if e.rank >= config.top_n() {
            continue;
        }
        let y = CHART_TOP + (e.rank as f64) * (bar_h + config.gap());
        if y > chart_bottom {
            continue;
        }

        let length = e.value / max_value * max_bar_width;
        let rect = Rect::new(PADDING, y, PADDING + length.max(MIN_BAR_WIDTH), y + bar_h);

        let label = (length > LABEL_MIN_BAR_WIDTH)
            .then(|| (e.label.clone(), Point::new(PADDING + 15.0, y + bar_h / 2.0 + 8.0)));

        let icon = match (&e.icon, config.show_icons()) {
            (Some(url), true) => {
                let size = bar_h * 0.8;
                Some(IconPlacement {
                    url: url.clone(),
                    center: Point::new(PADDING + length, y + bar_h / 2.0),
                    size,
                    halo_radius: size / 2.0 + 4.0,
                })
            }
            _ => None,
        };

        out.push(BarLayout {
            id: e.id.clone(),
            rank: e.rank,
            rect,
            length,
            color: e.color,
            label,
            value_text: format_value(e.value),
            value_origin: Point::new(PADDING + length + 30.0, y + bar_h / 2.0 + 10.0),
            icon,
        });
    }
    out
}

/// Round to an integer and group thousands with commas (`2910.4` -> `2,910`).
pub fn format_value(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_owned();
    }
    let rounded = (v + 0.5).floor();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

struct ChartFonts {
    engine: TextLayoutEngine,
    regular: FontFace,
    bold: FontFace,
}

/// Draws bar-chart-race frames onto a [`RasterSurface`].
///
/// Every call is a full redraw. Missing fonts disable text only; missing or still-loading icons
/// are skipped.
pub struct RaceRenderer {
    fonts: Option<ChartFonts>,
    icons: Arc<IconCache>,
    paints: HashMap<String, vello_cpu::Image>,
    warned_no_fonts: bool,
}

impl std::fmt::Debug for RaceRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceRenderer")
            .field("has_text", &self.has_text())
            .field("cached_icon_paints", &self.paints.len())
            .finish_non_exhaustive()
    }
}

impl RaceRenderer {
    /// Renderer without fonts, reading icons from `icons`.
    pub fn new(icons: Arc<IconCache>) -> Self {
        Self {
            fonts: None,
            icons,
            paints: HashMap::new(),
            warned_no_fonts: false,
        }
    }

    /// Enable text with a regular face and an optional bold face.
    pub fn with_font_bytes(
        mut self,
        regular: Vec<u8>,
        bold: Option<Vec<u8>>,
    ) -> DataraceResult<Self> {
        let mut engine = TextLayoutEngine::new();
        let regular_face = engine.register_font(regular, false)?;
        let bold_face = match bold {
            Some(bytes) => engine.register_font(bytes, true)?,
            None => FontFace {
                bold: true,
                ..regular_face.clone()
            },
        };
        tracing::debug!(
            regular = %regular_face.family,
            bold = %bold_face.family,
            "chart fonts registered"
        );
        self.fonts = Some(ChartFonts {
            engine,
            regular: regular_face,
            bold: bold_face,
        });
        Ok(self)
    }

    /// `true` when a font is registered.
    pub fn has_text(&self) -> bool {
        self.fonts.is_some()
    }

    /// The icon cache this renderer reads from.
    pub fn icons(&self) -> &Arc<IconCache> {
        &self.icons
    }

    /// Interpolate `dataset` at `progress` and draw it.
    pub fn render_progress(
        &mut self,
        surface: &mut RasterSurface,
        dataset: &Dataset,
        config: &RenderConfig,
        progress: f64,
    ) -> DataraceResult<InterpolatedFrame> {
        let frame = interpolate(&dataset.timeline, &dataset.entities, progress);
        self.render(surface, dataset, config, &frame)?;
        Ok(frame)
    }

    /// Draw one frame: background, title, subtitle, watermark, source, then bars.
    pub fn render(
        &mut self,
        surface: &mut RasterSurface,
        dataset: &Dataset,
        config: &RenderConfig,
        frame: &InterpolatedFrame,
    ) -> DataraceResult<()> {
        if self.fonts.is_none() && !self.warned_no_fonts {
            tracing::warn!("no font registered; chart text will not be drawn");
            self.warned_no_fonts = true;
        }

        let canvas = surface.canvas();
        let rounded = surface.caps().rounded_rects;
        let bars = layout_bars(frame, config, canvas);
        let width = f64::from(canvas.width);
        let height = f64::from(canvas.height);
        let text = config.text();

        surface.paint(|ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            set_color(ctx, config.background());
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, width, height));

            if let Some(fonts) = self.fonts.as_mut() {
                fonts.draw(
                    ctx,
                    &dataset.title,
                    true,
                    TITLE_PX,
                    text,
                    (PADDING, 80.0),
                    Align::Left,
                )?;
                fonts.draw(
                    ctx,
                    &dataset.subtitle,
                    false,
                    SUBTITLE_PX,
                    text.with_opacity(0.8),
                    (PADDING, 140.0),
                    Align::Left,
                )?;
                fonts.draw(
                    ctx,
                    &frame.display_label,
                    true,
                    WATERMARK_PX,
                    text.with_opacity(0.15),
                    (width - PADDING, height - PADDING),
                    Align::Right,
                )?;
                fonts.draw(
                    ctx,
                    &format!("Source: {}", dataset.source),
                    false,
                    SOURCE_PX,
                    text.with_opacity(0.6),
                    (width - PADDING, height - 30.0),
                    Align::Right,
                )?;
            }

            for bar in &bars {
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                set_color(ctx, bar.color);
                if rounded {
                    let r = CORNER_RADIUS
                        .min(bar.rect.width() / 2.0)
                        .min(bar.rect.height() / 2.0);
                    let shape =
                        RoundedRect::from_rect(bar.rect, RoundedRectRadii::new(0.0, r, r, 0.0));
                    ctx.fill_path(&bezpath_to_cpu(&shape.to_path(0.1)));
                } else {
                    ctx.fill_rect(&rect_to_cpu(bar.rect));
                }

                if let Some(icon) = &bar.icon {
                    self.draw_icon(ctx, icon);
                }

                if let Some(fonts) = self.fonts.as_mut() {
                    if let Some((label, origin)) = &bar.label {
                        let shadow = Color::rgba(0, 0, 0, 128);
                        fonts.draw(
                            ctx,
                            label,
                            true,
                            LABEL_PX,
                            shadow,
                            (origin.x + 1.0, origin.y + 2.0),
                            Align::Left,
                        )?;
                        fonts.draw(
                            ctx,
                            label,
                            true,
                            LABEL_PX,
                            Color::WHITE.with_opacity(0.9),
                            (origin.x, origin.y),
                            Align::Left,
                        )?;
                    }
                    fonts.draw(
                        ctx,
                        &bar.value_text,
                        true,
                        VALUE_PX,
                        text,
                        (bar.value_origin.x, bar.value_origin.y),
                        Align::Left,
                    )?;
                }
            }
            Ok(())
        })
    }

    fn draw_icon(&mut self, ctx: &mut vello_cpu::RenderContext, icon: &IconPlacement) {
        let Some(img) = self.icons.request(&icon.url).ready_image() else {
            return;
        };
        let paint = match self.paints.get(&icon.url) {
            Some(p) => p.clone(),
            None => match image_to_paint(&img) {
                Ok(p) => {
                    self.paints.insert(icon.url.clone(), p.clone());
                    p
                }
                Err(e) => {
                    tracing::debug!(url = %icon.url, error = %e, "icon not drawable");
                    return;
                }
            },
        };

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        set_color(ctx, Color::WHITE);
        let halo = Circle::new(icon.center, icon.halo_radius).to_path(0.1);
        ctx.fill_path(&bezpath_to_cpu(&halo));

        // Paint in image space, scaled into the icon square; the ellipse path clips to a circle.
        let (iw, ih) = (f64::from(img.width), f64::from(img.height));
        let origin = icon.center - kurbo::Vec2::new(icon.size / 2.0, icon.size / 2.0);
        let xf = Affine::translate(origin.to_vec2())
            * Affine::scale_non_uniform(icon.size / iw, icon.size / ih);
        ctx.set_transform(affine_to_cpu(xf));
        ctx.set_paint(paint);
        let clip = Ellipse::new((iw / 2.0, ih / 2.0), (iw / 2.0, ih / 2.0), 0.0).to_path(0.1);
        ctx.fill_path(&bezpath_to_cpu(&clip));
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }
}

impl ChartFonts {
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        bold: bool,
        size_px: f32,
        color: Color,
        (x, baseline_y): (f64, f64),
        align: Align,
    ) -> DataraceResult<()> {
        if text.trim().is_empty() || color.a == 0 {
            return Ok(());
        }
        let face = if bold { &self.bold } else { &self.regular };
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let layout = self.engine.layout_line(text, face, size_px, brush)?;
        let Some(baseline) = layout.lines().next().map(|l| f64::from(l.metrics().baseline)) else {
            return Ok(());
        };
        let left = match align {
            Align::Left => x,
            Align::Right => x - f64::from(layout.width()),
        };

        ctx.set_transform(affine_to_cpu(Affine::translate((left, baseline_y - baseline))));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&face.data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }
}

fn set_color(ctx: &mut vello_cpu::RenderContext, c: Color) {
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
}

fn image_to_paint(img: &PreparedImage) -> DataraceResult<vello_cpu::Image> {
    let w: u16 = img
        .width
        .try_into()
        .map_err(|_| DataraceError::validation("icon width exceeds u16"))?;
    let h: u16 = img
        .height
        .try_into()
        .map_err(|_| DataraceError::validation("icon height exceeds u16"))?;

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(img.width as usize * img.height as usize);
    for px in img.rgba8_premul.chunks_exact(4) {
        may_have_opacities |= px[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        });
    }
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/chart.rs"]
mod tests;
