use anyhow::Context;

use crate::assets::store::PreparedImage;
use crate::foundation::error::{DataraceError, DataraceResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Target edge length for rasterized SVG icons. Icons are drawn at `0.8 * barHeight`, so this
/// covers bars up to 160 px tall without upscaling.
pub const SVG_ICON_RASTER_PX: u32 = 128;

/// Decode encoded raster image bytes (PNG, JPEG, ...) into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> DataraceResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    PreparedImage::new(width, height, rgba8_premul)
}

/// Parse SVG bytes and rasterize them so the longer edge is `max_edge_px`.
pub fn rasterize_svg(bytes: &[u8], max_edge_px: u32) -> DataraceResult<PreparedImage> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;

    let size = tree.size();
    let (sw, sh) = (size.width(), size.height());
    if !sw.is_finite() || !sh.is_finite() || sw <= 0.0 || sh <= 0.0 {
        return Err(DataraceError::validation("svg has invalid width/height"));
    }
    let scale = (max_edge_px.max(1) as f32) / sw.max(sh);
    let width = ((sw * scale).ceil() as u32).max(1);
    let height = ((sh * scale).ceil() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| DataraceError::validation("failed to allocate svg pixmap"))?;
    let xform = resvg::tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(&tree, xform, &mut pixmap.as_mut());

    // tiny-skia pixmaps are already premultiplied RGBA8.
    PreparedImage::new(width, height, pixmap.data().to_vec())
}

/// Decode icon bytes of either kind, sniffing SVG by content.
pub fn decode_icon(bytes: &[u8]) -> DataraceResult<PreparedImage> {
    if looks_like_svg(bytes) {
        rasterize_svg(bytes, SVG_ICON_RASTER_PX)
    } else {
        decode_image(bytes)
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let t = text.trim_start_matches('\u{feff}').trim_start();
    t.starts_with("<svg") || (t.starts_with("<?xml") && t.contains("<svg"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
