use std::sync::Arc;

use crate::foundation::error::{DataraceError, DataraceResult};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Prepared raster image in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap premultiplied pixels, checking the buffer length.
    pub fn new(width: u32, height: u32, rgba8_premul: Vec<u8>) -> DataraceResult<Self> {
        if width == 0 || height == 0 {
            return Err(DataraceError::validation("image width/height must be > 0"));
        }
        if rgba8_premul.len() != (width as usize) * (height as usize) * 4 {
            return Err(DataraceError::validation(
                "image byte length must equal width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Solid single-color image, handy for tests and placeholders.
    pub fn solid(width: u32, height: u32, premul: [u8; 4]) -> DataraceResult<Self> {
        let px = (width as usize) * (height as usize);
        Self::new(width, height, premul.repeat(px))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/// A font registered with a [`TextLayoutEngine`].
#[derive(Clone)]
pub(crate) struct FontFace {
    pub(crate) family: String,
    pub(crate) bold: bool,
    pub(crate) data: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("bold", &self.bold)
            .finish_non_exhaustive()
    }
}

/// Stateful helper for building Parley text layouts from registered fonts.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub(crate) fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Register raw font bytes once; the returned face is used for every later layout.
    pub(crate) fn register_font(
        &mut self,
        font_bytes: Vec<u8>,
        bold: bool,
    ) -> DataraceResult<FontFace> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            DataraceError::validation("no font families registered from font bytes")
        })?;

        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| DataraceError::validation("registered font family has no name"))?
            .to_string();

        let data = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);
        Ok(FontFace { family, bold, data })
    }

    /// Shape a single line of text.
    pub(crate) fn layout_line(
        &mut self,
        text: &str,
        face: &FontFace,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> DataraceResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(DataraceError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(face.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));
        if face.bold {
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::BOLD,
            ));
        }

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
