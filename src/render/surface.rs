use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::Canvas;
use crate::foundation::error::{DataraceError, DataraceResult};

/// One captured frame as RGBA8 bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 bytes.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied by alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Copy of this frame with straight (non-premultiplied) alpha.
    pub fn to_straight(&self) -> FrameRGBA {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let a = u32::from(px[3]);
                if a == 0 || a == 255 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        FrameRGBA {
            width: self.width,
            height: self.height,
            data,
            premultiplied: false,
        }
    }
}

/// Something whose pixels can be streamed into an encoder.
pub trait CaptureSource {
    /// Size of captured frames.
    fn capture_canvas(&self) -> Canvas;
    /// `true` when [`CaptureSource::grab_frame`] is usable.
    fn supports_capture(&self) -> bool;
    /// Read back the current pixels.
    fn grab_frame(&self) -> DataraceResult<FrameRGBA>;
}

/// Optional features of a drawing surface. Queried by the renderer and the export pipeline,
/// never assumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCaps {
    /// Rounded-rectangle bars are available; plain rectangles otherwise.
    pub rounded_rects: bool,
    /// Frames can be captured for export.
    pub capture: bool,
}

impl Default for SurfaceCaps {
    fn default() -> Self {
        Self {
            rounded_rects: true,
            capture: true,
        }
    }
}

/// CPU raster target backed by a `vello_cpu` pixmap.
pub struct RasterSurface {
    canvas: Canvas,
    caps: SurfaceCaps,
    pixmap: vello_cpu::Pixmap,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("canvas", &self.canvas)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

impl RasterSurface {
    /// Surface with every capability enabled.
    pub fn new(canvas: Canvas) -> DataraceResult<Self> {
        Self::with_caps(canvas, SurfaceCaps::default())
    }

    /// Surface with an explicit capability set.
    pub fn with_caps(canvas: Canvas, caps: SurfaceCaps) -> DataraceResult<Self> {
        let (w, h) = canvas_u16(canvas)?;
        Ok(Self {
            canvas,
            caps,
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    /// Surface size.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Capability set.
    pub fn caps(&self) -> SurfaceCaps {
        self.caps
    }

    /// Run `draw` against a fresh render context and rasterize the result into the pixmap.
    pub(crate) fn paint(
        &mut self,
        draw: impl FnOnce(&mut vello_cpu::RenderContext) -> DataraceResult<()>,
    ) -> DataraceResult<()> {
        let (w, h) = canvas_u16(self.canvas)?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        draw(&mut ctx)?;
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        Ok(())
    }

    /// Copy of the current pixels (premultiplied).
    pub fn snapshot(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    /// Write the current pixels as a PNG, creating parent directories.
    pub fn save_png(&self, path: &Path) -> DataraceResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }

        let frame = self.snapshot().to_straight();
        image::save_buffer_with_format(
            path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

impl CaptureSource for RasterSurface {
    fn capture_canvas(&self) -> Canvas {
        self.canvas
    }

    fn supports_capture(&self) -> bool {
        self.caps.capture
    }

    fn grab_frame(&self) -> DataraceResult<FrameRGBA> {
        if !self.caps.capture {
            return Err(DataraceError::capability(
                "surface does not support frame capture",
            ));
        }
        Ok(self.snapshot())
    }
}

fn canvas_u16(canvas: Canvas) -> DataraceResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| DataraceError::validation("surface width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| DataraceError::validation("surface height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(DataraceError::validation("surface width/height must be > 0"));
    }
    Ok((w, h))
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
