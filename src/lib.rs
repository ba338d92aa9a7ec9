//! Datarace: animated bar chart races.
//!
//! A [`Dataset`] (entities plus an ordered timeline of value snapshots) is interpolated at a
//! normalized progress into a ranked [`InterpolatedFrame`], drawn by [`RaceRenderer`] onto a
//! CPU [`RasterSurface`], and optionally recorded in real time into a WebM [`Artifact`] by the
//! [`ExportPipeline`].
//!
//! [`Studio`] ties everything together behind a cooperative `tick(now)` step: playback control,
//! reactive redraw, dataset/config replacement, off-thread dataset generation and export.
//!
//! Typical one-shot use:
//!
//! ```no_run
//! use datarace::{Canvas, IconCache, RaceRenderer, RasterSurface, RenderConfig, sample_dataset};
//!
//! # fn main() -> datarace::DataraceResult<()> {
//! let dataset = sample_dataset()?;
//! let config = RenderConfig::default();
//! let mut surface = RasterSurface::new(Canvas::HD)?;
//! let mut renderer = RaceRenderer::new(IconCache::global());
//! renderer.render_progress(&mut surface, &dataset, &config, 0.5)?;
//! surface.save_png(std::path::Path::new("race.png"))?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod assets;
pub mod encode;
pub mod export;
pub mod generate;
pub mod interp;
pub mod playback;
pub mod render;
pub mod scene;
pub mod session;

pub use assets::fonts::{FontBytes, FontFiles};
pub use assets::icons::{DefaultIconLoader, IconCache, IconHandle, IconLoader};
pub use assets::store::PreparedImage;
pub use encode::ffmpeg::FfmpegEncoder;
pub use encode::session::{
    EncoderBackend, EncoderSession, InMemoryEncoder, InMemoryEncoderStats, SessionConfig,
    VideoCodec, WEBM_MEDIA_TYPE,
};
pub use export::artifact::{Artifact, ArtifactDelivery, DirectoryDelivery, InMemoryDelivery};
pub use export::pipeline::{CAPTURE_FPS, ExportPipeline, ExportState, PRE_ROLL};
pub use foundation::core::{Canvas, Fps};
pub use foundation::error::{DataraceError, DataraceResult, ErrorKind};
pub use generate::command::{CommandGenerator, DatasetGenerator, generation_prompt};
pub use interp::frame::{InterpolatedEntity, InterpolatedFrame, interpolate};
pub use playback::clock::{
    AnimationClock, ClockObserver, ClockPhase, ClockState, ClockTransition,
};
pub use render::chart::{BarLayout, RaceRenderer, format_value, layout_bars};
pub use render::surface::{CaptureSource, FrameRGBA, RasterSurface, SurfaceCaps};
pub use scene::color::Color;
pub use scene::config::{RenderConfig, RenderConfigDef};
pub use scene::dataset::Dataset;
pub use scene::model::{Entity, Snapshot, Timeline};
pub use scene::sample::sample_dataset;
pub use session::studio::{Notification, Studio};
