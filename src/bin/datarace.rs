use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use datarace::{
    Canvas, CommandGenerator, Dataset, DatasetGenerator, DefaultIconLoader, DirectoryDelivery,
    ExportPipeline, FfmpegEncoder, FontFiles, IconCache, RaceRenderer, RasterSurface,
    RenderConfig, RenderConfigDef, Studio, sample_dataset,
};

#[derive(Parser, Debug)]
#[command(name = "datarace", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Record the race in real time as WebM (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Validate a dataset (and optional config) and print a summary.
    Validate(InputArgs),
    /// Write the built-in sample dataset as JSON.
    Sample(SampleArgs),
    /// Generate a dataset for a topic with an external command.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Dataset JSON. The built-in sample is used when omitted.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Render config JSON. Missing keys take the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Race duration in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Number of bars drawn.
    #[arg(long)]
    top_n: Option<i64>,

    /// Bar height in pixels.
    #[arg(long)]
    bar_height: Option<f64>,

    /// Gap between bars in pixels.
    #[arg(long)]
    gap: Option<f64>,

    /// Do not draw entity icons.
    #[arg(long)]
    no_icons: bool,

    /// Background color (e.g. `#1e293b`).
    #[arg(long)]
    background: Option<String>,

    /// Text color (e.g. `#f8fafc`).
    #[arg(long)]
    text_color: Option<String>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Regular font file (TTF/OTF). Discovered from the system when omitted.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Bold font file.
    #[arg(long)]
    bold_font: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Seconds to wait for icons before drawing (0 draws whatever is ready).
    #[arg(long, default_value_t = 10.0)]
    wait_icons: f64,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Race progress in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    progress: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Directory receiving the WebM file.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Output path. Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Free-text topic.
    topic: String,

    /// Generator program. Receives the prompt on stdin and the topic as its last argument.
    #[arg(long)]
    command: String,

    /// Extra leading arguments for the generator.
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Output path. Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Sample(args) => cmd_sample(args),
        Command::Generate(args) => cmd_generate(args),
    }
}

fn load_dataset(args: &InputArgs) -> anyhow::Result<Dataset> {
    Ok(match &args.data {
        Some(p) => Dataset::from_path(p)?,
        None => sample_dataset()?,
    })
}

fn load_config(args: &InputArgs) -> anyhow::Result<RenderConfig> {
    let mut def = match &args.config {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("read config '{}'", p.display()))?;
            serde_json::from_str::<RenderConfigDef>(&text)
                .with_context(|| format!("parse config '{}'", p.display()))?
        }
        None => RenderConfigDef::default(),
    };
    if let Some(v) = args.duration {
        def.duration_seconds = v;
    }
    if let Some(v) = args.top_n {
        def.top_n = v;
    }
    if let Some(v) = args.bar_height {
        def.bar_height = v;
    }
    if let Some(v) = args.gap {
        def.gap = v;
    }
    if args.no_icons {
        def.show_icons = false;
    }
    if let Some(v) = &args.background {
        def.background_color = serde_json::Value::String(v.clone());
    }
    if let Some(v) = &args.text_color {
        def.text_color = serde_json::Value::String(v.clone());
    }
    Ok(def.validate()?)
}

fn build_renderer(input: &InputArgs, render: &RenderArgs) -> anyhow::Result<RaceRenderer> {
    let icon_root = input
        .data
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let icons = Arc::new(IconCache::new(Arc::new(DefaultIconLoader::new(icon_root))));
    let renderer = RaceRenderer::new(icons);

    let files = match &render.font {
        Some(regular) => Some(FontFiles::new(regular, render.bold_font.clone())),
        None => FontFiles::discover(),
    };
    let Some(files) = files else {
        tracing::warn!("no font found; text will not be drawn (pass --font)");
        return Ok(renderer);
    };
    let bytes = files.load()?;
    Ok(renderer.with_font_bytes(bytes.regular, bytes.bold)?)
}

fn wait_icons(cache: &IconCache, dataset: &Dataset, config: &RenderConfig, secs: f64) {
    if !config.show_icons() || secs.is_nan() || secs <= 0.0 {
        return;
    }
    let urls = dataset.entities.iter().filter_map(|e| e.icon.as_deref());
    cache.preload(urls, Duration::from_secs_f64(secs.min(600.0)));
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&args.progress) {
        anyhow::bail!("--progress must be in [0, 1], got {}", args.progress);
    }
    let dataset = load_dataset(&args.input)?;
    let config = load_config(&args.input)?;
    let mut renderer = build_renderer(&args.input, &args.render)?;
    wait_icons(renderer.icons(), &dataset, &config, args.render.wait_icons);

    let canvas = Canvas::new(args.render.width, args.render.height)?;
    let mut surface = RasterSurface::new(canvas)?;
    let frame = renderer.render_progress(&mut surface, &dataset, &config, args.progress)?;
    surface.save_png(&args.out)?;

    eprintln!(
        "wrote {} ({}, {} bars)",
        args.out.display(),
        frame.display_label,
        frame.entities.len().min(config.top_n())
    );
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args.input)?;
    let config = load_config(&args.input)?;
    let renderer = build_renderer(&args.input, &args.render)?;

    let canvas = Canvas::new(args.render.width, args.render.height)?;
    let surface = RasterSurface::new(canvas)?;
    let export = ExportPipeline::new(
        Box::new(FfmpegEncoder::new(args.ffmpeg)),
        Box::new(DirectoryDelivery::new(&args.out_dir)),
    );

    let mut studio = Studio::new(dataset, config, renderer, surface, export);
    if args.render.wait_icons > 0.0 {
        studio.wait_for_icons(Duration::from_secs_f64(args.render.wait_icons.min(600.0)));
    }

    let frames = studio.run_export_blocking()?;
    eprintln!("exported {frames} frames into {}", args.out_dir.display());
    Ok(())
}

fn cmd_validate(args: InputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&args)?;
    let config = load_config(&args)?;
    println!("title:     {}", dataset.title);
    println!("entities:  {}", dataset.entities.len());
    println!("snapshots: {}", dataset.timeline.len());
    println!(
        "config:    {:.1}s, top {}, bar {}px, gap {}px",
        config.duration().as_secs_f64(),
        config.top_n(),
        config.bar_height(),
        config.gap()
    );
    println!("ok");
    Ok(())
}

fn write_dataset(dataset: &Dataset, out: Option<&Path>) -> anyhow::Result<()> {
    let json = dataset.to_json_pretty()?;
    match out {
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(p, json).with_context(|| format!("write '{}'", p.display()))?;
            eprintln!("wrote {}", p.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_sample(args: SampleArgs) -> anyhow::Result<()> {
    write_dataset(&sample_dataset()?, args.out.as_deref())
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let generator = CommandGenerator::new(args.command, args.args);
    let dataset = generator.generate(&args.topic)?;
    write_dataset(&dataset, args.out.as_deref())
}
