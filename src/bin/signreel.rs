use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "signreel", version)]
struct Cli {
    /// Engine config JSON. Missing fields take defaults; `SIGNREEL_*` env vars override paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate stick-figure poses and write them as JSON.
    Poses(PosesArgs),
    /// Render one stick-figure frame of a gloss as a PNG.
    Frame(FrameArgs),
    /// Render a stick-figure MP4 (requires `ffmpeg` on PATH).
    Stick(StickArgs),
    /// Fetch and join recorded clips (requires `ffmpeg`/`ffprobe` on PATH).
    Video(VideoArgs),
    /// Inspect or clear the clip cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List catalog glosses resembling a gloss.
    Suggest(SuggestArgs),
}

#[derive(Parser, Debug)]
struct PosesArgs {
    /// Glosses, in order.
    #[arg(long, num_args = 1.., required = true)]
    glosses: Vec<String>,

    /// Output JSON path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Gloss to render.
    #[arg(long)]
    gloss: String,

    /// Frame index within the gloss (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct StickArgs {
    /// Glosses, in order.
    #[arg(long, num_args = 1.., required = true)]
    glosses: Vec<String>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Override the configured frame rate.
    #[arg(long)]
    fps: Option<u32>,
}

#[derive(Parser, Debug)]
struct VideoArgs {
    /// Glosses, in order.
    #[arg(long, num_args = 1.., required = true)]
    glosses: Vec<String>,

    /// Output MP4 path (generated under the output directory when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print file count and size.
    Info,
    /// Delete every cached clip.
    Clear,
}

#[derive(Parser, Debug)]
struct SuggestArgs {
    /// Gloss to look up.
    #[arg(long)]
    gloss: String,

    /// Maximum suggestions.
    #[arg(long, default_value_t = 5)]
    max: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Poses(args) => cmd_poses(&cfg, args),
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Stick(args) => cmd_stick(&cfg, args),
        Command::Video(args) => cmd_video(&cfg, args),
        Command::Cache { action } => cmd_cache(&cfg, action),
        Command::Suggest(args) => cmd_suggest(&cfg, args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<signreel::EngineConfig> {
    let mut cfg = match path {
        Some(p) => signreel::EngineConfig::from_json_file(p)?,
        None => signreel::EngineConfig::default(),
    };
    cfg.apply_env()?;
    cfg.validate()?;
    Ok(cfg)
}

fn generator(cfg: &signreel::EngineConfig) -> anyhow::Result<signreel::Generator> {
    let library = signreel::GestureLibrary::from_dir(&cfg.gestures.dir)?;
    Ok(signreel::Generator::new(
        std::sync::Arc::new(library),
        cfg.gestures.generator.clone(),
    ))
}

fn print_markers(seq: &signreel::PoseSequence) {
    for g in &seq.glosses {
        eprintln!("{:<16} {:<12} {:?}", g.gloss, g.marker, g.source);
    }
}

fn cmd_poses(cfg: &signreel::EngineConfig, args: PosesArgs) -> anyhow::Result<()> {
    let seq = generator(cfg)?.generate_sequence(&args.glosses);
    print_markers(&seq);

    let json = serde_json::to_string_pretty(&seq).context("serialize poses")?;
    match args.out {
        Some(out) => {
            signreel::ensure_parent_dir(&out)?;
            std::fs::write(&out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_frame(cfg: &signreel::EngineConfig, args: FrameArgs) -> anyhow::Result<()> {
    let generated = generator(cfg)?.generate(&args.gloss);
    let pose = usize::try_from(args.frame)
        .ok()
        .and_then(|i| generated.frames.get(i))
        .with_context(|| {
            format!(
                "frame {} out of range (gloss has {} frames)",
                args.frame,
                generated.frames.len()
            )
        })?;
    eprintln!("{} ({}, {:?})", generated.gloss, generated.marker, generated.source);

    let renderer = signreel::StickRenderer::new(cfg.stick.canvas(), cfg.stick.style.clone())?;
    let frame = renderer.render(pose);

    signreel::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_stick(cfg: &signreel::EngineConfig, args: StickArgs) -> anyhow::Result<()> {
    let seq = generator(cfg)?.generate_sequence(&args.glosses);
    print_markers(&seq);

    let renderer = signreel::StickRenderer::new(cfg.stick.canvas(), cfg.stick.style.clone())?;
    let frames = renderer.render_sequence_to_mp4(&seq, &args.out, args.fps.unwrap_or(cfg.stick.fps))?;

    eprintln!("wrote {} ({frames} frames)", args.out.display());
    Ok(())
}

fn cmd_video(cfg: &signreel::EngineConfig, args: VideoArgs) -> anyhow::Result<()> {
    let engine = signreel::Engine::from_config(cfg)?;
    let out = engine.video(&args.glosses, args.out.as_deref())?;

    for report in &out.outcomes {
        eprintln!("{:<16} {:?}", report.gloss, report.outcome);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("serialize video output")?
    );
    Ok(())
}

fn cmd_cache(cfg: &signreel::EngineConfig, action: CacheAction) -> anyhow::Result<()> {
    let cache = signreel::VideoCache::open(&cfg.video.cache_dir, cfg.video.cache)?;
    match action {
        CacheAction::Info => {
            let info = cache.info()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("serialize cache info")?
            );
        }
        CacheAction::Clear => {
            cache.clear()?;
            eprintln!("cleared {}", cache.dir().display());
        }
    }
    Ok(())
}

fn cmd_suggest(cfg: &signreel::EngineConfig, args: SuggestArgs) -> anyhow::Result<()> {
    let catalog = signreel::VideoCatalog::from_json_file(&cfg.video.catalog)?;
    let resolver = signreel::GlossResolver::new(catalog, cfg.video.preferred_sources.clone());
    let query = args.gloss.trim().to_uppercase();
    if resolver.exists(&query) {
        eprintln!("{query} is in the catalog");
    }
    for gloss in resolver.similar_glosses(&query, args.max) {
        println!("{gloss}");
    }
    Ok(())
}
