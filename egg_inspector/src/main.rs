use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use egg_vision::{
    BatchOptions, EggPipeline, EggVisionConfig, FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, RoiMode,
    SessionSummary, SnapshotLog, StillBatch, StillReport, ThresholdProfile, VideoSession,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "video")]
mod video;

#[derive(Parser)]
#[command(name = "egg_inspector", version, about = "Classify and measure eggs in video and still images")]
struct Cli {
    /// JSON configuration file. Missing keys take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Threshold profile, overriding the one in the configuration file.
    #[arg(long, global = true, value_enum)]
    profile: Option<ProfileArg>,

    /// Locate the egg by segmentation instead of the configured fixed box.
    #[arg(long, global = true)]
    auto_detect: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a stabilized session over a video file or a directory of frames.
    Video {
        /// A video file, or a directory of .jpg/.jpeg/.png frames.
        input: PathBuf,
        /// Output video file, or output directory for a frame directory input.
        output: PathBuf,
        /// Write a CSV row and a PNG snapshot whenever the committed label changes.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Where snapshots go; defaults to a `snapshots` directory next to the log.
        #[arg(long)]
        snapshots: Option<PathBuf>,
        /// Frame rate assumed for a frame directory.
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
    /// Classify one image, or every image in a directory, without stabilization.
    Classify { path: PathBuf },
    /// Estimate egg size for one image, or every image in a directory.
    Size { path: PathBuf },
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Canonical,
    BrownShell,
    GreenCast,
}

impl From<ProfileArg> for ThresholdProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Canonical => ThresholdProfile::Canonical,
            ProfileArg::BrownShell => ThresholdProfile::BrownShell,
            ProfileArg::GreenCast => ThresholdProfile::GreenCast,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Video {
            input,
            output,
            log,
            snapshots,
            fps,
        } => {
            let summary = run_video(config, input, output, log, snapshots, fps).await?;
            println!(
                "{} frames ({} skipped), {} snapshots, final label: {}{}",
                summary.frames_processed,
                summary.frames_skipped,
                summary.snapshots_written,
                summary.final_label,
                if summary.stopped_early { " (stopped early)" } else { "" }
            );
        }
        Command::Classify { path } => {
            let options = BatchOptions {
                estimate_size: false,
                ..BatchOptions::default()
            };
            for report in run_batch(&config, options, &path).await? {
                print_classification(&report);
            }
        }
        Command::Size { path } => {
            let options = BatchOptions {
                classify: false,
                ..BatchOptions::default()
            };
            for report in run_batch(&config, options, &path).await? {
                print_size(&report);
            }
        }
        Command::Config => println!("{}", config.to_json_string()?),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<EggVisionConfig> {
    let mut config = match &cli.config {
        Some(path) => EggVisionConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => EggVisionConfig::default(),
    };
    if let Some(profile) = cli.profile {
        config.classifier.profile = profile.into();
        config.classifier.thresholds = None;
    }
    if cli.auto_detect {
        config.roi = RoiMode::AutoDetect;
    }
    config.validate()?;
    Ok(config)
}

async fn run_video(
    config: EggVisionConfig,
    input: PathBuf,
    output: PathBuf,
    log: Option<PathBuf>,
    snapshots: Option<PathBuf>,
    fps: f64,
) -> Result<SessionSummary> {
    let mut session = VideoSession::new(EggPipeline::new(&config)?);
    if let Some(log_path) = &log {
        let snapshot_dir = snapshots.unwrap_or_else(|| {
            log_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("snapshots")
        });
        session = session.with_snapshot_log(SnapshotLog::create(log_path, &snapshot_dir)?);
    }

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current frame");
            stop.store(true, Ordering::Relaxed);
        }
    });

    info!(input = %input.display(), output = %output.display(), "starting video session");
    tokio::task::spawn_blocking(move || -> Result<SessionSummary> {
        let (mut source, mut sink) = open_stream(&input, &output, fps)?;
        Ok(session.run(source.as_mut(), sink.as_mut())?)
    })
    .await?
}

type Stream = (Box<dyn FrameSource>, Box<dyn FrameSink>);

fn open_stream(input: &Path, output: &Path, fps: f64) -> Result<Stream> {
    if input.is_dir() {
        let source = ImageSequenceSource::from_dir(input, fps)?;
        if source.is_empty() {
            bail!("no images found in {}", input.display());
        }
        let sink = ImageSequenceSink::create(output)?;
        return Ok((Box::new(source), Box::new(sink)));
    }
    open_video_file(input, output)
}

#[cfg(feature = "video")]
fn open_video_file(input: &Path, output: &Path) -> Result<Stream> {
    let source = video::VideoFileSource::open(input)?;
    let (width, height) = source.dimensions();
    let sink = video::VideoFileSink::create(output, source.frame_rate(), width, height)?;
    Ok((Box::new(source), Box::new(sink)))
}

#[cfg(not(feature = "video"))]
fn open_video_file(input: &Path, _output: &Path) -> Result<Stream> {
    bail!(
        "{} is not a directory; reading video files needs the `video` feature",
        input.display()
    )
}

async fn run_batch(config: &EggVisionConfig, options: BatchOptions, path: &Path) -> Result<Vec<StillReport>> {
    let batch = StillBatch::new(config, options)?;
    if path.is_dir() {
        Ok(batch.run_dir(path).await?)
    } else {
        Ok(batch.run(vec![path.to_path_buf()]).await)
    }
}

fn print_classification(report: &StillReport) {
    let path = report.path.display();
    let analysis = match &report.outcome {
        Ok(outcome) => outcome.classification.as_ref(),
        Err(e) => {
            println!("{path}: error: {e}");
            return;
        }
    };
    match analysis {
        Some(Ok(analysis)) => match analysis.color.dominant() {
            Some(color) => println!(
                "{path}: {} (h={:.1} s={:.1} v={:.1})",
                analysis.label, color.hue, color.saturation, color.value
            ),
            None => println!("{path}: {}", analysis.label),
        },
        Some(Err(e)) => println!("{path}: error: {e}"),
        None => {}
    }
}

fn print_size(report: &StillReport) {
    let path = report.path.display();
    let size = match &report.outcome {
        Ok(outcome) => outcome.size.as_ref(),
        Err(e) => {
            println!("{path}: error: {e}");
            return;
        }
    };
    match size {
        Some(Ok(estimate)) => {
            let bbox = estimate.bounding_box;
            println!(
                "{path}: major={:.1}px minor={:.1}px box=({}, {}) {}x{}",
                estimate.major_axis_px, estimate.minor_axis_px, bbox.x, bbox.y, bbox.width, bbox.height
            );
        }
        Some(Err(e)) => println!("{path}: cannot estimate size: {e}"),
        None => {}
    }
}
