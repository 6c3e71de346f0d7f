//! Face overlay replay tool: runs recorded frames and detections through the engine.

use anyhow::{bail, Context, Result};
use clap::Parser;
use face_overlay::{
    config::{Config, EXAMPLE_CONFIG},
    detection::{DetectionScript, ReplayDetector},
    engine::OverlayEngine,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Overlay image, by name in the overlay folder or by path
    #[arg(short, long)]
    overlay: Option<String>,

    /// Input frame file or directory of frames
    #[arg(short, long, required_unless_present = "write_config")]
    frames: Option<PathBuf>,

    /// YAML file with recorded detections per frame
    #[arg(short = 'D', long)]
    detections: Option<PathBuf>,

    /// Output directory for processed frames
    #[arg(short = 'O', long, default_value = "output")]
    output: PathBuf,

    /// Frame rate used to time tracks
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Overlay size in percent
    #[arg(long)]
    scale: Option<f64>,

    /// Horizontal overlay offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    offset_x: Option<i32>,

    /// Vertical overlay offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    offset_y: Option<i32>,

    /// Yaw sensitivity in percent
    #[arg(long)]
    yaw: Option<f64>,

    /// Pitch sensitivity in percent
    #[arg(long)]
    pitch: Option<f64>,

    /// Roll offset in degrees
    #[arg(long, allow_hyphen_values = true)]
    roll: Option<f64>,

    /// Write an example configuration file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if let Some(path) = &args.write_config {
        std::fs::write(path, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    if !(args.fps.is_finite() && args.fps > 0.0) {
        bail!("--fps must be positive, got {}", args.fps);
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("Failed to load config file: {e}. Using defaults.");
                    Config::default()
                }
            }
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &args);

    let script = match &args.detections {
        Some(path) => DetectionScript::from_file(path)
            .with_context(|| format!("Failed to load detections from {}", path.display()))?,
        None => {
            warn!("No detections given; frames will pass through unchanged");
            DetectionScript::default()
        }
    };
    info!("Replaying {} recorded detection frames", script.frames.len());

    let engine = OverlayEngine::from_config(&config, Some(Box::new(ReplayDetector::from(script))))
        .context("Failed to initialize engine")?;
    if !engine.has_overlay() {
        warn!("No overlay configured; frames will pass through unchanged");
    }

    let frames_path = args.frames.as_deref().context("--frames is required")?;
    let frames = collect_frames(frames_path)?;
    if frames.is_empty() {
        bail!("No frames found in {}", frames_path.display());
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let start = Instant::now();
    let frame_interval = Duration::from_secs_f64(1.0 / args.fps);
    let mut elapsed = Duration::ZERO;

    for (index, path) in frames.iter().enumerate() {
        let frame = image::open(path)
            .with_context(|| format!("Failed to read frame {}", path.display()))?
            .to_rgb8();

        let output = engine.process_frame_at(&frame, start + elapsed);
        elapsed += frame_interval;

        let file_name = path.file_name().context("Frame path has no file name")?;
        let target = args.output.join(file_name);
        output
            .save(&target)
            .with_context(|| format!("Failed to write {}", target.display()))?;

        log::debug!("Frame {index}: {} live tracks", engine.tracks().len());
    }

    engine.close();
    info!("Processed {} frames into {}", frames.len(), args.output.display());

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    let adjustment = &mut config.adjustment;
    if let Some(scale) = args.scale {
        adjustment.manual_scale_percent = scale;
    }
    if let Some(offset_x) = args.offset_x {
        adjustment.offset_x = offset_x;
    }
    if let Some(offset_y) = args.offset_y {
        adjustment.offset_y = offset_y;
    }
    if let Some(yaw) = args.yaw {
        adjustment.yaw_percent = yaw;
    }
    if let Some(pitch) = args.pitch {
        adjustment.pitch_percent = pitch;
    }
    if let Some(roll) = args.roll {
        adjustment.roll_offset = roll;
    }
    if let Some(overlay) = &args.overlay {
        config.overlay.default_overlay = Some(overlay.clone());
    }
}

fn collect_frames(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut frames = Vec::new();
    for entry in std::fs::read_dir(path).with_context(|| format!("Failed to list {}", path.display()))? {
        let entry_path = entry?.path();
        let is_frame = entry_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame {
            frames.push(entry_path);
        }
    }
    frames.sort();

    Ok(frames)
}
