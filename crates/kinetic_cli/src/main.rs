//! Kinetic CLI
//!
//! Headless driver for the animation engine: browse the preset catalog,
//! preview a preset tick by tick, and check config files.

mod preview;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kinetic_animation::{AnimationConfig, PresetKind, Presets, Vec2, CATALOG};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::preview::PreviewOptions;

#[derive(Parser, Debug)]
#[command(name = "kinetic", version, about = "Kinetic animation engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every preset with its defaults
    List {
        /// Animation config (kinetic.toml) providing preset defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Play a preset on an in-memory node and print its state per tick
    Preview {
        /// Preset name, e.g. `slide_in_left`
        preset: String,

        /// Ticks per second
        #[arg(long, default_value_t = 60)]
        fps: u32,

        /// Stop after this many seconds even if the preset is still running
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,

        /// Override the preset duration (seconds)
        #[arg(long)]
        duration: Option<f32>,

        /// Wait before starting (seconds)
        #[arg(long, default_value_t = 0.0)]
        delay: f32,

        /// Override the preset magnitude (distance, scale factor, angle or intensity)
        #[arg(long)]
        amount: Option<f32>,

        /// Starting position as `x,y`
        #[arg(long, value_parser = parse_vec2, default_value = "0,0")]
        at: Vec2,

        /// Print one JSON object per tick
        #[arg(long)]
        json: bool,

        /// Animation config (kinetic.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an animation config file and print it normalized
    CheckConfig {
        /// Path to kinetic.toml
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::List { config } => cmd_list(config.as_deref()),
        Command::Preview {
            preset,
            fps,
            seconds,
            duration,
            delay,
            amount,
            at,
            json,
            config,
        } => {
            let options = PreviewOptions {
                fps,
                seconds,
                duration,
                delay,
                amount,
                origin: at,
            };
            cmd_preview(&preset, &options, json, config.as_deref())
        }
        Command::CheckConfig { path } => cmd_check_config(&path),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnimationConfig> {
    match path {
        Some(path) => AnimationConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnimationConfig::default()),
    }
}

fn cmd_list(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let defaults = &config.presets;

    println!(
        "{:<24} {:<9} {:>9} {:>9}",
        "PRESET", "KIND", "DURATION", "AMOUNT"
    );
    for kind in CATALOG {
        let shape = if kind.is_timeline() { "sequence" } else { "single" };
        let amount = kind
            .default_amount(defaults)
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<9} {:>8.2}s {:>9}",
            kind.name(),
            shape,
            kind.default_duration(defaults),
            amount
        );
    }
    Ok(())
}

fn cmd_preview(
    name: &str,
    options: &PreviewOptions,
    json: bool,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let kind = PresetKind::from_name(name)
        .with_context(|| "Run `kinetic list` to see available presets")?;
    let presets = Presets::new(config.presets);

    let preview = preview::run(kind, &presets, config.scheduler, options)?;

    for frame in &preview.frames {
        if json {
            println!("{}", serde_json::to_string(frame)?);
        } else {
            println!(
                "{:>4}  t={:.3}  opacity={:.3}  position=({:.2}, {:.2})  scale=({:.3}, {:.3})  rotation={:.2}",
                frame.tick,
                frame.time,
                frame.opacity,
                frame.position.x,
                frame.position.y,
                frame.scale.x,
                frame.scale.y,
                frame.rotation
            );
        }
    }

    if preview.completed {
        info!("{} finished after {} ticks", kind, preview.frames.len() - 1);
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("No config found at {}", path.display());
    }
    let config = AnimationConfig::load(path)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    print!("{}", config.to_toml()?);
    info!("{} is valid", path.display());
    Ok(())
}

fn parse_vec2(s: &str) -> std::result::Result<Vec2, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{}`", s))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad x: {}", e))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("bad y: {}", e))?;
    Ok(Vec2::new(x, y))
}
