//! Headless preset preview
//!
//! Plays one preset on an in-memory node and samples its state after every
//! tick.

use anyhow::{ensure, Result};
use kinetic_animation::{
    NodeState, PresetKind, PresetOutcome, PresetParams, Presets, Scheduler, SchedulerConfig,
    TargetRef, Vec2,
};
use serde::Serialize;

/// Preview settings
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub fps: u32,
    /// Hard stop in seconds
    pub seconds: f32,
    pub duration: Option<f32>,
    pub delay: f32,
    pub amount: Option<f32>,
    /// Where the node rests before the preset starts
    pub origin: Vec2,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            fps: 60,
            seconds: 5.0,
            duration: None,
            delay: 0.0,
            amount: None,
            origin: Vec2::ZERO,
        }
    }
}

/// Node state after one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub time: f64,
    pub opacity: f32,
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Frame {
    fn sample(scheduler: &Scheduler, node: &NodeState) -> Self {
        Self {
            tick: scheduler.tick_count(),
            time: scheduler.now(),
            opacity: node.opacity,
            position: node.position,
            scale: node.scale,
            rotation: node.rotation,
        }
    }
}

/// Result of a preview run
#[derive(Debug)]
pub struct Preview {
    pub frames: Vec<Frame>,
    pub completed: bool,
}

pub fn run(
    kind: PresetKind,
    presets: &Presets,
    scheduler_config: SchedulerConfig,
    options: &PreviewOptions,
) -> Result<Preview> {
    ensure!(options.fps > 0, "fps must be positive");
    ensure!(
        options.seconds.is_finite() && options.seconds > 0.0,
        "seconds must be a positive number"
    );

    let mut scheduler = Scheduler::with_config(scheduler_config);
    let node = NodeState::at(options.origin).shared();
    let target = TargetRef::new(&node);

    let mut params = PresetParams::new().delay(options.delay);
    if let Some(duration) = options.duration {
        params = params.duration(duration);
    }
    if let Some(amount) = options.amount {
        params = params.amount(amount);
    }

    let outcome = presets.play(&mut scheduler, kind, &target, params);
    if let PresetOutcome::Handle(id) = &outcome {
        ensure!(id.is_valid(), "preset {} did not start", kind);
    }
    tracing::debug!(preset = %kind, ?outcome, "preview started");

    let dt = 1.0 / options.fps as f32;
    let max_ticks = (options.seconds * options.fps as f32).ceil() as u64;
    let mut frames = Vec::new();
    frames.push(Frame::sample(&scheduler, &lock(&node)));

    while scheduler.has_active_animations() && scheduler.tick_count() < max_ticks {
        scheduler.advance(dt);
        frames.push(Frame::sample(&scheduler, &lock(&node)));
    }

    let completed = !scheduler.has_active_animations();
    if !completed {
        tracing::warn!(
            preset = %kind,
            seconds = options.seconds,
            "preview cut off before the preset finished"
        );
    }
    Ok(Preview { frames, completed })
}

fn lock(node: &std::sync::Mutex<NodeState>) -> NodeState {
    node.lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}
