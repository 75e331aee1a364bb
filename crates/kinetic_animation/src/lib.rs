//! Kinetic Animation Engine
//!
//! Tick-driven property animation for UI-like objects: opacity, position,
//! scale and rotation.
//!
//! # Features
//!
//! - **Easing**: the Penner curve set with exact endpoints
//! - **Scheduler**: cooperative per-frame driver with cancellable handles
//! - **Sequences**: ordered steps (tweens, waits, callbacks) on one timeline
//! - **Presets**: fades, slides, scales, bounces, pulse and shake, relative to
//!   the target's current state, staggered across groups or chained on one
//!   target
//! - **Fault containment**: a misbehaving animation completes itself instead
//!   of taking the frame down
//!
//! # Example
//!
//! ```ignore
//! use kinetic_animation::{presets, AnimationSpec, Easing, NodeState, PresetParams, Scheduler, TargetRef};
//!
//! let mut scheduler = Scheduler::new();
//! let node = NodeState::new().shared();
//! let target = TargetRef::new(&node);
//!
//! scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 0.3).easing(Easing::EaseOutCubic));
//! presets::shake(&mut scheduler, &target, PresetParams::new());
//!
//! // Each frame
//! scheduler.advance(1.0 / 60.0);
//! ```

pub mod animator;
pub mod callback;
pub mod config;
pub mod easing;
pub mod error;
pub mod presets;
pub mod scheduler;
pub mod sequence;
pub mod target;

pub use animator::{AnimationSpec, AnimationState, PropertyAnimator, PropertyChange, Tween};
pub use callback::{Callback, CancelToken, Completion};
pub use config::{AnimationConfig, PresetDefaults, SchedulerConfig};
pub use easing::Easing;
pub use error::{AnimationError, ConfigError, Result};
pub use presets::{
    Edge, PresetCall, PresetKind, PresetOutcome, PresetParams, PresetPlan, PresetStep, Presets,
    CATALOG,
};
pub use scheduler::{AnimationId, Scheduler, TimelineId};
pub use sequence::{AnimationStep, Sequence};
pub use target::{
    AnimationTarget, Interpolate, NodeState, Property, PropertyValue, SharedTarget, TargetRef, Vec2,
};
