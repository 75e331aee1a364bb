//! Animation presets for common entry/exit effects
//!
//! Every preset computes its geometry from the target's current values when
//! invoked, so a slide-in ends where the target already sits and a pulse
//! returns to the scale it started at.
//!
//! Single-step presets start on the scheduler and return an [`AnimationId`].
//! Multi-step presets (pulse, shake, fade+slide) play a [`Sequence`] and hand
//! it back; stop them through the sequence.
//!
//! [`Presets::stagger`] plays one preset across many targets with growing
//! delays, and [`Presets::chain`] plays several presets on one target back to
//! back.

use crate::animator::AnimationSpec;
use crate::callback::Completion;
use crate::config::PresetDefaults;
use crate::easing::Easing;
use crate::error::{AnimationError, Result};
use crate::scheduler::{AnimationId, Scheduler};
use crate::sequence::Sequence;
use crate::target::{TargetRef, Vec2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Screen edge a slide comes from or goes to. Y grows downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    /// Offset from the resting position toward this edge
    pub fn offset(self, distance: f32) -> Vec2 {
        match self {
            Edge::Left => Vec2::new(-distance, 0.0),
            Edge::Right => Vec2::new(distance, 0.0),
            Edge::Top => Vec2::new(0.0, -distance),
            Edge::Bottom => Vec2::new(0.0, distance),
        }
    }
}

/// Every preset the catalog knows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresetKind {
    FadeIn,
    FadeOut,
    SlideIn(Edge),
    SlideOut(Edge),
    ScaleIn,
    ScaleOut,
    RotateIn,
    RotateOut,
    BounceIn,
    BounceOut,
    Pulse,
    Shake,
    FadeSlideIn(Edge),
    FadeSlideOut(Edge),
}

/// The full preset catalog in display order
pub const CATALOG: [PresetKind; 26] = [
    PresetKind::FadeIn,
    PresetKind::FadeOut,
    PresetKind::SlideIn(Edge::Left),
    PresetKind::SlideIn(Edge::Right),
    PresetKind::SlideIn(Edge::Top),
    PresetKind::SlideIn(Edge::Bottom),
    PresetKind::SlideOut(Edge::Left),
    PresetKind::SlideOut(Edge::Right),
    PresetKind::SlideOut(Edge::Top),
    PresetKind::SlideOut(Edge::Bottom),
    PresetKind::ScaleIn,
    PresetKind::ScaleOut,
    PresetKind::RotateIn,
    PresetKind::RotateOut,
    PresetKind::BounceIn,
    PresetKind::BounceOut,
    PresetKind::Pulse,
    PresetKind::Shake,
    PresetKind::FadeSlideIn(Edge::Left),
    PresetKind::FadeSlideIn(Edge::Right),
    PresetKind::FadeSlideIn(Edge::Top),
    PresetKind::FadeSlideIn(Edge::Bottom),
    PresetKind::FadeSlideOut(Edge::Left),
    PresetKind::FadeSlideOut(Edge::Right),
    PresetKind::FadeSlideOut(Edge::Top),
    PresetKind::FadeSlideOut(Edge::Bottom),
];

fn name_table() -> &'static FxHashMap<&'static str, PresetKind> {
    static TABLE: OnceLock<FxHashMap<&'static str, PresetKind>> = OnceLock::new();
    TABLE.get_or_init(|| CATALOG.iter().map(|kind| (kind.name(), *kind)).collect())
}

impl PresetKind {
    pub fn name(self) -> &'static str {
        use Edge::*;
        use PresetKind::*;
        match self {
            FadeIn => "fade_in",
            FadeOut => "fade_out",
            SlideIn(Left) => "slide_in_left",
            SlideIn(Right) => "slide_in_right",
            SlideIn(Top) => "slide_in_top",
            SlideIn(Bottom) => "slide_in_bottom",
            SlideOut(Left) => "slide_out_left",
            SlideOut(Right) => "slide_out_right",
            SlideOut(Top) => "slide_out_top",
            SlideOut(Bottom) => "slide_out_bottom",
            ScaleIn => "scale_in",
            ScaleOut => "scale_out",
            RotateIn => "rotate_in",
            RotateOut => "rotate_out",
            BounceIn => "bounce_in",
            BounceOut => "bounce_out",
            Pulse => "pulse",
            Shake => "shake",
            FadeSlideIn(Left) => "fade_slide_in_left",
            FadeSlideIn(Right) => "fade_slide_in_right",
            FadeSlideIn(Top) => "fade_slide_in_top",
            FadeSlideIn(Bottom) => "fade_slide_in_bottom",
            FadeSlideOut(Left) => "fade_slide_out_left",
            FadeSlideOut(Right) => "fade_slide_out_right",
            FadeSlideOut(Top) => "fade_slide_out_top",
            FadeSlideOut(Bottom) => "fade_slide_out_bottom",
        }
    }

    /// Resolve a catalog name such as `"slide_in_left"`
    pub fn from_name(name: &str) -> Result<PresetKind> {
        name_table()
            .get(name)
            .copied()
            .ok_or_else(|| AnimationError::UnknownPreset(name.to_string()))
    }

    /// Whether the preset plays as a multi-step sequence
    pub fn is_timeline(self) -> bool {
        matches!(
            self,
            PresetKind::Pulse
                | PresetKind::Shake
                | PresetKind::FadeSlideIn(_)
                | PresetKind::FadeSlideOut(_)
        )
    }

    /// Duration used when [`PresetParams::duration`] is unset
    pub fn default_duration(self, defaults: &PresetDefaults) -> f32 {
        match self {
            PresetKind::BounceIn | PresetKind::BounceOut => defaults.bounce_duration,
            PresetKind::RotateIn | PresetKind::RotateOut => defaults.rotate_duration,
            _ => defaults.duration,
        }
    }

    /// Magnitude used when [`PresetParams::amount`] is unset. Its meaning
    /// depends on the preset: distance, scale factor, angle or intensity.
    pub fn default_amount(self, defaults: &PresetDefaults) -> Option<f32> {
        match self {
            PresetKind::FadeIn | PresetKind::FadeOut => None,
            PresetKind::SlideIn(_)
            | PresetKind::SlideOut(_)
            | PresetKind::FadeSlideIn(_)
            | PresetKind::FadeSlideOut(_) => Some(defaults.distance),
            PresetKind::ScaleIn | PresetKind::ScaleOut => Some(defaults.scale_from),
            PresetKind::BounceIn | PresetKind::BounceOut => Some(defaults.bounce_from),
            PresetKind::RotateIn | PresetKind::RotateOut => Some(defaults.rotate_angle),
            PresetKind::Pulse => Some(defaults.pulse_intensity),
            PresetKind::Shake => Some(defaults.shake_intensity),
        }
    }

    /// Curve used unless [`PresetParams::easing`] overrides it. A pulse
    /// settles back with the matching ease-in curve.
    pub fn default_easing(self) -> Easing {
        match self {
            PresetKind::FadeIn | PresetKind::SlideIn(_) | PresetKind::FadeSlideIn(_) => {
                Easing::EaseOutCubic
            }
            PresetKind::FadeOut | PresetKind::SlideOut(_) | PresetKind::FadeSlideOut(_) => {
                Easing::EaseInCubic
            }
            PresetKind::ScaleIn => Easing::EaseOutBack,
            PresetKind::ScaleOut => Easing::EaseInBack,
            PresetKind::RotateIn => Easing::EaseOutQuart,
            PresetKind::RotateOut => Easing::EaseInQuart,
            PresetKind::BounceIn => Easing::EaseOutBounce,
            PresetKind::BounceOut => Easing::EaseInBounce,
            PresetKind::Pulse => Easing::EaseOutQuad,
            PresetKind::Shake => Easing::EaseInOutQuad,
        }
    }

    /// Build the preset against the target's current values without playing it
    pub fn build(
        self,
        target: &TargetRef,
        params: PresetParams,
        defaults: &PresetDefaults,
    ) -> PresetPlan {
        let r = Resolved::new(self, &params, defaults);
        let current = Current::read(target);
        match self.single_spec(target, &current, r) {
            Some(spec) => {
                let spec = r.finish(spec, self.default_easing());
                PresetPlan::Single(spec.with_completion(params.on_complete))
            }
            None => {
                let lead = lead_in(r, params.on_complete);
                PresetPlan::Timeline(self.timeline_steps(lead, target, &current, r))
            }
        }
    }

    /// Spec for single-step presets, `None` for the multi-step ones
    fn single_spec(self, target: &TargetRef, at: &Current, r: Resolved) -> Option<AnimationSpec> {
        let d = r.duration;
        let spec = match self {
            PresetKind::FadeIn => AnimationSpec::fade(target, 0.0, 1.0, d),
            PresetKind::FadeOut => AnimationSpec::fade(target, 1.0, 0.0, d),
            PresetKind::SlideIn(edge) => {
                let from = at.position + edge.offset(r.amount);
                AnimationSpec::move_to(target, from, at.position, d)
            }
            PresetKind::SlideOut(edge) => {
                let to = at.position + edge.offset(r.amount);
                AnimationSpec::move_to(target, at.position, to, d)
            }
            PresetKind::ScaleIn | PresetKind::BounceIn => {
                AnimationSpec::scale(target, at.scale * r.amount, at.scale, d)
            }
            PresetKind::ScaleOut | PresetKind::BounceOut => {
                AnimationSpec::scale(target, at.scale, at.scale * r.amount, d)
            }
            PresetKind::RotateIn => {
                AnimationSpec::rotate(target, at.rotation - r.amount, at.rotation, d)
            }
            PresetKind::RotateOut => {
                AnimationSpec::rotate(target, at.rotation, at.rotation + r.amount, d)
            }
            PresetKind::Pulse
            | PresetKind::Shake
            | PresetKind::FadeSlideIn(_)
            | PresetKind::FadeSlideOut(_) => return None,
        };
        Some(spec)
    }

    fn timeline_steps(
        self,
        sequence: Sequence,
        target: &TargetRef,
        at: &Current,
        r: Resolved,
    ) -> Sequence {
        let easing = r.ease(self.default_easing());
        match self {
            PresetKind::Pulse => {
                let peak = at.scale * r.amount;
                let half = r.duration / 2.0;
                let settle = r.ease(Easing::EaseInQuad);
                sequence
                    .scale(target, at.scale, peak, half, easing)
                    .scale(target, peak, at.scale, half, settle)
            }
            PresetKind::Shake => {
                let step = r.duration / 6.0;
                let i = r.amount;
                let mut from = at.position;
                let mut sequence = sequence;
                for dx in [i, -i, i * 0.5, -i * 0.5, i * 0.25, 0.0] {
                    let to = at.position + Vec2::new(dx, 0.0);
                    sequence = sequence.move_to(target, from, to, step, easing);
                    from = to;
                }
                sequence
            }
            PresetKind::FadeSlideIn(edge) => {
                let start = at.position + edge.offset(r.amount);
                let half = r.duration / 2.0;
                sequence
                    .move_to(target, start, start, 0.0, Easing::Linear)
                    .fade(target, 0.0, 1.0, half, easing)
                    .move_to(target, start, at.position, half, easing)
            }
            PresetKind::FadeSlideOut(edge) => {
                let end = at.position + edge.offset(r.amount);
                let half = r.duration / 2.0;
                sequence
                    .fade(target, 1.0, 0.0, half, easing)
                    .move_to(target, at.position, end, half, easing)
            }
            _ => sequence,
        }
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-invocation overrides. Unset fields fall back to [`PresetDefaults`].
#[derive(Debug, Default)]
pub struct PresetParams {
    pub duration: Option<f32>,
    pub delay: f32,
    /// Distance, scale factor, angle or intensity depending on the preset
    pub amount: Option<f32>,
    /// Replaces the preset's own curve on every step
    pub easing: Option<Easing>,
    pub on_complete: Completion,
}

impl PresetParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    pub fn amount(mut self, amount: f32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn on_complete<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_complete = Completion::new(f);
        self
    }
}

/// One preset invocation inside a chain or a staggered group
#[derive(Clone, Copy, Debug)]
pub struct PresetStep {
    pub kind: PresetKind,
    pub duration: Option<f32>,
    pub delay: f32,
    pub easing: Option<Easing>,
    pub amount: Option<f32>,
}

impl PresetStep {
    pub fn new(kind: PresetKind) -> Self {
        Self {
            kind,
            duration: None,
            delay: 0.0,
            easing: None,
            amount: None,
        }
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn amount(mut self, amount: f32) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Parameters for one invocation, with no completion callback
    pub fn params(&self) -> PresetParams {
        PresetParams {
            duration: self.duration,
            delay: self.delay,
            amount: self.amount,
            easing: self.easing,
            on_complete: Completion::none(),
        }
    }

    /// Delay plus duration once defaults are applied
    pub fn total_duration(&self, defaults: &PresetDefaults) -> f32 {
        let kind = self.kind;
        let duration = self
            .duration
            .unwrap_or_else(|| kind.default_duration(defaults));
        self.delay.max(0.0) + duration.max(0.0)
    }
}

impl From<PresetKind> for PresetStep {
    fn from(kind: PresetKind) -> Self {
        PresetStep::new(kind)
    }
}

/// A preset bound to its target, built when a sequence reaches it
#[derive(Clone, Debug)]
pub struct PresetCall {
    pub target: TargetRef,
    pub step: PresetStep,
    pub defaults: PresetDefaults,
}

impl PresetCall {
    pub fn build(&self) -> PresetPlan {
        let params = self.step.params();
        self.step.kind.build(&self.target, params, &self.defaults)
    }
}

/// A built preset, not yet started
#[derive(Debug)]
pub enum PresetPlan {
    Single(AnimationSpec),
    Timeline(Sequence),
}

impl PresetPlan {
    pub fn play(self, scheduler: &mut Scheduler) -> PresetOutcome {
        match self {
            PresetPlan::Single(spec) => PresetOutcome::Handle(scheduler.start(spec)),
            PresetPlan::Timeline(sequence) => {
                if let Err(err) = sequence.play(scheduler) {
                    tracing::warn!("preset sequence did not start: {}", err);
                }
                PresetOutcome::Timeline(sequence)
            }
        }
    }
}

/// What a played preset hands back
#[derive(Debug)]
pub enum PresetOutcome {
    /// Cancellable through [`Scheduler::stop`]
    Handle(AnimationId),
    /// Cancellable through [`Sequence::stop`]
    Timeline(Sequence),
}

impl PresetOutcome {
    pub fn id(&self) -> Option<AnimationId> {
        match self {
            PresetOutcome::Handle(id) => Some(*id),
            PresetOutcome::Timeline(_) => None,
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            PresetOutcome::Handle(_) => None,
            PresetOutcome::Timeline(sequence) => Some(sequence),
        }
    }
}

/// Fires one callback after a fixed number of members have finished
struct GroupCompletion {
    remaining: AtomicUsize,
    on_all_complete: Mutex<Completion>,
}

impl GroupCompletion {
    fn finish_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut completion = {
            let mut slot = self
                .on_all_complete
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *slot)
        };
        completion.fire();
    }
}

/// Preset player carrying configured defaults
#[derive(Clone, Debug, Default)]
pub struct Presets {
    defaults: PresetDefaults,
}

impl Presets {
    pub fn new(defaults: PresetDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &PresetDefaults {
        &self.defaults
    }

    pub fn play(
        &self,
        scheduler: &mut Scheduler,
        kind: PresetKind,
        target: &TargetRef,
        params: PresetParams,
    ) -> PresetOutcome {
        tracing::debug!(preset = %kind, "playing preset");
        kind.build(target, params, &self.defaults).play(scheduler)
    }

    /// Play a preset by catalog name
    pub fn play_named(
        &self,
        scheduler: &mut Scheduler,
        name: &str,
        target: &TargetRef,
        params: PresetParams,
    ) -> Result<PresetOutcome> {
        let kind = PresetKind::from_name(name)?;
        Ok(self.play(scheduler, kind, target, params))
    }

    /// Play `step` on every target, each one `stagger` seconds after the one
    /// before it.
    ///
    /// `on_all_complete` runs once when the last member finishes, or right
    /// away for an empty slice. Members whose target is already gone count as
    /// finished; a member stopped by hand never finishes.
    pub fn stagger<F>(
        &self,
        scheduler: &mut Scheduler,
        targets: &[TargetRef],
        step: PresetStep,
        stagger: f32,
        on_all_complete: F,
    ) -> Vec<PresetOutcome>
    where
        F: FnOnce() + Send + 'static,
    {
        if targets.is_empty() {
            Completion::new(on_all_complete).fire();
            return Vec::new();
        }

        let group = Arc::new(GroupCompletion {
            remaining: AtomicUsize::new(targets.len()),
            on_all_complete: Mutex::new(Completion::new(on_all_complete)),
        });
        let stagger = stagger.max(0.0);
        let mut outcomes = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            let member = step.delay(step.delay + i as f32 * stagger);
            let done = group.clone();
            let params = member.params().on_complete(move || done.finish_one());
            let outcome = self.play(scheduler, member.kind, target, params);
            // A rejected start drops its callback without running it
            if outcome.id() == Some(AnimationId::INVALID) {
                group.finish_one();
            }
            outcomes.push(outcome);
        }
        tracing::debug!(members = targets.len(), stagger, "staggered preset started");
        outcomes
    }

    /// Play `steps` on one target strictly one after another, then run
    /// `on_complete`.
    ///
    /// Each step reads the target when it begins, so it continues from where
    /// the previous step left the target.
    pub fn chain<F>(
        &self,
        scheduler: &mut Scheduler,
        target: &TargetRef,
        steps: &[PresetStep],
        on_complete: F,
    ) -> Result<Sequence>
    where
        F: FnOnce() + Send + 'static,
    {
        if !target.is_valid() {
            return Err(AnimationError::InvalidTarget);
        }

        let mut sequence = Sequence::new();
        for step in steps {
            sequence = sequence.preset(target, *step, &self.defaults);
        }
        let mut on_complete = Completion::new(on_complete);
        let sequence = sequence.on_complete(move || {
            on_complete.fire();
        });
        sequence.play(scheduler)?;
        tracing::debug!(steps = steps.len(), "preset chain started");
        Ok(sequence)
    }
}

// ============================================================================
// Typed entry points (default parameters)
// ============================================================================

fn start_single(
    scheduler: &mut Scheduler,
    kind: PresetKind,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    match kind.build(target, params, &PresetDefaults::default()) {
        PresetPlan::Single(spec) => scheduler.start(spec),
        PresetPlan::Timeline(_) => AnimationId::INVALID,
    }
}

fn start_timeline(
    scheduler: &mut Scheduler,
    kind: PresetKind,
    target: &TargetRef,
    params: PresetParams,
) -> Sequence {
    let plan = kind.build(target, params, &PresetDefaults::default());
    match plan.play(scheduler) {
        PresetOutcome::Timeline(sequence) => sequence,
        PresetOutcome::Handle(_) => Sequence::new(),
    }
}

pub fn fade_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::FadeIn, target, params)
}

pub fn fade_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::FadeOut, target, params)
}

/// Slide from `edge` back to the current position
pub fn slide_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    edge: Edge,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::SlideIn(edge), target, params)
}

/// Slide from the current position toward `edge`
pub fn slide_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    edge: Edge,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::SlideOut(edge), target, params)
}

pub fn scale_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::ScaleIn, target, params)
}

pub fn scale_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::ScaleOut, target, params)
}

pub fn rotate_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::RotateIn, target, params)
}

pub fn rotate_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::RotateOut, target, params)
}

pub fn bounce_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::BounceIn, target, params)
}

pub fn bounce_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    params: PresetParams,
) -> AnimationId {
    start_single(scheduler, PresetKind::BounceOut, target, params)
}

pub fn pulse(scheduler: &mut Scheduler, target: &TargetRef, params: PresetParams) -> Sequence {
    start_timeline(scheduler, PresetKind::Pulse, target, params)
}

pub fn shake(scheduler: &mut Scheduler, target: &TargetRef, params: PresetParams) -> Sequence {
    start_timeline(scheduler, PresetKind::Shake, target, params)
}

pub fn fade_slide_in(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    edge: Edge,
    params: PresetParams,
) -> Sequence {
    start_timeline(scheduler, PresetKind::FadeSlideIn(edge), target, params)
}

pub fn fade_slide_out(
    scheduler: &mut Scheduler,
    target: &TargetRef,
    edge: Edge,
    params: PresetParams,
) -> Sequence {
    start_timeline(scheduler, PresetKind::FadeSlideOut(edge), target, params)
}

// ============================================================================
// Builders
// ============================================================================

#[derive(Clone, Copy)]
struct Resolved {
    duration: f32,
    delay: f32,
    amount: f32,
    easing: Option<Easing>,
}

impl Resolved {
    fn new(kind: PresetKind, params: &PresetParams, defaults: &PresetDefaults) -> Self {
        Self {
            duration: params.duration.unwrap_or_else(|| kind.default_duration(defaults)),
            delay: params.delay.max(0.0),
            amount: params
                .amount
                .or_else(|| kind.default_amount(defaults))
                .unwrap_or(0.0),
            easing: params.easing,
        }
    }

    fn ease(&self, default: Easing) -> Easing {
        self.easing.unwrap_or(default)
    }

    /// Apply the delay and the easing to a single-step spec
    fn finish(&self, spec: AnimationSpec, default: Easing) -> AnimationSpec {
        let easing = self.ease(default);
        spec.delay(self.delay).easing(easing)
    }
}

/// Current geometry of the target. A dead target reads as a fresh node.
struct Current {
    position: Vec2,
    scale: Vec2,
    rotation: f32,
}

impl Current {
    fn read(target: &TargetRef) -> Self {
        Self {
            position: target.position().unwrap_or(Vec2::ZERO),
            scale: target.scale().unwrap_or(Vec2::ONE),
            rotation: target.rotation().unwrap_or(0.0),
        }
    }
}

/// Empty sequence with the leading delay and completion wired up
fn lead_in(r: Resolved, on_complete: Completion) -> Sequence {
    let mut on_complete = on_complete;
    let sequence = Sequence::new().on_complete(move || {
        on_complete.fire();
    });
    if r.delay > 0.0 {
        sequence.delay(r.delay)
    } else {
        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::NodeState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        (count, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn run(scheduler: &mut Scheduler, seconds: f32) {
        let dt = 1.0 / 60.0;
        let ticks = (seconds / dt).ceil() as usize + 1;
        for _ in 0..ticks {
            scheduler.advance(dt);
        }
    }

    #[test]
    fn test_catalog_names_resolve() {
        assert_eq!(CATALOG.len(), 26);
        for kind in CATALOG {
            assert_eq!(PresetKind::from_name(kind.name()), Ok(kind));
        }
        assert_eq!(
            PresetKind::from_name("wobble"),
            Err(AnimationError::UnknownPreset("wobble".to_string()))
        );
    }

    #[test]
    fn test_fade_in_animation() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let id = fade_in(&mut scheduler, &target, PresetParams::new());
        assert!(scheduler.is_active(id));

        // At start
        assert_eq!(node.lock().unwrap().opacity, 0.0);

        // At end
        run(&mut scheduler, 0.5);
        assert_eq!(node.lock().unwrap().opacity, 1.0);
        assert!(!scheduler.is_active(id));
    }

    #[test]
    fn test_slide_in_left_is_relative_to_current_position() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::at(Vec2::new(20.0, 30.0)).shared();
        let target = TargetRef::new(&node);

        slide_in(&mut scheduler, &target, Edge::Left, PresetParams::new().amount(50.0));

        // At start
        assert_eq!(node.lock().unwrap().position, Vec2::new(-30.0, 30.0));

        // At end
        run(&mut scheduler, 0.5);
        assert_eq!(node.lock().unwrap().position, Vec2::new(20.0, 30.0));
    }

    #[test]
    fn test_slide_out_bottom_moves_down() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::at(Vec2::new(0.0, 10.0)).shared();
        let target = TargetRef::new(&node);

        slide_out(&mut scheduler, &target, Edge::Bottom, PresetParams::new());
        run(&mut scheduler, 0.5);
        assert_eq!(node.lock().unwrap().position, Vec2::new(0.0, 110.0));
    }

    #[test]
    fn test_scale_in_has_overshoot() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        scale_in(&mut scheduler, &target, PresetParams::new());
        assert_eq!(node.lock().unwrap().scale, Vec2::splat(0.5));

        let mut peak = 0.0f32;
        for _ in 0..40 {
            scheduler.advance(1.0 / 60.0);
            peak = peak.max(node.lock().unwrap().scale.x);
        }
        assert!(peak > 1.0);
        assert_eq!(node.lock().unwrap().scale, Vec2::ONE);
    }

    #[test]
    fn test_rotate_in_ends_at_rest() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().with_rotation(15.0).shared();
        let target = TargetRef::new(&node);

        rotate_in(&mut scheduler, &target, PresetParams::new());
        assert_eq!(node.lock().unwrap().rotation, -165.0);

        run(&mut scheduler, 0.7);
        assert_eq!(node.lock().unwrap().rotation, 15.0);
    }

    #[test]
    fn test_bounce_out_uses_bounce_duration() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let id = bounce_out(&mut scheduler, &target, PresetParams::new());
        run(&mut scheduler, 0.6);
        assert!(scheduler.is_active(id));

        run(&mut scheduler, 0.25);
        assert!(!scheduler.is_active(id));
        assert!((node.lock().unwrap().scale.x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_pulse_returns_to_rest() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().with_scale(Vec2::splat(2.0)).shared();
        let target = TargetRef::new(&node);

        let seq = pulse(&mut scheduler, &target, PresetParams::new());
        assert!(seq.is_playing());
        assert_eq!(seq.len(), 2);

        run(&mut scheduler, 0.25);
        assert!((node.lock().unwrap().scale.x - 2.2).abs() < 0.05);

        run(&mut scheduler, 0.3);
        assert_eq!(node.lock().unwrap().scale, Vec2::splat(2.0));
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_shake_returns_to_origin() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::at(Vec2::new(5.0, 5.0)).shared();
        let target = TargetRef::new(&node);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let seq = shake(
            &mut scheduler,
            &target,
            PresetParams::new().on_complete(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(seq.len(), 6);

        let mut max_offset = 0.0f32;
        for _ in 0..40 {
            scheduler.advance(1.0 / 60.0);
            max_offset = max_offset.max((node.lock().unwrap().position.x - 5.0).abs());
        }
        assert!(max_offset > 5.0 && max_offset <= 10.0 + 1e-4);
        assert_eq!(node.lock().unwrap().position, Vec2::new(5.0, 5.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shake_with_delay_adds_leading_wait() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let seq = shake(&mut scheduler, &target, PresetParams::new().delay(0.2));
        assert_eq!(seq.len(), 7);
        assert!((seq.total_duration() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_fade_slide_in_places_then_fades_then_slides() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::at(Vec2::new(100.0, 100.0)).with_opacity(0.0).shared();
        let target = TargetRef::new(&node);

        fade_slide_in(&mut scheduler, &target, Edge::Top, PresetParams::new());
        assert_eq!(node.lock().unwrap().position, Vec2::new(100.0, 0.0));

        // Fade is nearly done while the slide has not started
        run(&mut scheduler, 0.2);
        {
            let node = node.lock().unwrap();
            assert!(node.opacity > 0.9);
            assert_eq!(node.position, Vec2::new(100.0, 0.0));
        }

        run(&mut scheduler, 0.3);
        let node = node.lock().unwrap();
        assert_eq!(node.opacity, 1.0);
        assert_eq!(node.position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_fade_slide_out_ends_hidden_and_offset() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        fade_slide_out(&mut scheduler, &target, Edge::Right, PresetParams::new().amount(30.0));
        run(&mut scheduler, 0.5);

        let node = node.lock().unwrap();
        assert_eq!(node.opacity, 0.0);
        assert_eq!(node.position, Vec2::new(30.0, 0.0));
    }

    #[test]
    fn test_presets_use_configured_defaults() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let presets = Presets::new(PresetDefaults {
            distance: 10.0,
            ..PresetDefaults::default()
        });

        let outcome = presets
            .play_named(&mut scheduler, "slide_out_left", &target, PresetParams::new())
            .unwrap();
        assert!(outcome.id().is_some());
        run(&mut scheduler, 0.5);
        assert_eq!(node.lock().unwrap().position, Vec2::new(-10.0, 0.0));
    }

    #[test]
    fn test_play_returns_shape_by_kind() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let presets = Presets::default();

        for kind in CATALOG {
            let outcome = presets.play(&mut scheduler, kind, &target, PresetParams::new());
            assert_eq!(outcome.sequence().is_some(), kind.is_timeline(), "{}", kind);
        }
        scheduler.stop_all();
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let result =
            Presets::default().play_named(&mut scheduler, "spin", &target, PresetParams::new());
        assert!(matches!(result, Err(AnimationError::UnknownPreset(name)) if name == "spin"));
    }

    #[test]
    fn test_dead_target_returns_invalid_handle() {
        let mut scheduler = Scheduler::new();
        let id = fade_out(&mut scheduler, &TargetRef::dangling(), PresetParams::new());
        assert_eq!(id, AnimationId::INVALID);
    }

    #[test]
    fn test_easing_override_applies_to_single_presets() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let params = PresetParams::new().duration(1.0).easing(Easing::Linear);
        rotate_out(&mut scheduler, &target, params);
        scheduler.advance(0.25);
        assert!((node.lock().unwrap().rotation - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_easing_override_applies_to_every_timeline_step() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let params = PresetParams::new().duration(1.0).easing(Easing::Linear);
        pulse(&mut scheduler, &target, params);
        scheduler.advance(0.25);
        assert!((node.lock().unwrap().scale.x - 1.05).abs() < 1e-4);

        // The settle half is linear too
        scheduler.advance(0.5);
        assert!((node.lock().unwrap().scale.x - 1.05).abs() < 1e-4);
    }

    #[test]
    fn test_stagger_offsets_members_and_completes_once() {
        let mut scheduler = Scheduler::new();
        let nodes: Vec<_> = (0..3).map(|_| NodeState::new().shared()).collect();
        let targets: Vec<TargetRef> = nodes.iter().map(TargetRef::new).collect();
        let (count, cb) = counter();

        let step = PresetStep::new(PresetKind::FadeIn).duration(0.2);
        let presets = Presets::default();
        let outcomes = presets.stagger(&mut scheduler, &targets, step, 0.1, cb);
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.id().unwrap().is_valid());
        }

        // Only the first member has begun
        assert_eq!(nodes[0].lock().unwrap().opacity, 0.0);
        assert_eq!(nodes[2].lock().unwrap().opacity, 1.0);

        scheduler.advance(0.25);
        assert_eq!(nodes[0].lock().unwrap().opacity, 1.0);
        assert!(nodes[2].lock().unwrap().opacity < 1.0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.advance(0.2);
        assert_eq!(nodes[2].lock().unwrap().opacity, 1.0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        run(&mut scheduler, 0.5);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stagger_with_no_targets_completes_immediately() {
        let mut scheduler = Scheduler::new();
        let (count, cb) = counter();

        let step = PresetStep::new(PresetKind::Pulse);
        let presets = Presets::default();
        let outcomes = presets.stagger(&mut scheduler, &[], step, 0.1, cb);
        assert!(outcomes.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has_active_animations());
    }

    #[test]
    fn test_stagger_counts_rejected_members_as_done() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let targets = [TargetRef::dangling(), TargetRef::new(&node)];
        let (count, cb) = counter();

        let step = PresetStep::new(PresetKind::FadeOut);
        let presets = Presets::default();
        let outcomes = presets.stagger(&mut scheduler, &targets, step, 0.1, cb);
        assert_eq!(outcomes[0].id(), Some(AnimationId::INVALID));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        run(&mut scheduler, 0.6);
        assert_eq!(node.lock().unwrap().opacity, 0.0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stagger_plays_sequence_presets() {
        let mut scheduler = Scheduler::new();
        let a = NodeState::new().shared();
        let b = NodeState::new().shared();
        let targets = [TargetRef::new(&a), TargetRef::new(&b)];
        let (count, cb) = counter();

        let step = PresetStep::new(PresetKind::Shake).duration(0.3);
        let presets = Presets::default();
        let outcomes = presets.stagger(&mut scheduler, &targets, step, 0.2, cb);
        assert!(outcomes.iter().all(|o| o.sequence().is_some()));
        // The second shake carries the stagger as a leading wait
        let second = outcomes[1].sequence().unwrap();
        assert!((second.total_duration() - 0.5).abs() < 1e-5);

        run(&mut scheduler, 0.4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        run(&mut scheduler, 0.2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(b.lock().unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_chain_runs_presets_back_to_back() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let (count, cb) = counter();

        let steps = [
            PresetStep::new(PresetKind::RotateOut)
                .duration(0.2)
                .easing(Easing::Linear),
            PresetStep::new(PresetKind::RotateOut)
                .duration(0.2)
                .delay(0.1)
                .easing(Easing::Linear),
        ];
        let presets = Presets::default();
        let seq = presets.chain(&mut scheduler, &target, &steps, cb).unwrap();
        assert_eq!(seq.len(), 2);
        assert!((seq.total_duration() - 0.5).abs() < 1e-5);

        scheduler.advance(0.1);
        assert!((node.lock().unwrap().rotation - 90.0).abs() < 1e-3);

        // The second step waits out its own delay first
        scheduler.advance(0.15);
        assert_eq!(node.lock().unwrap().rotation, 180.0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // It starts from where the first one stopped
        run(&mut scheduler, 0.3);
        assert_eq!(node.lock().unwrap().rotation, 360.0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_chain_waits_for_sequence_presets() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::at(Vec2::new(40.0, 0.0)).shared();
        let target = TargetRef::new(&node);
        let (count, cb) = counter();

        let steps = [
            PresetStep::new(PresetKind::FadeSlideIn(Edge::Left)).duration(0.4),
            PresetStep::new(PresetKind::Pulse).duration(0.2),
        ];
        let presets = Presets::default();
        let seq = presets.chain(&mut scheduler, &target, &steps, cb).unwrap();
        assert_eq!(node.lock().unwrap().position, Vec2::new(-60.0, 0.0));

        // Mid slide, the pulse has not touched the scale yet
        run(&mut scheduler, 0.3);
        assert_eq!(node.lock().unwrap().scale, Vec2::ONE);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        run(&mut scheduler, 0.3);
        let state = node.lock().unwrap().clone();
        assert_eq!(state.opacity, 1.0);
        assert_eq!(state.position, Vec2::new(40.0, 0.0));
        assert_eq!(state.scale, Vec2::ONE);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_chain_rejects_dead_target() {
        let mut scheduler = Scheduler::new();
        let (count, cb) = counter();

        let steps = [PresetStep::new(PresetKind::FadeIn)];
        let dead = TargetRef::dangling();
        let result = Presets::default().chain(&mut scheduler, &dead, &steps, cb);
        assert_eq!(result.err(), Some(AnimationError::InvalidTarget));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.playing_sequences(), 0);
    }

    #[test]
    fn test_empty_chain_completes_on_next_tick() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let (count, cb) = counter();

        let presets = Presets::default();
        let seq = presets.chain(&mut scheduler, &target, &[], cb).unwrap();
        assert!(seq.is_empty());

        scheduler.advance(1.0 / 60.0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!seq.is_playing());
    }
}
