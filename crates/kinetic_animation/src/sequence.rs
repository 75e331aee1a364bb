//! Sequenced animations
//!
//! A [`Sequence`] is an ordered list of steps played strictly one after the
//! other: property changes, waits, and inline callbacks. Steps are appended
//! with chained builder calls and frozen by the first [`Sequence::play`].
//!
//! ```ignore
//! let seq = Sequence::new()
//!     .fade(&target, 0.0, 1.0, 0.25, Easing::EaseOutCubic)
//!     .delay(0.5)
//!     .callback(|| println!("visible"))
//!     .move_to(&target, from, to, 0.3, Easing::EaseInOutQuad);
//! seq.play(&mut scheduler)?;
//! ```

use crate::animator::{AnimationSpec, AnimationState, PropertyAnimator, PropertyChange, Tween};
use crate::callback::{CancelToken, Callback};
use crate::config::PresetDefaults;
use crate::easing::Easing;
use crate::error::{AnimationError, Result};
use crate::presets::{PresetCall, PresetPlan, PresetStep};
use crate::scheduler::Scheduler;
use crate::target::{TargetRef, Vec2};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One step of a sequence
pub enum AnimationStep {
    /// Interpolate a property; the step's own delay is honored
    Property(Tween),
    /// Wait for the given number of seconds
    Delay(f32),
    /// Run inline, then continue immediately
    Callback(Callback),
    /// Build a preset from the target's values when reached, then play it
    /// to the end
    Preset(PresetCall),
}

impl AnimationStep {
    /// Seconds this step occupies on the timeline
    pub fn duration(&self) -> f32 {
        match self {
            AnimationStep::Property(tween) => tween.total_duration(),
            AnimationStep::Delay(seconds) => seconds.max(0.0),
            AnimationStep::Callback(_) => 0.0,
            AnimationStep::Preset(call) => call.step.total_duration(&call.defaults),
        }
    }
}

impl fmt::Debug for AnimationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationStep::Property(tween) => f.debug_tuple("Property").field(tween).finish(),
            AnimationStep::Delay(seconds) => f.debug_tuple("Delay").field(seconds).finish(),
            AnimationStep::Callback(_) => f.write_str("Callback"),
            AnimationStep::Preset(call) => f.debug_tuple("Preset").field(&call.step.kind).finish(),
        }
    }
}

struct SequenceInner {
    steps: Vec<AnimationStep>,
    on_complete: Option<Callback>,
    frozen: bool,
    /// Token of the current run, `None` when idle
    run: Option<CancelToken>,
}

/// An ordered animation timeline.
///
/// Cloning yields another handle to the same sequence.
#[derive(Clone)]
pub struct Sequence {
    inner: Arc<Mutex<SequenceInner>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SequenceInner {
                steps: Vec::new(),
                on_complete: None,
                frozen: false,
                run: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SequenceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a step. Fails once the sequence has been played.
    pub fn try_push(&self, step: AnimationStep) -> Result<()> {
        let mut inner = self.lock();
        if inner.frozen {
            return Err(AnimationError::SequenceFrozen);
        }
        inner.steps.push(step);
        Ok(())
    }

    fn push(self, step: AnimationStep) -> Self {
        if let Err(err) = self.try_push(step) {
            tracing::warn!("dropping sequence step: {}", err);
        }
        self
    }

    pub fn property(self, tween: Tween) -> Self {
        self.push(AnimationStep::Property(tween))
    }

    pub fn fade(
        self,
        target: &TargetRef,
        from: f32,
        to: f32,
        duration: f32,
        easing: Easing,
    ) -> Self {
        let change = PropertyChange::Opacity { from, to };
        self.property(Tween::new(target.clone(), change, duration).easing(easing))
    }

    pub fn move_to(
        self,
        target: &TargetRef,
        from: Vec2,
        to: Vec2,
        duration: f32,
        easing: Easing,
    ) -> Self {
        let change = PropertyChange::Position { from, to };
        self.property(Tween::new(target.clone(), change, duration).easing(easing))
    }

    pub fn scale(
        self,
        target: &TargetRef,
        from: Vec2,
        to: Vec2,
        duration: f32,
        easing: Easing,
    ) -> Self {
        let change = PropertyChange::Scale { from, to };
        self.property(Tween::new(target.clone(), change, duration).easing(easing))
    }

    /// Rotation in degrees
    pub fn rotate(
        self,
        target: &TargetRef,
        from: f32,
        to: f32,
        duration: f32,
        easing: Easing,
    ) -> Self {
        let change = PropertyChange::Rotation { from, to };
        self.property(Tween::new(target.clone(), change, duration).easing(easing))
    }

    pub fn delay(self, seconds: f32) -> Self {
        self.push(AnimationStep::Delay(seconds))
    }

    pub fn callback<F: FnMut() + Send + 'static>(self, f: F) -> Self {
        self.push(AnimationStep::Callback(Box::new(f)))
    }

    /// Play a preset on `target` once the previous step is done
    pub fn preset(self, target: &TargetRef, step: PresetStep, defaults: &PresetDefaults) -> Self {
        self.push(AnimationStep::Preset(PresetCall {
            target: target.clone(),
            step,
            defaults: defaults.clone(),
        }))
    }

    /// Run `f` each time the sequence finishes naturally
    pub fn on_complete<F: FnMut() + Send + 'static>(self, f: F) -> Self {
        self.lock().on_complete = Some(Box::new(f));
        self
    }

    /// Start playing on `scheduler`.
    ///
    /// Steps without a delay begin immediately. Fails with
    /// [`AnimationError::ReentrantPlay`] while a previous run is in progress.
    pub fn play(&self, scheduler: &mut Scheduler) -> Result<()> {
        let token = {
            let mut inner = self.lock();
            if inner.run.is_some() {
                tracing::warn!("sequence is already playing, ignoring play");
                return Err(AnimationError::ReentrantPlay);
            }
            inner.frozen = true;
            let token = CancelToken::new();
            inner.run = Some(token.clone());
            token
        };

        tracing::debug!(steps = self.len(), "sequence started");
        let playback = SequencePlayback::new(self.clone(), token, scheduler.now());
        scheduler.spawn_timeline(playback);
        Ok(())
    }

    /// Halt the current run without firing the completion callback.
    /// Returns false if the sequence was not playing.
    pub fn stop(&self) -> bool {
        match self.lock().run.take() {
            Some(token) => {
                token.cancel();
                tracing::debug!("sequence stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().run.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().steps.is_empty()
    }

    /// Sum of every step's delay and duration, in seconds
    pub fn total_duration(&self) -> f32 {
        self.lock().steps.iter().map(AnimationStep::duration).sum()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Sequence")
            .field("steps", &inner.steps)
            .field("playing", &inner.run.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlaybackStatus {
    Running,
    Finished,
    Halted,
}

enum Phase {
    /// Ready to start the step at `cursor` at clock time `at`
    Ready { at: f64 },
    Delaying { until: f64 },
    Animating(PropertyAnimator),
    /// A multi-step preset running under this playback's token
    Nested(Box<SequencePlayback>),
}

enum NextStep {
    Done,
    Property(Tween),
    Delay(f32),
    Callback(Callback),
    Preset(PresetCall),
}

/// One run of a [`Sequence`], stepped by the scheduler
pub(crate) struct SequencePlayback {
    sequence: Sequence,
    token: CancelToken,
    cursor: usize,
    phase: Phase,
    /// Clock time the last step resolved at, once finished
    ended_at: f64,
}

impl SequencePlayback {
    pub(crate) fn new(sequence: Sequence, token: CancelToken, now: f64) -> Self {
        Self {
            sequence,
            token,
            cursor: 0,
            phase: Phase::Ready { at: now },
            ended_at: now,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Resolve as many steps as `now` allows, in order
    pub(crate) fn advance(&mut self, now: f64) -> PlaybackStatus {
        loop {
            if self.token.is_cancelled() {
                self.cancel_phase();
                return PlaybackStatus::Halted;
            }

            match &mut self.phase {
                Phase::Ready { at } => {
                    let at = *at;
                    match self.next_step() {
                        NextStep::Done => return self.finish(at),
                        NextStep::Delay(seconds) => {
                            self.phase = Phase::Delaying {
                                until: at + seconds.max(0.0) as f64,
                            };
                        }
                        NextStep::Callback(callback) => {
                            self.run_callback(callback);
                            self.cursor += 1;
                        }
                        NextStep::Property(tween) => {
                            if tween.target.is_valid() {
                                self.begin_property(tween, at);
                            } else {
                                self.skip_unavailable();
                            }
                        }
                        NextStep::Preset(call) => {
                            if call.target.is_valid() {
                                self.begin_preset(call, at);
                            } else {
                                self.skip_unavailable();
                            }
                        }
                    }
                }
                Phase::Delaying { until } => {
                    if now < *until {
                        return PlaybackStatus::Running;
                    }
                    let at = *until;
                    self.cursor += 1;
                    self.phase = Phase::Ready { at };
                }
                Phase::Animating(animator) => match animator.advance(now) {
                    AnimationState::Completed => {
                        let at = animator.scheduled_end().min(now);
                        self.cursor += 1;
                        self.phase = Phase::Ready { at };
                    }
                    AnimationState::Cancelled => return PlaybackStatus::Halted,
                    AnimationState::Pending | AnimationState::Running => {
                        return PlaybackStatus::Running
                    }
                },
                Phase::Nested(playback) => match playback.advance(now) {
                    PlaybackStatus::Finished => {
                        let at = playback.ended_at.min(now);
                        self.cursor += 1;
                        self.phase = Phase::Ready { at };
                    }
                    status => return status,
                },
            }
        }
    }

    /// Stop this run. The sequence becomes playable again.
    pub(crate) fn halt(&mut self) {
        self.token.cancel();
        self.cancel_phase();
        self.release();
    }

    fn cancel_phase(&mut self) {
        match &mut self.phase {
            Phase::Animating(animator) => animator.cancel(),
            Phase::Nested(playback) => playback.halt(),
            Phase::Ready { .. } | Phase::Delaying { .. } => {}
        }
    }

    fn begin_property(&mut self, tween: Tween, at: f64) {
        let spec = AnimationSpec::new(tween);
        let animator = PropertyAnimator::with_token(spec, at, self.token.clone());
        self.phase = Phase::Animating(animator);
    }

    fn begin_preset(&mut self, call: PresetCall, at: f64) {
        tracing::debug!(
            step = self.cursor,
            preset = %call.step.kind,
            "sequence preset step"
        );
        self.phase = match call.build() {
            PresetPlan::Single(spec) => {
                Phase::Animating(PropertyAnimator::with_token(spec, at, self.token.clone()))
            }
            PresetPlan::Timeline(sequence) => {
                let nested = SequencePlayback::new(sequence, self.token.clone(), at);
                Phase::Nested(Box::new(nested))
            }
        };
    }

    fn skip_unavailable(&mut self) {
        tracing::warn!(
            step = self.cursor,
            "skipping sequence step: target is no longer available"
        );
        self.cursor += 1;
    }

    fn release(&self) {
        let mut inner = self.sequence.lock();
        if inner.run.as_ref().is_some_and(|run| run.same_as(&self.token)) {
            inner.run = None;
        }
    }

    fn next_step(&self) -> NextStep {
        let mut inner = self.sequence.lock();
        match inner.steps.get_mut(self.cursor) {
            None => NextStep::Done,
            Some(AnimationStep::Property(tween)) => NextStep::Property(tween.clone()),
            Some(AnimationStep::Delay(seconds)) => NextStep::Delay(*seconds),
            Some(AnimationStep::Preset(call)) => NextStep::Preset(call.clone()),
            // Taken out so the lock is not held while it runs
            Some(AnimationStep::Callback(callback)) => {
                NextStep::Callback(std::mem::replace(callback, Box::new(|| {})))
            }
        }
    }

    fn run_callback(&self, mut callback: Callback) {
        if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            tracing::error!(step = self.cursor, "sequence callback panicked");
        }
        let mut inner = self.sequence.lock();
        if let Some(AnimationStep::Callback(slot)) = inner.steps.get_mut(self.cursor) {
            *slot = callback;
        }
    }

    fn finish(&mut self, at: f64) -> PlaybackStatus {
        self.ended_at = at;
        self.release();
        let on_complete = self.sequence.lock().on_complete.take();
        if let Some(mut callback) = on_complete {
            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                tracing::error!("sequence completion callback panicked");
            }
            let mut inner = self.sequence.lock();
            if inner.on_complete.is_none() {
                inner.on_complete = Some(callback);
            }
        }
        tracing::debug!(steps = self.cursor, "sequence finished");
        PlaybackStatus::Finished
    }
}
