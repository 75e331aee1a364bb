//! Property animator
//!
//! Interpolates one property of one target between two values. The animator
//! is an explicit state machine stepped by the scheduler clock:
//!
//! ```text
//! Pending (delay) -> Running -> Completed
//!        \              \
//!         `--------------`----> Cancelled
//! ```
//!
//! All failure handling happens here. A dropped or detached target, a
//! non-finite sample, or a panic anywhere inside a step force-completes the
//! animation: the end value is written if the target can still take it, the
//! completion callback fires once, and nothing propagates to the caller.

use crate::callback::{CancelToken, Completion};
use crate::easing::Easing;
use crate::error::AnimationError;
use crate::target::{Interpolate, Property, PropertyValue, TargetRef, Vec2};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Lifecycle of a single animation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationState {
    /// Waiting for its delay to elapse
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl AnimationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnimationState::Completed | AnimationState::Cancelled)
    }
}

/// Start and end values for one property
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyChange {
    Opacity { from: f32, to: f32 },
    Position { from: Vec2, to: Vec2 },
    Scale { from: Vec2, to: Vec2 },
    /// Degrees
    Rotation { from: f32, to: f32 },
}

impl PropertyChange {
    pub fn property(&self) -> Property {
        match self {
            PropertyChange::Opacity { .. } => Property::Opacity,
            PropertyChange::Position { .. } => Property::Position,
            PropertyChange::Scale { .. } => Property::Scale,
            PropertyChange::Rotation { .. } => Property::Rotation,
        }
    }

    pub fn start(&self) -> PropertyValue {
        self.value_at(0.0)
    }

    /// The exact end value, never an interpolated approximation
    pub fn end(&self) -> PropertyValue {
        match *self {
            PropertyChange::Opacity { to, .. } => PropertyValue::Opacity(to),
            PropertyChange::Position { to, .. } => PropertyValue::Position(to),
            PropertyChange::Scale { to, .. } => PropertyValue::Scale(to),
            PropertyChange::Rotation { to, .. } => PropertyValue::Rotation(to),
        }
    }

    /// Interpolated value at eased progress `p`
    pub fn value_at(&self, p: f32) -> PropertyValue {
        match *self {
            PropertyChange::Opacity { from, to } => PropertyValue::Opacity(f32::lerp(from, to, p)),
            PropertyChange::Position { from, to } => {
                PropertyValue::Position(Vec2::lerp(from, to, p))
            }
            PropertyChange::Scale { from, to } => PropertyValue::Scale(Vec2::lerp(from, to, p)),
            PropertyChange::Rotation { from, to } => {
                PropertyValue::Rotation(f32::lerp(from, to, p))
            }
        }
    }
}

/// One property interpolation: what to animate and how long.
///
/// Used both as the body of a scheduled [`AnimationSpec`] and as a
/// sequence step.
#[derive(Clone, Debug)]
pub struct Tween {
    pub target: TargetRef,
    pub change: PropertyChange,
    /// Seconds
    pub duration: f32,
    /// Seconds to wait before the first write
    pub delay: f32,
    pub easing: Easing,
}

impl Tween {
    pub fn new(target: TargetRef, change: PropertyChange, duration: f32) -> Self {
        Self {
            target,
            change,
            duration,
            delay: 0.0,
            easing: Easing::Linear,
        }
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Delay plus duration, ignoring negative values
    pub fn total_duration(&self) -> f32 {
        self.delay.max(0.0) + self.duration.max(0.0)
    }
}

/// A request for [`crate::Scheduler::start`]
#[derive(Debug)]
pub struct AnimationSpec {
    pub tween: Tween,
    pub on_complete: Completion,
}

impl AnimationSpec {
    pub fn new(tween: Tween) -> Self {
        Self {
            tween,
            on_complete: Completion::none(),
        }
    }

    /// Opacity from `from` to `to`
    pub fn fade(target: &TargetRef, from: f32, to: f32, duration: f32) -> Self {
        Self::new(Tween::new(
            target.clone(),
            PropertyChange::Opacity { from, to },
            duration,
        ))
    }

    /// Position from `from` to `to`
    pub fn move_to(target: &TargetRef, from: Vec2, to: Vec2, duration: f32) -> Self {
        Self::new(Tween::new(
            target.clone(),
            PropertyChange::Position { from, to },
            duration,
        ))
    }

    /// Scale from `from` to `to`
    pub fn scale(target: &TargetRef, from: Vec2, to: Vec2, duration: f32) -> Self {
        Self::new(Tween::new(
            target.clone(),
            PropertyChange::Scale { from, to },
            duration,
        ))
    }

    /// Rotation in degrees from `from` to `to`
    pub fn rotate(target: &TargetRef, from: f32, to: f32, duration: f32) -> Self {
        Self::new(Tween::new(
            target.clone(),
            PropertyChange::Rotation { from, to },
            duration,
        ))
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.tween.delay = seconds;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.tween.easing = easing;
        self
    }

    pub fn on_complete<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_complete = Completion::new(f);
        self
    }

    /// Replace the completion callback with an already built one
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.on_complete = completion;
        self
    }
}

/// Runs one [`Tween`] against the scheduler clock
#[derive(Debug)]
pub struct PropertyAnimator {
    tween: Tween,
    on_complete: Completion,
    token: CancelToken,
    state: AnimationState,
    /// Clock time the animator was scheduled at; the delay counts from here
    origin: f64,
    /// Clock time the animator reached a terminal state
    finished_at: Option<f64>,
}

impl PropertyAnimator {
    pub fn new(spec: AnimationSpec, origin: f64) -> Self {
        Self::with_token(spec, origin, CancelToken::new())
    }

    /// Create an animator observing an existing cancel token
    pub fn with_token(spec: AnimationSpec, origin: f64, token: CancelToken) -> Self {
        Self {
            tween: spec.tween,
            on_complete: spec.on_complete,
            token,
            state: AnimationState::Pending,
            origin,
            finished_at: None,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn tween(&self) -> &Tween {
        &self.tween
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Clock time of the first interpolated write
    pub fn start_time(&self) -> f64 {
        self.origin + self.tween.delay.max(0.0) as f64
    }

    /// Clock time at which the animation ends if nothing interrupts it
    pub fn scheduled_end(&self) -> f64 {
        self.start_time() + self.tween.duration.max(0.0) as f64
    }

    /// Clock time the animator actually finished, once terminal
    pub fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    /// Cancel cooperatively. No further writes, no completion callback.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if !self.state.is_terminal() {
            self.state = AnimationState::Cancelled;
        }
    }

    /// Advance to clock time `now`.
    ///
    /// This is the fault boundary: errors and panics raised while stepping are
    /// logged and turned into a forced completion.
    pub fn advance(&mut self, now: f64) -> AnimationState {
        if self.state.is_terminal() {
            return self.state;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step(now)));
        match outcome {
            Ok(Ok(state)) => state,
            Ok(Err(err)) => {
                tracing::error!(
                    property = ?self.tween.change.property(),
                    "animation fault, forcing completion: {}",
                    err
                );
                self.force_complete(now)
            }
            Err(payload) => {
                tracing::error!(
                    property = ?self.tween.change.property(),
                    "animation panicked, forcing completion: {}",
                    panic_message(payload.as_ref())
                );
                self.force_complete(now)
            }
        }
    }

    fn step(&mut self, now: f64) -> Result<AnimationState, AnimationError> {
        if self.token.is_cancelled() {
            self.state = AnimationState::Cancelled;
            self.finished_at = Some(now);
            return Ok(self.state);
        }

        if self.state == AnimationState::Pending {
            if now < self.start_time() {
                return Ok(AnimationState::Pending);
            }
            self.state = AnimationState::Running;
        }

        if !self.tween.target.is_valid() {
            tracing::debug!(
                property = ?self.tween.change.property(),
                "animation target became invalid mid-flight"
            );
            return Ok(self.complete(now));
        }

        let elapsed = now - self.start_time();
        let duration = self.tween.duration as f64;
        if duration <= 0.0 || elapsed >= duration {
            return Ok(self.complete(now));
        }

        let t = (elapsed / duration).clamp(0.0, 1.0) as f32;
        let eased = self.tween.easing.apply(t);
        let value = self.tween.change.value_at(eased);
        if !value.is_finite() {
            return Err(AnimationError::fault(format!(
                "non-finite {:?} sample at t={}",
                value.property(),
                t
            )));
        }

        self.tween.target.write(|target| value.apply_to(target));
        Ok(AnimationState::Running)
    }

    /// Write the exact end value and fire the callback
    fn complete(&mut self, now: f64) -> AnimationState {
        let end = self.tween.change.end();
        self.tween.target.write(|target| end.apply_to(target));
        self.state = AnimationState::Completed;
        self.finished_at = Some(now);
        self.on_complete.fire();
        self.state
    }

    /// Best-effort completion after a fault. Each part is attempted on its
    /// own so a second panic cannot skip the callback or the state change.
    fn force_complete(&mut self, now: f64) -> AnimationState {
        self.state = AnimationState::Completed;
        self.finished_at = Some(now);

        let end = self.tween.change.end();
        let target = &self.tween.target;
        if panic::catch_unwind(AssertUnwindSafe(|| {
            target.write(|t| end.apply_to(t));
        }))
        .is_err()
        {
            tracing::error!("final write panicked after animation fault");
        }

        let on_complete = &mut self.on_complete;
        if panic::catch_unwind(AssertUnwindSafe(|| {
            on_complete.fire();
        }))
        .is_err()
        {
            tracing::error!("completion callback panicked");
        }

        self.state
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
