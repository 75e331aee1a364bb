//! Animatable targets
//!
//! The engine only needs a narrow capability from the host: read and write
//! opacity, position, scale and rotation. Hosts implement [`AnimationTarget`]
//! on their own element type and hand the engine a [`TargetRef`], which holds
//! the element weakly so a destroyed element reads as invalid instead of
//! being kept alive by a running animation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// A 2D vector used for position and scale
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2::new(0.0, 0.0);
    pub const ONE: Vec2 = Vec2::new(1.0, 1.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Both components set to `v`
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Vec2::new(x, y)
    }
}

/// Values that can be interpolated between two endpoints.
///
/// `t = 0.0` yields `from`, `t = 1.0` yields `to`; `t` may leave `[0, 1]`
/// for overshooting curves.
pub trait Interpolate: Copy {
    fn lerp(from: Self, to: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        Vec2::new(f32::lerp(from.x, to.x, t), f32::lerp(from.y, to.y, t))
    }
}

/// The host capability the engine animates
pub trait AnimationTarget {
    /// Opacity in `0.0..=1.0`
    fn opacity(&self) -> f32;
    fn set_opacity(&mut self, value: f32);

    fn position(&self) -> Vec2;
    fn set_position(&mut self, value: Vec2);

    fn scale(&self) -> Vec2;
    fn set_scale(&mut self, value: Vec2);

    /// Rotation in degrees
    fn rotation(&self) -> f32;
    fn set_rotation(&mut self, degrees: f32);

    /// Whether the element is still part of the host's scene.
    ///
    /// A detached target stops receiving interpolated writes.
    fn is_attached(&self) -> bool {
        true
    }
}

/// Shared, lockable target as owned by the host
pub type SharedTarget = Arc<Mutex<dyn AnimationTarget + Send>>;

/// The animatable properties
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Opacity,
    Position,
    Scale,
    Rotation,
}

/// A concrete value for one property
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Opacity(f32),
    Position(Vec2),
    Scale(Vec2),
    Rotation(f32),
}

impl PropertyValue {
    pub fn property(&self) -> Property {
        match self {
            PropertyValue::Opacity(_) => Property::Opacity,
            PropertyValue::Position(_) => Property::Position,
            PropertyValue::Scale(_) => Property::Scale,
            PropertyValue::Rotation(_) => Property::Rotation,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            PropertyValue::Opacity(v) | PropertyValue::Rotation(v) => v.is_finite(),
            PropertyValue::Position(v) | PropertyValue::Scale(v) => v.is_finite(),
        }
    }

    /// Write this value to the target
    pub fn apply_to(self, target: &mut dyn AnimationTarget) {
        match self {
            PropertyValue::Opacity(v) => target.set_opacity(v),
            PropertyValue::Position(v) => target.set_position(v),
            PropertyValue::Scale(v) => target.set_scale(v),
            PropertyValue::Rotation(v) => target.set_rotation(v),
        }
    }

    /// Read the current value of `property` from the target
    pub fn read_from(property: Property, target: &dyn AnimationTarget) -> Self {
        match property {
            Property::Opacity => PropertyValue::Opacity(target.opacity()),
            Property::Position => PropertyValue::Position(target.position()),
            Property::Scale => PropertyValue::Scale(target.scale()),
            Property::Rotation => PropertyValue::Rotation(target.rotation()),
        }
    }
}

/// Weak handle to an animation target.
///
/// The host keeps ownership; once every strong reference is gone the handle
/// reports invalid and writes become no-ops. Locks are taken only inside
/// [`crate::Scheduler::advance`] and the preset builders, so the host must not
/// hold the target's lock while calling into the engine.
#[derive(Clone)]
pub struct TargetRef {
    inner: Weak<Mutex<dyn AnimationTarget + Send>>,
}

impl TargetRef {
    pub fn new<T: AnimationTarget + Send + 'static>(target: &Arc<Mutex<T>>) -> Self {
        let shared: SharedTarget = target.clone();
        Self::from_shared(&shared)
    }

    pub fn from_shared(target: &SharedTarget) -> Self {
        Self {
            inner: Arc::downgrade(target),
        }
    }

    /// A reference that never resolves
    pub fn dangling() -> Self {
        let inner: Weak<Mutex<dyn AnimationTarget + Send>> = Weak::<Mutex<NodeState>>::new();
        Self { inner }
    }

    /// Whether the target object still exists
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether the target exists and is attached to the host scene
    pub fn is_valid(&self) -> bool {
        self.read(|t| t.is_attached()).unwrap_or(false)
    }

    /// Run `f` against the target if it still exists
    pub fn read<R>(&self, f: impl FnOnce(&dyn AnimationTarget) -> R) -> Option<R> {
        let target = self.inner.upgrade()?;
        let guard = target.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&*guard);
        Some(result)
    }

    /// Run `f` mutably against the target if it still exists.
    ///
    /// A poisoned lock is recovered: a panic inside an earlier write must not
    /// prevent the final value from landing.
    pub fn write<R>(&self, f: impl FnOnce(&mut dyn AnimationTarget) -> R) -> Option<R> {
        let target = self.inner.upgrade()?;
        let mut guard = target.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut *guard);
        Some(result)
    }

    /// Current value of `property`, if the target still exists
    pub fn get(&self, property: Property) -> Option<PropertyValue> {
        self.read(|t| PropertyValue::read_from(property, t))
    }

    pub fn opacity(&self) -> Option<f32> {
        self.read(|t| t.opacity())
    }

    pub fn position(&self) -> Option<Vec2> {
        self.read(|t| t.position())
    }

    pub fn scale(&self) -> Option<Vec2> {
        self.read(|t| t.scale())
    }

    pub fn rotation(&self) -> Option<f32> {
        self.read(|t| t.rotation())
    }

    /// Whether both handles point at the same target object
    pub fn ptr_eq(&self, other: &TargetRef) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<T: AnimationTarget + Send + 'static> From<&Arc<Mutex<T>>> for TargetRef {
    fn from(target: &Arc<Mutex<T>>) -> Self {
        TargetRef::new(target)
    }
}

/// Plain in-memory target: transform state of one node.
///
/// Used by headless drivers and tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub opacity: f32,
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub attached: bool,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            attached: true,
        }
    }
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully opaque node at `position`
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Wrap in the shared form the engine expects
    pub fn shared(self) -> Arc<Mutex<NodeState>> {
        Arc::new(Mutex::new(self))
    }
}

impl AnimationTarget for NodeState {
    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn set_opacity(&mut self, value: f32) {
        self.opacity = value;
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, value: Vec2) {
        self.position = value;
    }

    fn scale(&self) -> Vec2 {
        self.scale
    }

    fn set_scale(&mut self, value: Vec2) {
        self.scale = value;
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}
