//! Animation scheduler
//!
//! Owns every active animation and sequence playback and steps them once per
//! host tick. The host creates one scheduler and calls [`Scheduler::advance`]
//! from its frame loop.

use crate::animator::{AnimationSpec, AnimationState, PropertyAnimator};
use crate::callback::CancelToken;
use crate::config::SchedulerConfig;
use crate::sequence::{PlaybackStatus, SequencePlayback};
use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::fmt;

new_key_type! {
    pub struct TimelineId;
}

/// Handle to an animation started with [`Scheduler::start`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(i64);

impl AnimationId {
    /// Returned when an animation could not be started
    pub const INVALID: AnimationId = AnimationId(-1);

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ActiveAnimation {
    token: CancelToken,
    animator: PropertyAnimator,
}

/// Cooperative animation driver
pub struct Scheduler {
    config: SchedulerConfig,
    /// Kept in start order; later-started animations write last each tick
    active: IndexMap<AnimationId, ActiveAnimation>,
    timelines: SlotMap<TimelineId, SequencePlayback>,
    next_id: i64,
    now: f64,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            active: IndexMap::new(),
            timelines: SlotMap::with_key(),
            next_id: 0,
            now: 0.0,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start animating one property.
    ///
    /// Returns [`AnimationId::INVALID`] if the target is gone. Zero-length
    /// animations are applied immediately and never registered.
    pub fn start(&mut self, mut spec: AnimationSpec) -> AnimationId {
        if !spec.tween.target.is_valid() {
            tracing::warn!(
                property = ?spec.tween.change.property(),
                "cannot start animation: target is no longer available"
            );
            return AnimationId::INVALID;
        }

        let id = AnimationId(self.next_id);
        self.next_id += 1;

        if spec.tween.duration <= 0.0 {
            spec.tween.delay = 0.0;
            let mut animator = PropertyAnimator::new(spec, self.now);
            animator.advance(self.now);
            tracing::debug!(%id, "zero-duration animation applied immediately");
            return id;
        }

        let token = CancelToken::new();
        let mut animator = PropertyAnimator::with_token(spec, self.now, token.clone());
        if animator.tween().delay <= 0.0 {
            animator.advance(self.now);
        }

        if animator.state().is_terminal() {
            tracing::debug!(%id, "animation finished during start");
            return id;
        }

        tracing::debug!(
            %id,
            start = animator.start_time(),
            end = animator.scheduled_end(),
            "animation started"
        );
        self.active.insert(id, ActiveAnimation { token, animator });
        id
    }

    /// Cancel one animation. Returns false if it was not active.
    pub fn stop(&mut self, id: AnimationId) -> bool {
        match self.active.shift_remove(&id) {
            Some(mut entry) => {
                entry.token.cancel();
                entry.animator.cancel();
                tracing::debug!(%id, "animation stopped");
                true
            }
            None => false,
        }
    }

    /// Cancel every animation and halt every sequence playback
    pub fn stop_all(&mut self) {
        let stopped = self.active.len();
        for (_, mut entry) in self.active.drain(..) {
            entry.token.cancel();
            entry.animator.cancel();
        }

        let halted = self.timelines.len();
        for (_, mut playback) in self.timelines.drain() {
            playback.halt();
        }

        if stopped > 0 || halted > 0 {
            tracing::debug!(stopped, halted, "stopped all animations");
        }
    }

    /// Advance the clock by `dt` seconds and step everything once
    pub fn advance(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(dt, "ignoring invalid tick delta");
            return;
        }

        let dt = match self.config.max_tick_delta {
            Some(max) if dt > max => max,
            _ => dt,
        };
        self.now += dt as f64;
        self.ticks += 1;
        let now = self.now;

        let mut finished: SmallVec<[AnimationId; 8]> = SmallVec::new();
        for (id, entry) in self.active.iter_mut() {
            if entry.animator.advance(now).is_terminal() {
                finished.push(*id);
            }
        }
        for id in finished {
            self.active.shift_remove(&id);
            tracing::debug!(%id, "animation finished");
        }

        let mut ended: SmallVec<[TimelineId; 4]> = SmallVec::new();
        for (key, playback) in self.timelines.iter_mut() {
            if playback.advance(now) != PlaybackStatus::Running {
                ended.push(key);
            }
        }
        for key in ended {
            self.timelines.remove(key);
        }
    }

    /// Register a sequence playback. Non-empty playbacks take their first
    /// step immediately.
    pub(crate) fn spawn_timeline(&mut self, mut playback: SequencePlayback) -> TimelineId {
        if !playback.is_empty() && playback.advance(self.now) != PlaybackStatus::Running {
            tracing::debug!("sequence finished during play");
            return TimelineId::default();
        }
        self.timelines.insert(playback)
    }

    /// Clock time in seconds since the scheduler was created
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn is_active(&self, id: AnimationId) -> bool {
        self.active.contains_key(&id)
    }

    /// State of an active animation, `None` once it has left the registry
    pub fn state(&self, id: AnimationId) -> Option<AnimationState> {
        self.active.get(&id).map(|entry| entry.animator.state())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active ids in start order
    pub fn active_ids(&self) -> impl Iterator<Item = AnimationId> + '_ {
        self.active.keys().copied()
    }

    pub fn playing_sequences(&self) -> usize {
        self.timelines.len()
    }

    /// Check if anything is still animating
    pub fn has_active_animations(&self) -> bool {
        !self.active.is_empty() || !self.timelines.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("ticks", &self.ticks)
            .field("active", &self.active.len())
            .field("timelines", &self.timelines.len())
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::target::{NodeState, TargetRef, Vec2};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        let ids: Vec<_> = (0..5)
            .map(|_| scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 1.0)))
            .collect();

        assert_eq!(ids[0], AnimationId(0));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(scheduler.active_count(), 5);
        assert_eq!(scheduler.active_ids().collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_stop_removes_only_that_id() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let a = scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 1.0));
        let b = scheduler.start(AnimationSpec::rotate(&target, 0.0, 90.0, 1.0));
        let c = scheduler.start(AnimationSpec::scale(&target, Vec2::ONE, Vec2::splat(2.0), 1.0));

        assert!(scheduler.stop(b));
        assert!(!scheduler.stop(b));
        assert!(scheduler.is_active(a));
        assert!(!scheduler.is_active(b));
        assert!(scheduler.is_active(c));
    }

    #[test]
    fn test_invalid_target_returns_invalid_id() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.start(AnimationSpec::fade(&TargetRef::dangling(), 0.0, 1.0, 1.0));
        assert_eq!(id, AnimationId::INVALID);
        assert!(!id.is_valid());
        assert_eq!(scheduler.active_count(), 0);

        // Rejection does not consume an id
        let node = NodeState::new().shared();
        let id = scheduler.start(AnimationSpec::fade(&TargetRef::new(&node), 0.0, 1.0, 1.0));
        assert_eq!(id.raw(), 0);
    }

    #[test]
    fn test_zero_duration_applies_immediately() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let id = scheduler.start(
            AnimationSpec::move_to(&target, Vec2::ZERO, Vec2::new(5.0, 5.0), 0.0)
                .delay(3.0)
                .on_complete(move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );

        assert!(id.is_valid());
        assert!(!scheduler.is_active(id));
        assert_eq!(node.lock().unwrap().position, Vec2::new(5.0, 5.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_writes_first_value_synchronously() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().with_opacity(0.7).shared();
        let target = TargetRef::new(&node);

        scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 1.0));
        assert_eq!(node.lock().unwrap().opacity, 0.0);
    }

    #[test]
    fn test_delayed_start_leaves_target_untouched() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().with_opacity(0.7).shared();
        let target = TargetRef::new(&node);

        let id = scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 1.0).delay(0.5));
        assert_eq!(scheduler.state(id), Some(AnimationState::Pending));
        assert_eq!(node.lock().unwrap().opacity, 0.7);

        scheduler.advance(0.25);
        assert_eq!(node.lock().unwrap().opacity, 0.7);

        scheduler.advance(0.5);
        assert_eq!(scheduler.state(id), Some(AnimationState::Running));
        assert!((node.lock().unwrap().opacity - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_completion_removes_entry_and_fires_once() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let id = scheduler.start(
            AnimationSpec::fade(&target, 1.0, 0.0, 0.3)
                .easing(Easing::EaseInCubic)
                .on_complete(move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );

        for _ in 0..30 {
            scheduler.advance(1.0 / 60.0);
        }

        assert!(!scheduler.is_active(id));
        assert_eq!(scheduler.state(id), None);
        assert_eq!(node.lock().unwrap().opacity, 0.0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has_active_animations());
    }

    #[test]
    fn test_later_start_wins_same_property() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);

        scheduler.start(AnimationSpec::rotate(&target, 0.0, 100.0, 1.0));
        scheduler.start(AnimationSpec::rotate(&target, 0.0, -100.0, 1.0));
        scheduler.advance(0.5);

        assert!((node.lock().unwrap().rotation + 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_stop_all_clears_and_freezes_targets() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count_clone = count.clone();
            scheduler.start(
                AnimationSpec::move_to(&target, Vec2::ZERO, Vec2::new(100.0, 0.0), 1.0)
                    .on_complete(move || {
                        count_clone.fetch_add(1, Ordering::SeqCst);
                    }),
            );
        }
        scheduler.advance(0.25);
        let snapshot = node.lock().unwrap().position;

        scheduler.stop_all();
        assert_eq!(scheduler.active_count(), 0);

        scheduler.advance(1.0);
        assert_eq!(node.lock().unwrap().position, snapshot);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let mut scheduler = Scheduler::new();
        scheduler.advance(f32::NAN);
        scheduler.advance(-1.0);
        scheduler.advance(f32::INFINITY);
        assert_eq!(scheduler.now(), 0.0);
        assert_eq!(scheduler.tick_count(), 0);
    }

    #[test]
    fn test_max_tick_delta_clamps_clock() {
        let mut scheduler = Scheduler::with_config(SchedulerConfig {
            max_tick_delta: Some(0.1),
        });
        scheduler.advance(2.0);
        assert!((scheduler.now() - 0.1).abs() < 1e-6);
        assert_eq!(scheduler.tick_count(), 1);
    }

    #[test]
    fn test_target_detached_mid_flight_is_removed() {
        let mut scheduler = Scheduler::new();
        let node = NodeState::new().shared();
        let target = TargetRef::new(&node);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let id = scheduler.start(AnimationSpec::fade(&target, 0.0, 1.0, 1.0).on_complete(
            move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));
        scheduler.advance(0.1);
        node.lock().unwrap().attached = false;
        scheduler.advance(0.1);
        scheduler.advance(0.1);

        assert!(!scheduler.is_active(id));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scheduler_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Scheduler>();
    }
}
