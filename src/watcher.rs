//! End-of-clip watcher: the state machine behind every rotation.
//!
//! Playing → ApproachingEnd → Held, then back to Playing when the rotation
//! controller starts the next clip. The watcher never touches a surface; it
//! inspects observations against the shared session and answers with the
//! action the controller should execute. That keeps the whole machine
//! unit-testable without a live transport.
//!
//! Both surfaces report through the same channel and roles swap on every
//! transition, so each observation is first checked against the session's
//! active surface; stale idle-surface events are discarded.

use crate::session::{Session, SurfaceId};
use std::time::Duration;

/// Watcher timing and rate-ramp tuning.
#[derive(Debug, Clone)]
pub struct WatcherTuning {
    /// Remaining-time threshold that arms the exit sequence.
    pub near_end_lead: Duration,
    /// Cadence of the deceleration ramp.
    pub decel_tick: Duration,
    /// Rate decrement applied per tick.
    pub decel_step: f64,
    /// Rate is clamped to this the moment the exit sequence arms.
    pub slow_rate_ceiling: f64,
    /// Ramp floor; the rate never drops below this.
    pub min_rate: f64,
    /// Remaining time treated as end-of-clip.
    pub end_epsilon: Duration,
}

impl Default for WatcherTuning {
    fn default() -> Self {
        Self {
            near_end_lead: Duration::from_millis(1500),
            decel_tick: Duration::from_millis(120),
            decel_step: 0.05,
            slow_rate_ceiling: 0.7,
            min_rate: 0.5,
            end_epsilon: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Playing,
    ApproachingEnd,
    Held,
}

/// What the controller must do in response to an observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    None,
    /// Arm the exit: apply the clamped rate and start the deceleration tick.
    BeginRamp { rate: f64 },
    /// One ramp step: apply the new rate, keep ticking.
    SetRate { rate: f64 },
    /// End of clip: pause, park on the last frame, cancel the tick, then
    /// rotate (after the configured hold when `honor_hold` is set).
    Finish { honor_hold: bool },
}

#[derive(Debug)]
pub struct EndWatcher {
    tuning: WatcherTuning,
    state: WatchState,
}

impl EndWatcher {
    pub fn new(tuning: WatcherTuning) -> Self {
        Self {
            tuning,
            state: WatchState::Playing,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn tick_interval(&self) -> Duration {
        self.tuning.decel_tick
    }

    /// The next clip has the screen; observations start over.
    pub fn clip_started(&mut self) {
        self.state = WatchState::Playing;
    }

    /// Progress on some surface. Arms the exit sequence when the active
    /// surface is inside the lead window. The `exiting` flag is the
    /// idempotence guard: the condition is level-sensitive and would
    /// otherwise re-fire on every tick.
    pub fn observe_progress(
        &mut self,
        session: &mut Session,
        surface: SurfaceId,
        position: f64,
        duration: Option<f64>,
    ) -> Action {
        if surface != session.active || session.exiting {
            return Action::None;
        }
        let Some(duration) = duration else {
            return Action::None;
        };
        let remaining = duration - position;
        if remaining > self.tuning.near_end_lead.as_secs_f64() {
            return Action::None;
        }
        session.exiting = true;
        self.state = WatchState::ApproachingEnd;
        session.rate = session
            .rate
            .min(self.tuning.slow_rate_ceiling)
            .max(self.tuning.min_rate);
        Action::BeginRamp { rate: session.rate }
    }

    /// One deceleration tick against the active surface's position. A tick
    /// arriving in any other state is an orphan and does nothing.
    pub fn on_tick(
        &mut self,
        session: &mut Session,
        position: f64,
        duration: Option<f64>,
    ) -> Action {
        if self.state != WatchState::ApproachingEnd {
            return Action::None;
        }
        // No duration means the transport lost the media; treat as reached.
        let remaining = duration.map_or(0.0, |d| d - position);
        if remaining <= self.tuning.end_epsilon.as_secs_f64() {
            self.state = WatchState::Held;
            return Action::Finish { honor_hold: true };
        }
        session.rate = (session.rate - self.tuning.decel_step).max(self.tuning.min_rate);
        Action::SetRate { rate: session.rate }
    }

    /// End-of-media signal. The safety net for clips too short for the
    /// progress-based detection: reaching Held without a ramp.
    pub fn observe_ended(&mut self, session: &mut Session, surface: SurfaceId) -> Action {
        if surface != session.active || self.state == WatchState::Held {
            return Action::None;
        }
        session.exiting = true;
        self.state = WatchState::Held;
        Action::Finish { honor_hold: true }
    }

    /// Transport error. Same shape as the ended safety net, but a broken
    /// clip is not worth lingering on, so the hold is skipped.
    pub fn observe_error(&mut self, session: &mut Session, surface: SurfaceId) -> Action {
        if surface != session.active || self.state == WatchState::Held {
            return Action::None;
        }
        session.exiting = true;
        self.state = WatchState::Held;
        Action::Finish { honor_hold: false }
    }
}
