use std::time::{Duration, Instant};

use crate::foundation::error::DataraceResult;

/// Observable clock state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockState {
    /// Not advancing; holds the progress it stopped at.
    Idle {
        /// Progress in `[0, 1]`.
        progress: f64,
    },
    /// Advancing on every tick.
    Running {
        /// Progress in `[0, 1)`.
        progress: f64,
    },
    /// Reached the end of the race (progress 1).
    Completed,
}

/// State discriminant without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockPhase {
    /// See [`ClockState::Idle`].
    Idle,
    /// See [`ClockState::Running`].
    Running,
    /// See [`ClockState::Completed`].
    Completed,
}

impl ClockState {
    /// Phase of this state.
    pub fn phase(self) -> ClockPhase {
        match self {
            Self::Idle { .. } => ClockPhase::Idle,
            Self::Running { .. } => ClockPhase::Running,
            Self::Completed => ClockPhase::Completed,
        }
    }

    /// Progress carried by this state.
    pub fn progress(self) -> f64 {
        match self {
            Self::Idle { progress } | Self::Running { progress } => progress,
            Self::Completed => 1.0,
        }
    }
}

/// A phase change reported by [`AnimationClock`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockTransition {
    /// Phase before.
    pub from: ClockPhase,
    /// Phase after.
    pub to: ClockPhase,
    /// Progress right after the transition.
    pub progress: f64,
}

/// Receives clock transitions. The clock itself never calls observers; the owner of both
/// forwards whatever `start`/`pause`/`reset`/`tick` returned.
///
/// | from      | to        | cause                          |
/// |-----------|-----------|--------------------------------|
/// | Idle      | Running   | `start()`                      |
/// | Completed | Running   | `start()` (replays from 0)     |
/// | Running   | Idle      | `pause()` or `reset()`         |
/// | Completed | Idle      | `reset()`                      |
/// | Idle      | Idle      | `reset()` from non-zero        |
/// | Running   | Completed | `tick()` reaching progress 1   |
pub trait ClockObserver {
    /// Called once per transition, in order.
    fn on_clock_transition(&mut self, transition: ClockTransition) -> DataraceResult<()>;
}

/// Owned tick-scheduling handle. Present exactly while the clock is `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TickSchedule {
    id: u64,
    anchor: Option<Instant>,
}

/// Progress clock driving playback.
///
/// `progress = elapsed / duration + paused_offset`, where `elapsed` is measured from the first
/// tick after `start()` (or after a reconfigure).
#[derive(Debug)]
pub struct AnimationClock {
    duration: Duration,
    state: ClockState,
    paused_offset: f64,
    schedule: Option<TickSchedule>,
    next_schedule_id: u64,
}

impl AnimationClock {
    /// Idle clock at progress 0.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: duration.max(Duration::from_millis(1)),
            state: ClockState::Idle { progress: 0.0 },
            paused_offset: 0.0,
            schedule: None,
            next_schedule_id: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Current phase.
    pub fn phase(&self) -> ClockPhase {
        self.state.phase()
    }

    /// Current progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    /// Full race duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// `true` while a tick schedule is held.
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Begin (or resume, or replay) advancing. No-op while already running.
    pub fn start(&mut self) -> Option<ClockTransition> {
        let from = self.phase();
        match self.state {
            ClockState::Running { .. } => return None,
            ClockState::Completed => {
                self.paused_offset = 0.0;
                self.state = ClockState::Running { progress: 0.0 };
            }
            ClockState::Idle { progress } => {
                self.paused_offset = progress;
                self.state = ClockState::Running { progress };
            }
        }
        self.acquire_schedule();
        tracing::debug!(progress = self.progress(), "clock started");
        Some(self.transition(from))
    }

    /// Stop advancing and remember the current progress so `start()` resumes exactly here.
    pub fn pause(&mut self) -> Option<ClockTransition> {
        let ClockState::Running { progress } = self.state else {
            return None;
        };
        self.release_schedule();
        self.paused_offset = progress;
        self.state = ClockState::Idle { progress };
        tracing::debug!(progress, "clock paused");
        Some(self.transition(ClockPhase::Running))
    }

    /// Back to `Idle(0)` from any state.
    pub fn reset(&mut self) -> Option<ClockTransition> {
        let before = self.state;
        self.release_schedule();
        self.paused_offset = 0.0;
        self.state = ClockState::Idle { progress: 0.0 };
        if before == self.state {
            return None;
        }
        tracing::debug!("clock reset");
        Some(self.transition(before.phase()))
    }

    /// Advance to `now`. Only a running clock with a live schedule moves.
    pub fn tick(&mut self, now: Instant) -> Option<ClockTransition> {
        if !matches!(self.state, ClockState::Running { .. }) {
            return None;
        }
        let schedule = self.schedule.as_mut()?;
        let anchor = *schedule.anchor.get_or_insert(now);

        let elapsed = now.saturating_duration_since(anchor);
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64() + self.paused_offset;

        if progress >= 1.0 {
            self.release_schedule();
            self.paused_offset = 1.0;
            self.state = ClockState::Completed;
            tracing::debug!("clock completed");
            return Some(self.transition(ClockPhase::Running));
        }
        self.state = ClockState::Running { progress };
        None
    }

    /// Change the race duration. A running clock continues from its current progress.
    pub fn set_duration(&mut self, duration: Duration) {
        let duration = duration.max(Duration::from_millis(1));
        if duration == self.duration {
            return;
        }
        self.duration = duration;
        if let ClockState::Running { progress } = self.state {
            self.paused_offset = progress;
            self.release_schedule();
            self.acquire_schedule();
        }
    }

    fn release_schedule(&mut self) {
        if let Some(s) = self.schedule.take() {
            tracing::trace!(schedule = s.id, "tick schedule released");
        }
    }

    fn acquire_schedule(&mut self) {
        self.next_schedule_id += 1;
        self.schedule = Some(TickSchedule {
            id: self.next_schedule_id,
            anchor: None,
        });
    }

    fn transition(&self, from: ClockPhase) -> ClockTransition {
        ClockTransition {
            from,
            to: self.phase(),
            progress: self.progress(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/clock.rs"]
mod tests;
