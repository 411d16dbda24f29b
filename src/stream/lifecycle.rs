//! Session lifecycle: states, timers and activity tracking.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Lifecycle of one streaming session.
///
/// Transitions only move forward; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Created, request not yet issued
    #[default]
    Idle,
    /// Request issued, waiting for the server to accept it
    Connecting,
    /// Accepted; fragments are flowing
    Streaming,
    /// Tearing down
    Finalizing,
    /// Done
    Closed,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Connecting => 1,
            SessionState::Streaming => 2,
            SessionState::Finalizing => 3,
            SessionState::Closed => 4,
        }
    }

    /// Whether moving to `next` keeps the lifecycle monotonic.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The session's named timers, in expiry priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Fixed deadline from session start
    Overall,
    /// Rearmed on every meaningful fragment
    Inactivity,
    /// Rearmed on every delivered record with content
    Grace,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [TimerKind::Overall, TimerKind::Inactivity, TimerKind::Grace];

    pub fn as_str(self) -> &'static str {
        match self {
            TimerKind::Overall => "overall",
            TimerKind::Inactivity => "inactivity",
            TimerKind::Grace => "grace",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deadlines for every armed timer. The owner sleeps until
/// [`next_deadline`](TimerSet::next_deadline) and then asks which one expired.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    overall: Option<Instant>,
    inactivity: Option<Instant>,
    grace: Option<Instant>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Overall => &mut self.overall,
            TimerKind::Inactivity => &mut self.inactivity,
            TimerKind::Grace => &mut self.grace,
        }
    }

    /// Arm (or rearm) `kind` to fire at `deadline`.
    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        *self.slot(kind) = Some(deadline);
    }

    /// Disarm everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Overall => self.overall,
            TimerKind::Inactivity => self.inactivity,
            TimerKind::Grace => self.grace,
        }
    }

    pub fn is_empty(&self) -> bool {
        TimerKind::ALL.iter().all(|kind| self.deadline(*kind).is_none())
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        TimerKind::ALL
            .iter()
            .filter_map(|kind| self.deadline(*kind))
            .min()
    }

    /// The highest-priority timer whose deadline is at or before `now`.
    pub fn expired(&self, now: Instant) -> Option<TimerKind> {
        TimerKind::ALL
            .into_iter()
            .find(|kind| self.deadline(*kind).is_some_and(|deadline| deadline <= now))
    }
}

/// Tracks meaningful activity and picks the inactivity timeout.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    initial_timeout: Duration,
    streaming_timeout: Duration,
    has_received_data: bool,
    last_activity_at: Option<Instant>,
}

impl ActivityTracker {
    pub fn new(initial_timeout: Duration, streaming_timeout: Duration) -> Self {
        Self {
            initial_timeout,
            streaming_timeout,
            has_received_data: false,
            last_activity_at: None,
        }
    }

    /// Record a meaningful fragment and return the timeout to rearm with.
    pub fn record(&mut self, now: Instant) -> Duration {
        self.has_received_data = true;
        self.last_activity_at = Some(now);
        self.current_timeout()
    }

    /// Inactivity timeout under the current policy.
    pub fn current_timeout(&self) -> Duration {
        if self.has_received_data {
            self.streaming_timeout
        } else {
            self.initial_timeout
        }
    }

    pub fn has_received_data(&self) -> bool {
        self.has_received_data
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.last_activity_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions_are_monotonic() {
        assert!(SessionState::Idle.can_transition_to(SessionState::Connecting));
        assert!(SessionState::Connecting.can_transition_to(SessionState::Streaming));
        assert!(SessionState::Connecting.can_transition_to(SessionState::Finalizing));
        assert!(SessionState::Finalizing.can_transition_to(SessionState::Closed));
        assert!(!SessionState::Streaming.can_transition_to(SessionState::Connecting));
        assert!(!SessionState::Streaming.can_transition_to(SessionState::Streaming));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Idle));
        assert!(SessionState::Closed.is_terminal());
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_timer_set_next_deadline_and_priority() {
        let start = Instant::now();
        let mut timers = TimerSet::new();
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);

        timers.arm(TimerKind::Overall, start + Duration::from_secs(60));
        timers.arm(TimerKind::Inactivity, start + Duration::from_secs(30));
        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(30)));
        assert_eq!(timers.expired(start + Duration::from_secs(29)), None);
        assert_eq!(
            timers.expired(start + Duration::from_secs(30)),
            Some(TimerKind::Inactivity)
        );
        // both due: overall takes precedence
        assert_eq!(
            timers.expired(start + Duration::from_secs(61)),
            Some(TimerKind::Overall)
        );
    }

    #[test]
    fn test_timer_rearm_and_clear() {
        let start = Instant::now();
        let mut timers = TimerSet::new();
        timers.arm(TimerKind::Inactivity, start + Duration::from_secs(30));
        timers.arm(TimerKind::Inactivity, start + Duration::from_secs(8));
        assert_eq!(
            timers.deadline(TimerKind::Inactivity),
            Some(start + Duration::from_secs(8))
        );

        timers.arm(TimerKind::Grace, start + Duration::from_secs(2));
        assert_eq!(
            timers.deadline(TimerKind::Grace),
            Some(start + Duration::from_secs(2))
        );

        timers.clear();
        assert!(timers.is_empty());
    }

    #[test]
    fn test_activity_tracker_switches_timeout() {
        let mut tracker =
            ActivityTracker::new(Duration::from_millis(30_000), Duration::from_millis(8_000));
        assert_eq!(tracker.current_timeout(), Duration::from_millis(30_000));
        assert!(!tracker.has_received_data());

        let now = Instant::now();
        assert_eq!(tracker.record(now), Duration::from_millis(8_000));
        assert!(tracker.has_received_data());
        assert_eq!(tracker.last_activity_at(), Some(now));
    }
}
