use std::{
    fmt,
    sync::{Mutex, MutexGuard},
};

use tracing::debug;

/// What a controller is currently waiting on the network for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Idle,
    Submitting,
    Analyzing,
    Asking,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "nothing",
            Self::Submitting => "a content submission",
            Self::Analyzing => "a risk analysis",
            Self::Asking => "a question",
        })
    }
}

/// Busy flag with the transitions Idle -> X and X -> Idle only.
#[derive(Debug)]
pub struct ActivityTracker {
    state: Mutex<Activity>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(Activity::Idle),
        }
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Activity {
        *self.lock()
    }

    /// Leaves Idle for `next`. Fails with the activity already running.
    pub fn try_begin(&self, next: Activity) -> Result<ActivityGuard<'_>, Activity> {
        debug_assert_ne!(next, Activity::Idle, "cannot begin the idle activity");
        let mut state = self.lock();
        if *state != Activity::Idle {
            return Err(*state);
        }
        *state = next;
        debug!(activity = ?next, "activity started");
        Ok(ActivityGuard {
            tracker: self,
            activity: next,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Activity> {
        // The guarded value is a plain enum; a poisoned lock still holds a valid state.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Returns the tracker to Idle when dropped, on every exit path.
#[derive(Debug)]
pub struct ActivityGuard<'a> {
    tracker: &'a ActivityTracker,
    activity: Activity,
}

impl ActivityGuard<'_> {
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        *self.tracker.lock() = Activity::Idle;
        debug!(activity = ?self.activity, "activity finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_activity_at_a_time() {
        let tracker = ActivityTracker::new();
        let guard = tracker.try_begin(Activity::Analyzing).expect("idle");
        assert_eq!(tracker.current(), Activity::Analyzing);
        assert_eq!(
            tracker.try_begin(Activity::Asking).expect_err("busy"),
            Activity::Analyzing
        );
        assert_eq!(
            tracker.try_begin(Activity::Analyzing).expect_err("busy"),
            Activity::Analyzing
        );
        drop(guard);
        assert_eq!(tracker.current(), Activity::Idle);
        assert!(tracker.try_begin(Activity::Submitting).is_ok());
    }

    #[test]
    fn guard_resets_on_early_return() {
        fn failing_step(tracker: &ActivityTracker) -> Result<(), &'static str> {
            let _guard = tracker.try_begin(Activity::Submitting).map_err(|_| "busy")?;
            Err("backend exploded")
        }

        let tracker = ActivityTracker::new();
        assert_eq!(failing_step(&tracker), Err("backend exploded"));
        assert_eq!(tracker.current(), Activity::Idle);
    }
}
