use std::time::{Duration, Instant};

/// Autosave cadence: a repeating interval that fires only when dirty and the
/// session is active, throttled to one save per `min_gap` across every
/// trigger source (interval, suspend, quit, manual).
#[derive(Debug, Clone)]
pub struct AutosaveSchedule {
    interval: Duration,
    min_gap: Duration,
    dirty: bool,
    last_save: Option<Instant>,
    next_tick: Instant,
}

pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const AUTOSAVE_MIN_GAP: Duration = Duration::from_secs(5);

impl AutosaveSchedule {
    pub fn new(now: Instant) -> Self {
        Self::with_cadence(now, AUTOSAVE_INTERVAL, AUTOSAVE_MIN_GAP)
    }

    pub fn with_cadence(now: Instant, interval: Duration, min_gap: Duration) -> Self {
        Self {
            interval,
            min_gap,
            dirty: false,
            last_save: None,
            next_tick: now + interval,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn gap_ok(&self, now: Instant) -> bool {
        self.last_save
            .map(|t| now.duration_since(t) >= self.min_gap)
            .unwrap_or(true)
    }

    /// Interval trigger. Consumes the tick even when nothing fires so a
    /// blocked save waits for the next interval rather than retrying every
    /// loop iteration.
    pub fn on_tick(&mut self, now: Instant, active: bool) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.next_tick = now + self.interval;
        self.dirty && active && self.gap_ok(now)
    }

    /// Quit/suspend trigger: save only if dirty.
    pub fn flush(&mut self, now: Instant) -> bool {
        self.dirty && self.gap_ok(now)
    }

    /// Manual "save progress": bypasses the dirty check, not the throttle.
    pub fn force(&mut self, now: Instant) -> bool {
        self.gap_ok(now)
    }

    pub fn note_saved(&mut self, now: Instant) {
        self.last_save = Some(now);
        self.dirty = false;
    }
}

/// Trailing-edge debounce for the server-side progress save: each field
/// change re-arms a 2 s window; the call fires once the window lapses with
/// no further changes.
#[derive(Debug, Clone, Default)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

pub const SERVER_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn interval_fires_only_when_dirty_and_active() {
        let t0 = Instant::now();
        let mut sched = AutosaveSchedule::with_cadence(t0, secs(30), secs(5));
        assert!(!sched.on_tick(t0 + secs(30), true), "clean -> no save");
        sched.mark_dirty();
        assert!(!sched.on_tick(t0 + secs(31), true), "tick already consumed");
        assert!(!sched.on_tick(t0 + secs(61), false), "hidden -> no save");
        sched.mark_dirty();
        assert!(sched.on_tick(t0 + secs(92), true));
    }

    #[test]
    fn never_twice_within_min_gap_regardless_of_trigger() {
        let t0 = Instant::now();
        let mut sched = AutosaveSchedule::with_cadence(t0, secs(30), secs(5));
        sched.mark_dirty();
        assert!(sched.force(t0 + secs(1)));
        sched.note_saved(t0 + secs(1));
        // Every trigger source inside the 5 s window is refused
        sched.mark_dirty();
        assert!(!sched.force(t0 + secs(3)));
        assert!(!sched.flush(t0 + secs(4)));
        assert!(!sched.on_tick(t0 + secs(31).min(secs(5)), true));
        // And allowed again once the gap has passed
        assert!(sched.flush(t0 + secs(7)));
    }

    #[test]
    fn flush_requires_dirty_but_force_does_not() {
        let t0 = Instant::now();
        let mut sched = AutosaveSchedule::with_cadence(t0, secs(30), secs(5));
        assert!(!sched.flush(t0 + secs(1)));
        assert!(sched.force(t0 + secs(1)));
    }

    #[test]
    fn note_saved_clears_dirty() {
        let t0 = Instant::now();
        let mut sched = AutosaveSchedule::with_cadence(t0, secs(30), secs(5));
        sched.mark_dirty();
        sched.note_saved(t0 + secs(1));
        assert!(!sched.is_dirty());
        assert!(!sched.flush(t0 + secs(10)));
    }

    #[test]
    fn debounce_fires_on_trailing_edge_only() {
        let t0 = Instant::now();
        let mut d = Debounce::new(secs(2));
        assert!(!d.ready(t0 + secs(1)), "nothing armed");
        d.arm(t0);
        assert!(!d.ready(t0 + secs(1)));
        // New activity pushes the deadline out
        d.arm(t0 + secs(1));
        assert!(!d.ready(t0 + secs(2)));
        assert!(d.ready(t0 + secs(3)));
        assert!(!d.ready(t0 + secs(4)), "fires once");
    }
}
