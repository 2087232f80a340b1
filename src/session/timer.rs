use std::time::Duration;

pub const DEFAULT_EXAM_SECS: u64 = 3600;
pub const DEFAULT_WARNING_SECS: u64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerTick {
    Running(u64),
    /// Reached zero on this tick. Reported once.
    Expired,
    /// Not started, stopped, or already expired.
    Idle,
}

/// Whole-second exam countdown, advanced by external one-second ticks.
#[derive(Clone, Debug)]
pub struct ExamTimer {
    duration: u64,
    remaining: u64,
    expired: bool,
    running: bool,
}

impl ExamTimer {
    pub fn new(duration: Duration) -> Self {
        let secs = duration.as_secs();
        Self {
            duration: secs,
            remaining: secs,
            expired: false,
            running: false,
        }
    }

    /// `on_session_start`: begin counting from the full duration.
    pub fn start(&mut self) {
        self.remaining = self.duration;
        self.expired = false;
        self.running = true;
    }

    pub fn tick(&mut self) -> TimerTick {
        if !self.running || self.expired {
            return TimerTick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            self.running = false;
            log::info!("exam timer expired");
            return TimerTick::Expired;
        }
        TimerTick::Running(self.remaining)
    }

    /// `on_session_end`: no tick after this changes anything.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_warning(&self, threshold_secs: u64) -> bool {
        self.running && self.remaining < threshold_secs
    }
}

impl Default for ExamTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_EXAM_SECS))
    }
}

/// `M:SS`, minutes unbounded.
pub fn format_time(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut timer = ExamTimer::new(Duration::from_secs(3));
        assert_eq!(timer.tick(), TimerTick::Idle);
        timer.start();
        assert_eq!(timer.tick(), TimerTick::Running(2));
        assert_eq!(timer.tick(), TimerTick::Running(1));
        assert_eq!(timer.tick(), TimerTick::Expired);
        assert!(timer.is_expired());
        for _ in 0..5 {
            assert_eq!(timer.tick(), TimerTick::Idle);
        }
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn stop_silences_ticks() {
        let mut timer = ExamTimer::new(Duration::from_secs(10));
        timer.start();
        timer.tick();
        timer.stop();
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.remaining(), 9);
        assert!(!timer.is_expired());
    }

    #[test]
    fn warning_below_threshold() {
        let mut timer = ExamTimer::new(Duration::from_secs(301));
        timer.start();
        assert!(!timer.is_warning(DEFAULT_WARNING_SECS));
        timer.tick();
        assert!(!timer.is_warning(DEFAULT_WARNING_SECS));
        timer.tick();
        assert!(timer.is_warning(DEFAULT_WARNING_SECS));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(DEFAULT_EXAM_SECS), "60:00");
        assert_eq!(format_time(299), "4:59");
        assert_eq!(format_time(5), "0:05");
        assert_eq!(format_time(0), "0:00");
    }
}
