use quiz_core::model::DEFAULT_TIMER_SECS;

/// Shortest duration restored from a saved quiz state.
const MIN_RESTORED_SECS: u32 = 60;

/// Quiz countdown. Ticks once per second while running and stops at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    duration_secs: u32,
    remaining_secs: u32,
    running: bool,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_TIMER_SECS,
            remaining_secs: DEFAULT_TIMER_SECS,
            running: false,
        }
    }
}

impl Countdown {
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Apply a saved timer. A zero remaining time keeps the current clock
    /// but still restores the running flag.
    pub fn restore(&mut self, remaining_secs: u32, running: bool) {
        if remaining_secs > 0 {
            self.duration_secs = remaining_secs.max(MIN_RESTORED_SECS);
            self.remaining_secs = remaining_secs;
        }
        self.running = running && self.remaining_secs > 0;
    }

    pub fn toggle(&mut self) {
        self.running = !self.running && self.remaining_secs > 0;
    }

    /// Advance by one second. Returns `true` if the remaining time changed.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.remaining_secs == 0 {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.running = false;
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `MM:SS`; minutes are not wrapped into hours.
    #[must_use]
    pub fn text(&self) -> String {
        format_mm_ss(self.remaining_secs)
    }
}

#[must_use]
pub fn format_mm_ss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
