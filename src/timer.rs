const STOPWATCH_SENTINEL: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSpec {
    Countdown { hour: u32, minute: u32, second: u32 },
    Stopwatch,
}

impl TimerSpec {
    /// Any field equal to `-2` selects a stopwatch; other negatives are rejected.
    pub fn from_hms(hour: i32, minute: i32, second: i32) -> Option<Self> {
        if [hour, minute, second].contains(&STOPWATCH_SENTINEL) {
            return Some(TimerSpec::Stopwatch);
        }
        Some(TimerSpec::Countdown {
            hour: u32::try_from(hour).ok()?,
            minute: u32::try_from(minute).ok()?,
            second: u32::try_from(second).ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Countdown,
    Stopwatch,
}

/// Result of one call to [`Timer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Paused, not started or already ended; the count is unchanged.
    Idle(u32),
    /// Remaining seconds for a countdown, elapsed seconds for a stopwatch.
    Running(u32),
    /// The countdown reached zero on this tick.
    Completed,
    /// Seconds spent in the post-completion hold window.
    Holding(u32),
    /// The hold window ran out on this tick; the timer is now inert.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    mode: TimerMode,
    original_ticks: u32,
    ticks: u32,
    started: bool,
    paused: bool,
    hold: u32,
    ended: bool,
}

impl Timer {
    pub fn countdown(hour: u32, minute: u32, second: u32) -> Self {
        let total = hour
            .saturating_mul(3_600)
            .saturating_add(minute.saturating_mul(60))
            .saturating_add(second);
        Self::with_mode(TimerMode::Countdown, total)
    }

    pub fn stopwatch() -> Self {
        Self::with_mode(TimerMode::Stopwatch, 0)
    }

    pub fn from_spec(spec: TimerSpec) -> Self {
        match spec {
            TimerSpec::Countdown {
                hour,
                minute,
                second,
            } => Self::countdown(hour, minute, second),
            TimerSpec::Stopwatch => Self::stopwatch(),
        }
    }

    fn with_mode(mode: TimerMode, ticks: u32) -> Self {
        Self {
            mode,
            original_ticks: ticks,
            ticks,
            started: false,
            paused: false,
            hold: 0,
            ended: false,
        }
    }

    pub fn tick(&mut self, hold_max: u32) -> TimerTick {
        if self.ended || self.paused || !self.started {
            return TimerTick::Idle(self.ticks);
        }

        match self.mode {
            TimerMode::Stopwatch => {
                self.ticks = self.ticks.saturating_add(1);
                return TimerTick::Running(self.ticks);
            }
            TimerMode::Countdown if self.ticks > 0 => self.ticks -= 1,
            TimerMode::Countdown => self.hold += 1,
        }

        if self.hold >= hold_max {
            self.end();
            return TimerTick::Ended;
        }
        match (self.hold, self.ticks) {
            (0, 0) => TimerTick::Completed,
            (0, remaining) => TimerTick::Running(remaining),
            (hold, _) => TimerTick::Holding(hold),
        }
    }

    /// Started, not paused and not ended; the count moves on every tick.
    pub fn is_running(&self) -> bool {
        self.started && !self.paused && !self.ended
    }

    pub fn start(&mut self) {
        if self.ended {
            return;
        }
        self.started = true;
        self.paused = false;
    }

    /// No effect once the countdown has completed.
    pub fn pause(&mut self) {
        if self.started && self.hold == 0 {
            self.paused = true;
        }
    }

    /// Restores the constructed duration and returns to the not-started state.
    pub fn reset(&mut self) {
        *self = Self::with_mode(self.mode, self.original_ticks);
    }

    fn end(&mut self) {
        self.ended = true;
        self.started = false;
        self.paused = false;
        self.ticks = 0;
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn in_hold_period(&self) -> bool {
        self.started && self.hold > 0
    }

    pub fn hold_elapsed(&self) -> u32 {
        self.hold
    }

    pub fn format(&self) -> String {
        if self.ended {
            return "--:--".to_string();
        }
        if self.mode == TimerMode::Stopwatch && !self.started {
            return "00:00".to_string();
        }

        let hours = self.ticks / 3_600;
        let minutes = (self.ticks / 60) % 60;
        let seconds = self.ticks % 60;
        match (hours, self.mode) {
            (0, TimerMode::Countdown) => format!("{minutes}:{seconds:02}"),
            (0, TimerMode::Stopwatch) => format!("{minutes:02}:{seconds:02}"),
            _ => format!("{hours}:{minutes:02}:{seconds:02}"),
        }
    }
}
