const MINUTES_PER_DAY: i32 = 1_440;

/// A recurring daily window, optionally limited to some days of the week.
///
/// The end may sit numerically before the start, in which case the window
/// runs past midnight. Days are indexed from Sunday = 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePeriod {
    start_hour: u32,
    start_minute: u32,
    end_hour: u32,
    end_minute: u32,
    active_days: Vec<u32>,
}

impl TimePeriod {
    #[cfg(test)]
    pub fn new(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self::with_days(start_hour, start_minute, end_hour, end_minute, Vec::new())
    }

    pub fn with_days(
        start_hour: u32,
        start_minute: u32,
        end_hour: u32,
        end_minute: u32,
        mut active_days: Vec<u32>,
    ) -> Self {
        active_days.sort_unstable();
        active_days.dedup();
        Self {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
            active_days,
        }
    }

    /// Zero-length windows never match.
    pub fn in_period(&self, hour: u32, minute: u32, day_of_week: u32) -> bool {
        if !self.active_days.is_empty() && !self.active_days.contains(&day_of_week) {
            return false;
        }

        let start = minute_of_day(self.start_hour, self.start_minute);
        let end = minute_of_day(self.end_hour, self.end_minute) + MINUTES_PER_DAY;
        let now = minute_of_day(hour, minute) + MINUTES_PER_DAY;

        let span = (end - start) % MINUTES_PER_DAY;
        let offset = (now - start) % MINUTES_PER_DAY;
        if span == offset {
            return false;
        }
        span > offset
    }

    pub fn active_days(&self) -> &[u32] {
        &self.active_days
    }

    pub fn start(&self) -> (u32, u32) {
        (self.start_hour, self.start_minute)
    }

    pub fn end(&self) -> (u32, u32) {
        (self.end_hour, self.end_minute)
    }
}

fn minute_of_day(hour: u32, minute: u32) -> i32 {
    (hour * 60 + minute) as i32
}
