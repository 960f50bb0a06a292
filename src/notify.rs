use anyhow::Result;
use log::info;

pub const TIMER_COMPLETE_MESSAGE: &str = "Timer complete!";

/// A message pushed at a fixed time of day.
///
/// A negative `hour` repeats every `|hour|` hours counted from midnight, so
/// `-1` fires hourly and `-6` fires at 0, 6, 12 and 18.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub message: String,
    pub hour: i32,
    pub minute: u32,
    pub active_days: Vec<u32>,
}

impl ScheduledNotification {
    pub fn is_due(&self, hour: u32, minute: u32, day_of_week: u32) -> bool {
        if !self.active_days.is_empty() && !self.active_days.contains(&day_of_week) {
            return false;
        }
        if minute != self.minute {
            return false;
        }
        if self.hour >= 0 {
            return self.hour.unsigned_abs() == hour;
        }
        hour % self.hour.unsigned_abs() == 0
    }
}

pub trait Notifier: Send {
    fn notify(&mut self, message: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str) -> Result<()> {
        info!("notification: {message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(hour: i32, minute: u32, days: Vec<u32>) -> ScheduledNotification {
        ScheduledNotification {
            message: "ping".to_string(),
            hour,
            minute,
            active_days: days,
        }
    }

    #[test]
    fn exact_hour_matches_once_a_day() {
        let n = push(7, 30, Vec::new());
        assert!(n.is_due(7, 30, 1));
        assert!(!n.is_due(19, 30, 1));
        assert!(!n.is_due(7, 31, 1));
    }

    #[test]
    fn negative_hour_repeats_from_midnight() {
        let hourly = push(-1, 0, Vec::new());
        assert!((0..24).all(|hour| hourly.is_due(hour, 0, 2)));

        let every_six = push(-6, 15, Vec::new());
        let due = (0..24)
            .filter(|hour| every_six.is_due(*hour, 15, 2))
            .collect::<Vec<_>>();
        assert_eq!(due, vec![0, 6, 12, 18]);
    }

    #[test]
    fn day_filter_applies() {
        let n = push(8, 0, vec![1, 2, 3, 4, 5]);
        assert!(n.is_due(8, 0, 3));
        assert!(!n.is_due(8, 0, 0));
        assert!(!n.is_due(8, 0, 6));
    }
}
