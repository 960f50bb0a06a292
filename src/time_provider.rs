use anyhow::Result;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

pub trait TimeProvider: Send + Sync {
    fn now(&self) -> Result<DateTime<Local>>;
    fn label(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Result<DateTime<Local>> {
        Ok(Local::now())
    }

    fn label(&self) -> &'static str {
        "SYSTEM_LOCAL"
    }
}

/// Calendar fields handed to the template engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallClock {
    pub hour12: u32,
    pub minute: u32,
    pub second: u32,
    pub hour24: u32,
    /// Sunday = 0.
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub month_num: u32,
    pub month_name: &'static str,
    pub day_name: &'static str,
    pub year: i32,
    /// `M-D-YYYY`, unpadded.
    pub formatted_date: String,
}

impl WallClock {
    pub fn from_datetime<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let hour24 = now.hour();
        let (_, hour12) = now.hour12();
        let day_of_week = now.weekday().num_days_from_sunday();
        Self {
            hour12,
            minute: now.minute(),
            second: now.second(),
            hour24,
            day_of_week,
            day_of_month: now.day(),
            month_num: now.month(),
            month_name: MONTH_NAMES[now.month0() as usize],
            day_name: DAY_NAMES[day_of_week as usize],
            year: now.year(),
            formatted_date: format!("{}-{}-{}", now.month(), now.day(), now.year()),
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];
