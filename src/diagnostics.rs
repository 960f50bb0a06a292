use std::path::Path;

use chrono::{DateTime, TimeZone};

use crate::display::{compose_frame, describe_frame};
use crate::face::config::ClockConfig;
use crate::face::scheduler::ClockScheduler;
use crate::runtime::FrameData;
use crate::time_provider::WallClock;
use crate::weather::WeatherReport;

/// Human-readable summary of a loaded configuration and what it would show at `now`.
pub fn check_report<Tz: TimeZone>(path: &Path, config: ClockConfig, now: &DateTime<Tz>) -> String {
    let mut lines = Vec::new();
    lines.push("matrixclock configuration check".to_string());
    lines.push(format!("Config file: {}", path.display()));

    let settings = config.settings.clone();
    lines.push(format!("Display width: {} px", settings.matrix_width));
    lines.push(format!(
        "Font directory: {}",
        settings.font_directory.display()
    ));
    lines.push(format!(
        "Weather URL: {}",
        settings.weather_url.as_deref().unwrap_or("(none)")
    ));
    lines.push(format!(
        "Timer face: {} (hold {}s, blink {}, notify {})",
        settings.timer_face.as_deref().unwrap_or("(none)"),
        settings.timer_hold_seconds,
        if settings.timer_blink { "on" } else { "off" },
        if settings.notify_on_timer_end { "on" } else { "off" }
    ));

    lines.push(format!("Clock faces: {}", config.faces.len()));
    for face in &config.faces {
        lines.push(format!(
            "  {} ({} period(s), {} line(s), {} refresh)",
            face.display_name(),
            face.periods().len(),
            face.lines().len(),
            if face.needs_second_granularity() {
                "per-second"
            } else {
                "per-minute"
            }
        ));
        for period in face.periods() {
            let (start_hour, start_minute) = period.start();
            let (end_hour, end_minute) = period.end();
            let days = if period.active_days().is_empty() {
                "every day".to_string()
            } else {
                period
                    .active_days()
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            };
            lines.push(format!(
                "    {start_hour:02}:{start_minute:02}-{end_hour:02}:{end_minute:02} ({days})"
            ));
        }
    }
    lines.push(format!("Notifications: {}", config.notifications.len()));

    let clock = WallClock::from_datetime(now);
    let mut scheduler = ClockScheduler::new(config);
    scheduler.resolve(clock.hour24, clock.minute, clock.day_of_week);
    let face = scheduler.current_face();
    lines.push(format!(
        "Active face at {}:{:02} on {}: {}",
        clock.hour24,
        clock.minute,
        clock.day_name,
        face.display_name()
    ));

    let weather = WeatherReport::default();
    let data = FrameData {
        clock: &clock,
        weather: &weather,
        timer: None,
    };
    let frame = compose_frame(face, &data, settings.matrix_width);
    lines.push(format!("Frame: {}", describe_frame(&frame)));
    lines.join("\n")
}
