use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::face::model::{ClockFace, EMPTY_FACE_NAME, TextLine, X_CENTERED};
use crate::face::period::TimePeriod;
use crate::face::style::{Color, Font};
use crate::notify::ScheduledNotification;

#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub settings: ClockSettings,
    pub faces: Vec<ClockFace>,
    pub notifications: Vec<ScheduledNotification>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockSettings {
    pub weather_url: Option<String>,
    pub font_directory: PathBuf,
    pub matrix_width: u32,
    pub timer_face: Option<String>,
    pub notify_on_timer_end: bool,
    pub timer_hold_seconds: u32,
    pub timer_blink: bool,
    pub buzzer_pin: Option<u32>,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            weather_url: None,
            font_directory: PathBuf::from(default_font_directory()),
            matrix_width: default_matrix_width(),
            timer_face: None,
            notify_on_timer_end: false,
            timer_hold_seconds: default_timer_hold_seconds(),
            timer_blink: default_timer_blink(),
            buzzer_pin: None,
        }
    }
}

pub fn load_clock_config(path: &Path) -> Result<ClockConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_clock_config_text(&content)
}

pub fn parse_clock_config_text(content: &str) -> Result<ClockConfig> {
    let raw = serde_json::from_str::<ClockConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    let data = raw.clock_data;
    if data.matrix_width == 0 {
        bail!("clock_data.matrix_width must be > 0");
    }
    if data.timer_hold_seconds == 0 {
        bail!("clock_data.timer_hold_seconds must be >= 1");
    }
    let font_directory = PathBuf::from(&data.font_directory);

    let mut names = HashSet::new();
    let mut warned_fonts = HashSet::new();
    let mut faces = Vec::with_capacity(raw.clock_faces.len());
    for face in raw.clock_faces {
        let name = face.name.trim().to_string();
        if name.is_empty() {
            bail!("clock face names must not be empty");
        }
        if name.eq_ignore_ascii_case(EMPTY_FACE_NAME) {
            bail!("clock face name '{EMPTY_FACE_NAME}' is reserved");
        }
        if !names.insert(name.to_lowercase()) {
            bail!("duplicate clock face name found: {name}");
        }

        let background = face
            .bg_color
            .to_color()
            .with_context(|| format!("clock face '{name}' has an invalid bg_color"))?;

        let mut periods = Vec::with_capacity(face.time_periods.len());
        for (index, period) in face.time_periods.into_iter().enumerate() {
            let period = period
                .into_period()
                .with_context(|| format!("clock face '{name}' time_periods[{index}]"))?;
            periods.push(period);
        }

        let mut lines = Vec::with_capacity(face.text_lines.len());
        for (index, line) in face.text_lines.into_iter().enumerate() {
            let line = line
                .into_text_line(&font_directory, &mut warned_fonts)
                .with_context(|| format!("clock face '{name}' text_lines[{index}]"))?;
            lines.push(line);
        }

        faces.push(ClockFace::new(name, background, lines, periods));
    }

    if let Some(timer_face) = &data.timer_face
        && !faces.iter().any(|face| face.matches_name(timer_face))
    {
        bail!("timer_face '{timer_face}' does not name a configured clock face");
    }

    let mut notifications = Vec::with_capacity(raw.notifications.len());
    for (index, notification) in raw.notifications.into_iter().enumerate() {
        if !(-23..=23).contains(&notification.hour) {
            bail!("notifications[{index}] hour must be within -23..=23");
        }
        if notification.minute > 59 {
            bail!("notifications[{index}] minute must be within 0..=59");
        }
        let active_days = validate_days(notification.days_of_week)
            .with_context(|| format!("notifications[{index}]"))?;
        notifications.push(ScheduledNotification {
            message: notification.message,
            hour: notification.hour,
            minute: notification.minute,
            active_days,
        });
    }

    Ok(ClockConfig {
        settings: ClockSettings {
            weather_url: data.weather_url.filter(|url| !url.trim().is_empty()),
            font_directory,
            matrix_width: data.matrix_width,
            timer_face: data.timer_face,
            notify_on_timer_end: data.notify_on_timer_end,
            timer_hold_seconds: data.timer_hold_seconds,
            timer_blink: data.timer_blink,
            buzzer_pin: data.buzzer_pin,
        },
        faces,
        notifications,
    })
}

fn validate_days(days: Vec<u32>) -> Result<Vec<u32>> {
    if let Some(day) = days.iter().find(|day| **day > 6) {
        bail!("day_of_week {day} is outside 0..=6 (0 = Sunday)");
    }
    Ok(days)
}

fn validate_x_position(x_position: i32) -> Result<()> {
    if x_position >= X_CENTERED {
        return Ok(());
    }
    let magnitude = x_position.unsigned_abs();
    let slots = magnitude / 10;
    let slot_index = magnitude % 10;
    if slots == 0 {
        bail!("x_position {x_position} encodes zero slots");
    }
    if slot_index == 0 || slot_index > slots {
        bail!("x_position {x_position} selects slot {slot_index} of {slots}");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ClockConfigFile {
    #[serde(default)]
    clock_data: ClockDataFile,
    #[serde(default)]
    clock_faces: Vec<ClockFaceFile>,
    #[serde(default, alias = "telegram_notifications")]
    notifications: Vec<NotificationFile>,
}

#[derive(Debug, Deserialize)]
struct ClockDataFile {
    #[serde(default)]
    weather_url: Option<String>,
    #[serde(default = "default_font_directory")]
    font_directory: String,
    #[serde(default = "default_matrix_width")]
    matrix_width: u32,
    #[serde(default)]
    timer_face: Option<String>,
    #[serde(default)]
    notify_on_timer_end: bool,
    #[serde(default = "default_timer_hold_seconds")]
    timer_hold_seconds: u32,
    #[serde(default = "default_timer_blink")]
    timer_blink: bool,
    #[serde(default)]
    buzzer_pin: Option<u32>,
}

impl Default for ClockDataFile {
    fn default() -> Self {
        Self {
            weather_url: None,
            font_directory: default_font_directory(),
            matrix_width: default_matrix_width(),
            timer_face: None,
            notify_on_timer_end: false,
            timer_hold_seconds: default_timer_hold_seconds(),
            timer_blink: default_timer_blink(),
            buzzer_pin: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClockFaceFile {
    name: String,
    #[serde(default)]
    bg_color: ColorFile,
    #[serde(default)]
    time_periods: Vec<TimePeriodFile>,
    #[serde(default)]
    text_lines: Vec<TextLineFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ColorFile {
    #[serde(default)]
    built_in_color: Option<String>,
    #[serde(default)]
    r: i64,
    #[serde(default)]
    g: i64,
    #[serde(default)]
    b: i64,
}

impl ColorFile {
    fn to_color(&self) -> Result<Color> {
        match self.built_in_color.as_deref().map(str::trim) {
            None | Some("none") => Ok(Color::rgb(
                channel("r", self.r)?,
                channel("g", self.g)?,
                channel("b", self.b)?,
            )),
            Some(name) => Color::named(name).with_context(|| format!("unknown color '{name}'")),
        }
    }
}

fn channel(label: &str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("color component {label}={value} is outside 0..=255"))
}

#[derive(Debug, Deserialize)]
struct TimePeriodFile {
    start_hour: u32,
    start_minute: u32,
    end_hour: u32,
    end_minute: u32,
    #[serde(default)]
    days_of_week: Vec<u32>,
}

impl TimePeriodFile {
    fn into_period(self) -> Result<TimePeriod> {
        for (label, hour) in [("start_hour", self.start_hour), ("end_hour", self.end_hour)] {
            if hour > 23 {
                bail!("{label} {hour} is outside 0..=23");
            }
        }
        for (label, minute) in [
            ("start_minute", self.start_minute),
            ("end_minute", self.end_minute),
        ] {
            if minute > 59 {
                bail!("{label} {minute} is outside 0..=59");
            }
        }
        Ok(TimePeriod::with_days(
            self.start_hour,
            self.start_minute,
            self.end_hour,
            self.end_minute,
            validate_days(self.days_of_week)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TextLineFile {
    #[serde(default)]
    color: ColorFile,
    #[serde(default = "default_font_size")]
    font_size: String,
    #[serde(default = "default_x_position")]
    x_position: i32,
    #[serde(default)]
    y_position: i32,
    #[serde(default)]
    text: String,
}

impl TextLineFile {
    fn into_text_line(self, font_dir: &Path, warned_fonts: &mut HashSet<String>) -> Result<TextLine> {
        let color = self.color.to_color().context("invalid color")?;
        validate_x_position(self.x_position)?;
        Ok(TextLine {
            color,
            font: Font::resolve(self.font_size.trim(), font_dir, warned_fonts),
            x_position: self.x_position,
            y_position: self.y_position,
            template: self.text,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NotificationFile {
    message: String,
    hour: i32,
    minute: u32,
    #[serde(default)]
    days_of_week: Vec<u32>,
}

fn default_font_directory() -> String {
    "fonts".to_string()
}

fn default_matrix_width() -> u32 {
    64
}

fn default_timer_hold_seconds() -> u32 {
    30
}

fn default_timer_blink() -> bool {
    true
}

fn default_font_size() -> String {
    "medium".to_string()
}

fn default_x_position() -> i32 {
    X_CENTERED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::style::FontSize;

    const VALID: &str = r#"
{
  "clock_data": {
    "weather_url": "http://weather.invalid/current",
    "bot_token": "legacy-ignored",
    "chat_id": 1234,
    "timer_face": "timer",
    "notify_on_timer_end": true,
    "timer_hold_seconds": 10
  },
  "clock_faces": [
    {
      "name": "Day",
      "bg_color": { "built_in_color": "none", "r": 0, "g": 0, "b": 32 },
      "time_periods": [
        { "start_hour": 7, "start_minute": 0, "end_hour": 22, "end_minute": 0, "days_of_week": [1, 2, 3, 4, 5] }
      ],
      "text_lines": [
        { "color": { "built_in_color": "white" }, "font_size": "large", "x_position": -1, "y_position": 12, "text": "{hour}:{minute}" },
        { "color": { "built_in_color": "orange" }, "font_size": "small", "x_position": -21, "y_position": 24, "text": "{temp}F" }
      ]
    },
    {
      "name": "Timer",
      "bg_color": { "built_in_color": "black" },
      "text_lines": [
        { "color": { "built_in_color": "red" }, "font_size": "large_bold", "x_position": -1, "y_position": 20, "text": "{timer}" }
      ]
    }
  ],
  "telegram_notifications": [
    { "message": "Good morning, it is {temp}F", "hour": 7, "minute": 0, "days_of_week": [1] },
    { "message": "Hourly", "hour": -1, "minute": 0 }
  ]
}
"#;

    #[test]
    fn parses_valid_clock_config() {
        let config = parse_clock_config_text(VALID).expect("valid config");
        assert_eq!(
            config.settings.weather_url.as_deref(),
            Some("http://weather.invalid/current")
        );
        assert_eq!(config.settings.matrix_width, 64);
        assert_eq!(config.settings.timer_hold_seconds, 10);
        assert!(config.settings.timer_blink);
        assert_eq!(config.faces.len(), 2);

        let day = &config.faces[0];
        assert_eq!(day.background(), Color::rgb(0, 0, 32));
        assert_eq!(day.lines()[0].font.glyph_width(), 8);
        assert_eq!(
            day.lines()[1].font,
            Font::built_in(FontSize::Small, Path::new("fonts"))
        );
        assert_eq!(day.periods()[0].active_days(), &[1, 2, 3, 4, 5]);
        assert_eq!(config.notifications.len(), 2);
        assert_eq!(config.notifications[1].hour, -1);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = parse_clock_config_text("{}").expect("empty object is valid");
        assert!(config.faces.is_empty());
        assert_eq!(config.settings, ClockSettings::default());
    }

    #[test]
    fn rejects_duplicate_names_case_insensitively() {
        let json = r#"{ "clock_faces": [ { "name": "Night" }, { "name": "NIGHT" } ] }"#;
        let err = parse_clock_config_text(json).expect_err("duplicate names should fail");
        assert!(err.to_string().contains("duplicate clock face name"));
    }

    #[test]
    fn rejects_reserved_name() {
        let json = r#"{ "clock_faces": [ { "name": "~EMPTY~" } ] }"#;
        let err = parse_clock_config_text(json).expect_err("reserved name should fail");
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn rejects_unknown_color() {
        let json = r#"{ "clock_faces": [ { "name": "a", "bg_color": { "built_in_color": "teal" } } ] }"#;
        let err = parse_clock_config_text(json).expect_err("unknown color should fail");
        assert!(format!("{err:#}").contains("unknown color 'teal'"));
    }

    #[test]
    fn rejects_out_of_range_rgb() {
        let json = r#"{ "clock_faces": [ { "name": "a", "bg_color": { "built_in_color": "none", "r": 300 } } ] }"#;
        let err = parse_clock_config_text(json).expect_err("rgb out of range should fail");
        assert!(format!("{err:#}").contains("r=300"));
    }

    #[test]
    fn rejects_bad_period_fields() {
        let json = r#"{ "clock_faces": [ { "name": "a", "time_periods": [
            { "start_hour": 24, "start_minute": 0, "end_hour": 1, "end_minute": 0 } ] } ] }"#;
        let err = parse_clock_config_text(json).expect_err("hour 24 should fail");
        assert!(format!("{err:#}").contains("start_hour 24"));

        let json = r#"{ "clock_faces": [ { "name": "a", "time_periods": [
            { "start_hour": 1, "start_minute": 0, "end_hour": 2, "end_minute": 0, "days_of_week": [7] } ] } ] }"#;
        let err = parse_clock_config_text(json).expect_err("day 7 should fail");
        assert!(format!("{err:#}").contains("day_of_week 7"));
    }

    #[test]
    fn rejects_malformed_slots() {
        for x in [-5, -20, -23] {
            let json = format!(
                r#"{{ "clock_faces": [ {{ "name": "a", "text_lines": [ {{ "x_position": {x}, "text": "x" }} ] }} ] }}"#
            );
            let err = parse_clock_config_text(&json).expect_err("bad slot should fail");
            assert!(format!("{err:#}").contains("x_position"), "x={x}: {err:#}");
        }
    }

    #[test]
    fn accepts_x_past_the_display_edge() {
        let json = r#"{ "clock_faces": [ { "name": "a", "text_lines": [ { "x_position": 90, "text": "x" } ] } ] }"#;
        let config = parse_clock_config_text(json).expect("x past edge is allowed");
        assert_eq!(config.faces[0].lines()[0].x_position, 90);
    }

    #[test]
    fn rejects_unknown_timer_face() {
        let json = r#"{ "clock_data": { "timer_face": "ghost" }, "clock_faces": [ { "name": "a" } ] }"#;
        let err = parse_clock_config_text(json).expect_err("unknown timer face should fail");
        assert!(err.to_string().contains("timer_face 'ghost'"));
    }

    #[test]
    fn rejects_zero_hold_seconds() {
        let json = r#"{ "clock_data": { "timer_hold_seconds": 0 } }"#;
        let err = parse_clock_config_text(json).expect_err("zero hold should fail");
        assert!(err.to_string().contains("timer_hold_seconds"));
    }

    #[test]
    fn reports_json_position() {
        let err = parse_clock_config_text("{\n  \"clock_faces\": [\n").expect_err("truncated json");
        assert!(err.to_string().contains("invalid JSON at line"));
    }
}
