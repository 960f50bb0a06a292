use crate::face::period::TimePeriod;
use crate::face::style::{Color, Font};

pub const EMPTY_FACE_NAME: &str = "~empty~";
pub const SECONDS_TOKEN: &str = "{second}";

/// `x_position == -1` centers the line; values below that encode a slot as
/// `-(slots * 10 + slot_index)`.
pub const X_CENTERED: i32 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub color: Color,
    pub font: Font,
    pub x_position: i32,
    pub y_position: i32,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockFace {
    name: String,
    background: Color,
    lines: Vec<TextLine>,
    periods: Vec<TimePeriod>,
    has_seconds_token: bool,
}

impl ClockFace {
    pub fn new(
        name: impl Into<String>,
        background: Color,
        lines: Vec<TextLine>,
        periods: Vec<TimePeriod>,
    ) -> Self {
        let has_seconds_token = lines
            .iter()
            .any(|line| line.template.contains(SECONDS_TOKEN));
        Self {
            name: name.into(),
            background,
            lines,
            periods,
            has_seconds_token,
        }
    }

    /// The reserved fallback face: black, no lines, never scheduled.
    pub fn empty() -> Self {
        Self::new(EMPTY_FACE_NAME, Color::BLACK, Vec::new(), Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First letter upper-cased, the rest lower-cased.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    pub fn periods(&self) -> &[TimePeriod] {
        &self.periods
    }

    pub fn is_empty_face(&self) -> bool {
        self.name == EMPTY_FACE_NAME
    }

    pub fn is_active_at(&self, hour: u32, minute: u32, day_of_week: u32) -> bool {
        self.periods
            .iter()
            .any(|period| period.in_period(hour, minute, day_of_week))
    }

    pub fn needs_second_granularity(&self) -> bool {
        self.has_seconds_token
    }
}
