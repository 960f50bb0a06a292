use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::debug;

use crate::face::model::ClockFace;
use crate::face::style::Color;
use crate::layout::place;
use crate::template::{DataProvider, render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedText {
    pub x: i32,
    pub y: i32,
    pub color: Color,
    pub font: PathBuf,
    pub text: String,
}

/// Everything one redraw needs, already positioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub face: String,
    pub background: Color,
    pub lines: Vec<PlacedText>,
}

pub fn compose_frame(face: &ClockFace, provider: &dyn DataProvider, display_width: u32) -> Frame {
    let lines = face
        .lines()
        .iter()
        .map(|line| {
            let rendered = render(&line.template, provider);
            let (x, text) = place(
                &rendered,
                line.font.glyph_width(),
                display_width,
                line.x_position,
            );
            PlacedText {
                x,
                y: line.y_position,
                color: line.color,
                font: line.font.resource().to_path_buf(),
                text,
            }
        })
        .collect();
    Frame {
        face: face.name().to_string(),
        background: face.background(),
        lines,
    }
}

/// Output device. Calls are never made concurrently.
pub trait Display: Send {
    fn render(&mut self, frame: &Frame) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Writes each frame as one text line.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Display for ConsoleDisplay<W> {
    fn render(&mut self, frame: &Frame) -> Result<()> {
        writeln!(self.out, "{}", describe_frame(frame)).context("failed to write frame")?;
        self.out.flush().context("failed to flush frame")
    }

    fn clear(&mut self) -> Result<()> {
        writeln!(self.out, "[display cleared]").context("failed to write clear")?;
        self.out.flush().context("failed to flush clear")
    }
}

pub fn describe_frame(frame: &Frame) -> String {
    let mut line = format!("[{}] bg={}", frame.face, hex(frame.background));
    for text in &frame.lines {
        line.push_str(&format!(
            " | ({},{}) {} \"{}\"",
            text.x,
            text.y,
            hex(text.color),
            text.text
        ));
    }
    line
}

fn hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

pub trait Buzzer: Send {
    fn set(&mut self, on: bool);
}

/// Tracks buzzer state without driving hardware.
#[derive(Debug, Default)]
pub struct NullBuzzer {
    pin: Option<u32>,
    on: bool,
}

impl NullBuzzer {
    pub fn new(pin: Option<u32>) -> Self {
        Self { pin, on: false }
    }
}

impl Buzzer for NullBuzzer {
    fn set(&mut self, on: bool) {
        if self.on != on {
            match self.pin {
                Some(pin) => debug!("buzzer pin {pin} -> {}", if on { "on" } else { "off" }),
                None => debug!("buzzer -> {}", if on { "on" } else { "off" }),
            }
        }
        self.on = on;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::face::model::TextLine;
    use crate::face::style::{Font, FontSize};
    use crate::template::tests::FixedData;

    fn face() -> ClockFace {
        let fonts = Path::new("fonts");
        ClockFace::new(
            "Day",
            Color::rgb(0, 0, 32),
            vec![
                TextLine {
                    color: Color::rgb(255, 255, 255),
                    font: Font::built_in(FontSize::Medium, fonts),
                    x_position: -1,
                    y_position: 12,
                    template: "{hour}:{minute}".to_string(),
                },
                TextLine {
                    color: Color::rgb(253, 88, 0),
                    font: Font::built_in(FontSize::Small, fonts),
                    x_position: 2,
                    y_position: 30,
                    template: "{day_name}, {month_name}".to_string(),
                },
            ],
            Vec::new(),
        )
    }

    #[test]
    fn composes_positioned_lines() {
        let frame = compose_frame(&face(), &FixedData::at(12, 34, 0), 64);
        assert_eq!(frame.background, Color::rgb(0, 0, 32));
        assert_eq!(frame.lines[0].x, 17);
        assert_eq!(frame.lines[0].text, "12:34");
        assert_eq!(frame.lines[0].font, Path::new("fonts/6x9.bdf"));
        assert_eq!(frame.lines[1].x, 2);
        assert_eq!(frame.lines[1].text, "Wednesday, N");
    }

    #[test]
    fn console_display_writes_one_line_per_frame() {
        let frame = compose_frame(&face(), &FixedData::at(9, 5, 0), 64);
        let mut display = ConsoleDisplay::new(Vec::new());
        display.render(&frame).expect("render");
        display.clear().expect("clear");
        let output = String::from_utf8(display.into_inner()).expect("utf8");
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[Day] bg=#000020"));
        assert!(lines[0].contains("(20,12) #ffffff \"9:05\""));
        assert_eq!(lines[1], "[display cleared]");
    }
}
