use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Resolves a name from the fixed palette.
    pub fn named(name: &str) -> Option<Self> {
        let color = match name.trim().to_ascii_lowercase().as_str() {
            "red" => Color::rgb(128, 0, 0),
            "orange" => Color::rgb(253, 88, 0),
            "yellow" => Color::rgb(255, 228, 0),
            "green" => Color::rgb(0, 160, 0),
            "blue" => Color::rgb(0, 64, 255),
            "purple" => Color::rgb(128, 0, 128),
            "pink" => Color::rgb(228, 0, 228),
            "white" => Color::rgb(255, 255, 255),
            "gray" => Color::rgb(128, 128, 128),
            "black" => Color::BLACK,
            "brown" => Color::rgb(101, 67, 33),
            "night_time" => Color::rgb(128, 0, 0),
            _ => return None,
        };
        Some(color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    Small,
    Medium,
    Large,
    LargeBold,
}

impl FontSize {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "small" => Some(FontSize::Small),
            "medium" => Some(FontSize::Medium),
            "large" => Some(FontSize::Large),
            "large_bold" => Some(FontSize::LargeBold),
            _ => None,
        }
    }

    pub fn glyph_width(self) -> u32 {
        match self {
            FontSize::Small => 5,
            FontSize::Medium => 6,
            FontSize::Large | FontSize::LargeBold => 8,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            FontSize::Small => "5x8.bdf",
            FontSize::Medium => "6x9.bdf",
            FontSize::Large => "8x13.bdf",
            FontSize::LargeBold => "8x13B.bdf",
        }
    }
}

/// A font resolved once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Font {
    BuiltIn { size: FontSize, resource: PathBuf },
    Custom { name: String, resource: PathBuf, glyph_width: u32 },
}

impl Font {
    pub fn built_in(size: FontSize, font_dir: &Path) -> Self {
        Font::BuiltIn {
            size,
            resource: font_dir.join(size.file_name()),
        }
    }

    /// Resolves a size class or a custom BDF font under `font_dir`.
    ///
    /// Missing or unreadable custom fonts fall back to `medium`; each name is
    /// reported once per `warned` set.
    pub fn resolve(name: &str, font_dir: &Path, warned: &mut HashSet<String>) -> Self {
        if let Some(size) = FontSize::from_name(name) {
            return Font::built_in(size, font_dir);
        }

        let mut resource = font_dir.join(name);
        if resource.extension().is_none() {
            resource.set_extension("bdf");
        }
        match read_bdf_glyph_width(&resource) {
            Ok(glyph_width) => Font::Custom {
                name: name.to_string(),
                resource,
                glyph_width,
            },
            Err(err) => {
                if warned.insert(name.to_string()) {
                    warn!("font '{name}' unavailable, falling back to medium: {err:#}");
                }
                Font::built_in(FontSize::Medium, font_dir)
            }
        }
    }

    pub fn glyph_width(&self) -> u32 {
        match self {
            Font::BuiltIn { size, .. } => size.glyph_width(),
            Font::Custom { glyph_width, .. } => *glyph_width,
        }
    }

    pub fn resource(&self) -> &Path {
        match self {
            Font::BuiltIn { resource, .. } | Font::Custom { resource, .. } => resource,
        }
    }
}

fn read_bdf_glyph_width(path: &Path) -> Result<u32> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read font file {}", path.display()))?;
    parse_bdf_glyph_width(&content).with_context(|| format!("in font file {}", path.display()))
}

fn parse_bdf_glyph_width(content: &str) -> Result<u32> {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("FONTBOUNDINGBOX") {
            continue;
        }
        let width: u32 = fields
            .next()
            .context("FONTBOUNDINGBOX is missing its width")?
            .parse()
            .context("FONTBOUNDINGBOX width is not a number")?;
        if width == 0 {
            bail!("FONTBOUNDINGBOX width must be > 0");
        }
        return Ok(width);
    }
    bail!("no FONTBOUNDINGBOX line found")
}
