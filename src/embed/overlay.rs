//! Overlay parameters and their rendering as an ffmpeg `subtitles` filter.

use crate::error::{Error, Result};
use std::path::Path;

/// Ordered key/value overlay parameters. Keys appear in a fixed order and
/// zero or absent values are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlaySpec {
    params: Vec<(&'static str, String)>,
}

impl OverlaySpec {
    pub(crate) fn push(&mut self, key: &'static str, value: impl ToString) {
        self.params.push((key, value.to_string()));
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `fontsize=24:fontcolor=white:...`
    pub fn to_key_values(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// ASS style override understood by libass, e.g.
    /// `Fontsize=24,PrimaryColour=&H00FFFFFF,...`.
    ///
    /// A box switches to BorderStyle 3, where libass fills the box with the
    /// outline colour and pads it by the outline width.
    pub fn force_style(&self) -> Result<String> {
        let mut fields = Vec::new();
        if let Some(size) = self.get("fontsize") {
            fields.push(format!("Fontsize={}", size));
        }
        if let Some(color) = self.get("fontcolor") {
            fields.push(format!("PrimaryColour={}", ass_color(color)?));
        }
        match (self.get("box"), self.get("boxcolor")) {
            (Some(_), Some(box_color)) => {
                fields.push("BorderStyle=3".to_string());
                fields.push(format!("OutlineColour={}", ass_color(box_color)?));
                fields.push(format!("Outline={}", self.get("boxborderw").unwrap_or("0")));
            }
            _ => {
                if let Some(color) = self.get("outlinecolor") {
                    fields.push(format!("OutlineColour={}", ass_color(color)?));
                }
                fields.push(format!("Outline={}", self.get("outline").unwrap_or("0")));
            }
        }
        let depth = self.get("shadowoffset").or_else(|| self.get("shadow")).unwrap_or("0");
        fields.push(format!("Shadow={}", depth));
        if let Some(color) = self.get("shadowcolor") {
            fields.push(format!("BackColour={}", ass_color(color)?));
        }
        Ok(fields.join(","))
    }

    /// Filter argument for `ffmpeg -vf`, rendering `srt_path` with this overlay.
    pub fn filter_for(&self, srt_path: &Path) -> Result<String> {
        let path = srt_path.to_string_lossy();
        Ok(format!(
            "subtitles=filename={}:force_style={}",
            escape_filtergraph(&escape_option_value(&path)),
            escape_filtergraph(&escape_option_value(&self.force_style()?)),
        ))
    }
}

/// First escaping level: a value inside a filter's option list.
fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Second escaping level: a filter description inside a filtergraph.
fn escape_filtergraph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("white", (255, 255, 255)),
    ("black", (0, 0, 0)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("cyan", (0, 255, 255)),
    ("magenta", (255, 0, 255)),
    ("orange", (255, 165, 0)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
];

/// Red, green, blue and opacity (0 = transparent, 255 = opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rgba(pub u8, pub u8, pub u8, pub u8);

/// Accepts a colour name, `#RRGGBB`, `rgb(r,g,b)` or `rgba(r,g,b,a)` with `a` in 0..=1.
pub(crate) fn parse_color(raw: &str) -> Result<Rgba> {
    let color = raw.trim().to_ascii_lowercase();
    let invalid = || Error::validation("color", format!("Unsupported color: {}", raw));

    if let Some((_, (r, g, b))) = NAMED_COLORS.iter().find(|(name, _)| *name == color) {
        return Ok(Rgba(*r, *g, *b, 255));
    }
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        return Ok(Rgba((value >> 16) as u8, (value >> 8) as u8, value as u8, 255));
    }
    let (args, with_alpha) = if let Some(args) = color.strip_prefix("rgba(") {
        (args, true)
    } else if let Some(args) = color.strip_prefix("rgb(") {
        (args, false)
    } else {
        return Err(invalid());
    };
    let parts: Vec<&str> = args
        .strip_suffix(')')
        .ok_or_else(invalid)?
        .split(',')
        .map(str::trim)
        .collect();
    if parts.len() != if with_alpha { 4 } else { 3 } {
        return Err(invalid());
    }
    let channel = |s: &str| s.parse::<u8>().map_err(|_| invalid());
    let alpha = if with_alpha {
        let a: f64 = parts[3].parse().map_err(|_| invalid())?;
        if !(0.0..=1.0).contains(&a) {
            return Err(invalid());
        }
        (a * 255.0).round() as u8
    } else {
        255
    };
    Ok(Rgba(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha))
}

/// `&HAABBGGRR`, where AA is transparency.
fn ass_color(raw: &str) -> Result<String> {
    let Rgba(r, g, b, a) = parse_color(raw)?;
    Ok(format!("&H{:02X}{:02X}{:02X}{:02X}", 255 - a, b, g, r))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pairs: &[(&'static str, &str)]) -> OverlaySpec {
        let mut spec = OverlaySpec::default();
        for (k, v) in pairs {
            spec.push(*k, v);
        }
        spec
    }

    #[test]
    fn parses_colors() {
        assert_eq!(parse_color("White").unwrap(), Rgba(255, 255, 255, 255));
        assert_eq!(parse_color("#FF8000").unwrap(), Rgba(255, 128, 0, 255));
        assert_eq!(parse_color("rgba(0,0,0,0.5)").unwrap(), Rgba(0, 0, 0, 128));
        assert_eq!(parse_color("rgb(1, 2, 3)").unwrap(), Rgba(1, 2, 3, 255));
        for bad in ["", "chartreuse-ish", "#12345", "rgba(0,0,0)", "rgba(0,0,0,2)", "rgb(256,0,0)"] {
            assert!(parse_color(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn ass_colors_are_bgr_with_transparency() {
        assert_eq!(ass_color("red").unwrap(), "&H000000FF");
        assert_eq!(ass_color("rgba(0,0,0,0.5)").unwrap(), "&H7F000000");
    }

    #[test]
    fn escapes_both_filter_levels() {
        let value = "this is a 'string': may contain one, or more, special characters";
        assert_eq!(
            escape_filtergraph(&escape_option_value(value)),
            r"this is a \\\'string\\\'\\: may contain one\, or more\, special characters"
        );
    }

    #[test]
    fn renders_filter_without_box() {
        let overlay = spec(&[
            ("fontsize", "24"),
            ("fontcolor", "white"),
            ("outline", "2"),
            ("outlinecolor", "black"),
            ("shadow", "1"),
            ("shadowcolor", "black"),
            ("shadowoffset", "2"),
        ]);
        assert_eq!(
            overlay.force_style().unwrap(),
            "Fontsize=24,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=2,Shadow=2,BackColour=&H00000000"
        );
        let filter = overlay.filter_for(Path::new("/tmp/burn-in.srt")).unwrap();
        assert!(filter.starts_with(r"subtitles=filename=/tmp/burn-in.srt:force_style=Fontsize=24\,PrimaryColour="));
    }

    #[test]
    fn box_uses_opaque_border_style() {
        let overlay = spec(&[
            ("outline", "1"),
            ("box", "1"),
            ("boxcolor", "rgba(0,0,0,0.5)"),
            ("boxborderw", "5"),
        ]);
        let style = overlay.force_style().unwrap();
        assert!(style.contains("BorderStyle=3,OutlineColour=&H7F000000,Outline=5"));
        assert_eq!(overlay.to_key_values(), "outline=1:box=1:boxcolor=rgba(0,0,0,0.5):boxborderw=5");
    }
}
