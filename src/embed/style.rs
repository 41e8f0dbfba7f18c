//! Named caption looks used when burning subtitles into video.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStyle {
    #[default]
    Default,
    Modern,
    Bold,
    Minimal,
}

/// Filled box drawn behind the caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backdrop {
    pub color: &'static str,
    pub border_width: u32,
}

/// Fixed rendering parameters of a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleParams {
    /// Added to the requested font size.
    pub font_size_delta: i32,
    pub outline_width: u32,
    pub shadow_width: u32,
    pub shadow_color: Option<&'static str>,
    pub shadow_offset: Option<u32>,
    pub backdrop: Option<Backdrop>,
}

impl SubtitleStyle {
    pub const ALL: [SubtitleStyle; 4] = [
        SubtitleStyle::Default,
        SubtitleStyle::Modern,
        SubtitleStyle::Bold,
        SubtitleStyle::Minimal,
    ];

    /// Unknown names resolve to `Default`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            SubtitleStyle::Default => "default",
            SubtitleStyle::Modern => "modern",
            SubtitleStyle::Bold => "bold",
            SubtitleStyle::Minimal => "minimal",
        }
    }

    pub fn params(self) -> StyleParams {
        match self {
            SubtitleStyle::Default => StyleParams {
                font_size_delta: 0,
                outline_width: 2,
                shadow_width: 1,
                shadow_color: Some("black"),
                shadow_offset: Some(2),
                backdrop: None,
            },
            SubtitleStyle::Modern => StyleParams {
                font_size_delta: 0,
                outline_width: 1,
                shadow_width: 2,
                shadow_color: Some("rgba(0,0,0,0.5)"),
                shadow_offset: Some(3),
                backdrop: Some(Backdrop {
                    color: "rgba(0,0,0,0.3)",
                    border_width: 5,
                }),
            },
            SubtitleStyle::Bold => StyleParams {
                font_size_delta: 4,
                outline_width: 3,
                shadow_width: 1,
                shadow_color: Some("black"),
                shadow_offset: Some(1),
                backdrop: None,
            },
            SubtitleStyle::Minimal => StyleParams {
                font_size_delta: -2,
                outline_width: 1,
                shadow_width: 0,
                shadow_color: None,
                shadow_offset: None,
                backdrop: None,
            },
        }
    }
}

impl fmt::Display for SubtitleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
