//! Positioned text spans.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Axis-aligned box in top-down page coordinates.
///
/// `y0` is the top edge and grows towards the bottom of the page, so a
/// larger `y0` means the span sits lower on the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Vertical midpoint, used when grouping spans into lines.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }
}

/// Font style flags attached to a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct FontFlags(u8);

impl FontFlags {
    pub const BOLD: FontFlags = FontFlags(1);
    pub const ITALIC: FontFlags = FontFlags(1 << 1);
    pub const MONOSPACE: FontFlags = FontFlags(1 << 2);
    pub const SERIF: FontFlags = FontFlags(1 << 3);

    /// No flags set.
    pub const fn empty() -> Self {
        FontFlags(0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: FontFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_bold(self) -> bool {
        self.contains(Self::BOLD)
    }

    pub fn is_italic(self) -> bool {
        self.contains(Self::ITALIC)
    }

    /// Infer style flags from a PostScript font name such as
    /// `"Helvetica-BoldOblique"` or `"ABCDEF+NotoSansJP-Black"`.
    pub fn from_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let mut flags = FontFlags::empty();
        if ["bold", "black", "heavy", "semibold", "demi"]
            .iter()
            .any(|w| lower.contains(w))
        {
            flags = flags | Self::BOLD;
        }
        if lower.contains("italic") || lower.contains("oblique") {
            flags = flags | Self::ITALIC;
        }
        if ["mono", "courier", "consol"].iter().any(|w| lower.contains(w)) {
            flags = flags | Self::MONOSPACE;
        }
        if ["times", "serif", "mincho", "georgia"]
            .iter()
            .any(|w| lower.contains(w))
            && !lower.contains("sans")
        {
            flags = flags | Self::SERIF;
        }
        flags
    }
}

impl BitOr for FontFlags {
    type Output = FontFlags;

    fn bitor(self, rhs: FontFlags) -> FontFlags {
        FontFlags(self.0 | rhs.0)
    }
}

/// A contiguous run of text reported by the page's text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// Effective font size in points
    pub font_size: f32,
    /// Style flags
    pub font_flags: FontFlags,
    /// Position on the page (top-down coordinates)
    pub bbox: BoundingBox,
    /// Page number (1-indexed)
    pub page_number: u32,
}

impl TextSpan {
    /// Create a new text span.
    pub fn new(
        text: impl Into<String>,
        font_size: f32,
        font_flags: FontFlags,
        bbox: BoundingBox,
        page_number: u32,
    ) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_flags,
            bbox,
            page_number,
        }
    }

    /// Trimmed text, as used by classification and rendering.
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}
