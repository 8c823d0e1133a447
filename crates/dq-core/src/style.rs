//! Style keys
//!
//! The short names (`fs`, `ls`, `lw`, ...) are the argument keys a command or
//! scope uses to override surface state.

use std::collections::BTreeMap;

use crate::args::Args;
use crate::value::Value;

/// Surface style properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleKey {
    /// Fill color
    Fill,
    /// Stroke color
    Stroke,
    /// Line width
    LineWidth,
    /// Line cap
    LineCap,
    /// Line join
    LineJoin,
    /// Dash pattern
    LineDash,
    /// Dash offset
    LineDashOffset,
    /// Miter limit
    MiterLimit,
    /// Shadow `[offsetX, offsetY, blur, color]`
    Shadow,
    /// Font
    Font,
    /// Horizontal text alignment
    TextAlign,
    /// Text baseline
    TextBaseline,
}

impl StyleKey {
    /// Every key, in application order
    pub const ALL: [StyleKey; 12] = [
        StyleKey::Fill,
        StyleKey::Stroke,
        StyleKey::LineWidth,
        StyleKey::LineCap,
        StyleKey::LineJoin,
        StyleKey::LineDash,
        StyleKey::LineDashOffset,
        StyleKey::MiterLimit,
        StyleKey::Shadow,
        StyleKey::Font,
        StyleKey::TextAlign,
        StyleKey::TextBaseline,
    ];

    /// Argument key
    pub fn name(self) -> &'static str {
        match self {
            StyleKey::Fill => "fs",
            StyleKey::Stroke => "ls",
            StyleKey::LineWidth => "lw",
            StyleKey::LineCap => "lc",
            StyleKey::LineJoin => "lj",
            StyleKey::LineDash => "ld",
            StyleKey::LineDashOffset => "ldoff",
            StyleKey::MiterLimit => "ml",
            StyleKey::Shadow => "sh",
            StyleKey::Font => "font",
            StyleKey::TextAlign => "thal",
            StyleKey::TextBaseline => "tval",
        }
    }

    /// Parse an argument key
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A set of style overrides
pub type Style = BTreeMap<StyleKey, Value>;

/// Collect the style keys present on an argument object
pub fn style_of(args: &Args) -> Style {
    StyleKey::ALL
        .into_iter()
        .filter_map(|key| args.get(key.name()).map(|v| (key, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for key in StyleKey::ALL {
            assert_eq!(StyleKey::from_name(key.name()), Some(key), "{key:?}");
        }
        assert_eq!(StyleKey::from_name("x"), None);
    }

    #[test]
    fn test_style_of_picks_style_keys() {
        let args = Args::new().with("x", 1.0).with("ls", "red").with("lw", 3.0);
        let style = style_of(&args);
        assert_eq!(style.len(), 2);
        assert_eq!(style.get(&StyleKey::Stroke), Some(&Value::from("red")));
    }
}
