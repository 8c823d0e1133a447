//! Renderer configuration structures
//!
//! Settings for the render handler that can be serialized and loaded from
//! RON configuration files.

use dq_core::{DrawError, DrawResult, Style, StyleKey, Value};
use serde::{Deserialize, Serialize};

use crate::image::PLACEHOLDER_IMAGE_URI;

/// Base style applied at the start of every pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleConfig {
    /// Fill color
    pub fill: String,
    /// Stroke color
    pub stroke: String,
    /// Line width
    pub line_width: f64,
    /// Line cap (`butt`, `round`, `square`)
    pub line_cap: String,
    /// Line join (`miter`, `round`, `bevel`)
    pub line_join: String,
    /// Dash pattern, empty for solid lines
    pub line_dash: Vec<f64>,
    /// Miter limit
    pub miter_limit: f64,
    /// Shadow offset
    pub shadow: [f64; 2],
    /// CSS font
    pub font: String,
    /// Horizontal text alignment
    pub text_align: String,
    /// Text baseline
    pub text_baseline: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            fill: "transparent".into(),
            stroke: "#000".into(),
            line_width: 1.0,
            line_cap: "butt".into(),
            line_join: "miter".into(),
            line_dash: Vec::new(),
            miter_limit: 10.0,
            shadow: [0.0, 0.0],
            font: "16px serif".into(),
            text_align: "start".into(),
            text_baseline: "alphabetic".into(),
        }
    }
}

impl StyleConfig {
    /// Style map keyed by surface property
    pub fn to_style(&self) -> Style {
        Style::from([
            (StyleKey::Fill, Value::from(self.fill.as_str())),
            (StyleKey::Stroke, Value::from(self.stroke.as_str())),
            (StyleKey::LineWidth, Value::from(self.line_width)),
            (StyleKey::LineCap, Value::from(self.line_cap.as_str())),
            (StyleKey::LineJoin, Value::from(self.line_join.as_str())),
            (StyleKey::LineDash, Value::from(self.line_dash.clone())),
            (StyleKey::MiterLimit, Value::from(self.miter_limit)),
            (StyleKey::Shadow, Value::from(self.shadow)),
            (StyleKey::Font, Value::from(self.font.as_str())),
            (StyleKey::TextAlign, Value::from(self.text_align.as_str())),
            (StyleKey::TextBaseline, Value::from(self.text_baseline.as_str())),
        ])
    }
}

/// Adaptive background grid configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    /// Grid line color
    pub color: String,
    /// Initial mantissa of the grid step (1, 2 or 5)
    pub base: u32,
    /// Initial decimal exponent of the grid step
    pub exponent: i32,
    /// Smallest on-screen grid step in pixels
    pub min_px: f64,
    /// Largest on-screen grid step in pixels
    pub max_px: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::light()
    }
}

impl GridConfig {
    /// Create light theme grid config
    pub fn light() -> Self {
        Self {
            color: "#ccc".into(),
            base: 2,
            exponent: 1,
            min_px: 14.0,
            max_px: 35.0,
        }
    }

    /// Create dark theme grid config
    pub fn dark() -> Self {
        Self {
            color: "#444".into(),
            ..Self::light()
        }
    }
}

/// Complete renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RendererConfig {
    /// Base style
    #[serde(default)]
    pub default_style: StyleConfig,
    /// Base transform `[a, b, c, d, e, f]`
    #[serde(default = "default_base_transform")]
    pub base_transform: [f64; 6],
    /// Grid settings
    #[serde(default)]
    pub grid: GridConfig,
    /// Image drawn in place of one that fails to load
    #[serde(default = "default_placeholder")]
    pub placeholder_image: String,
}

fn default_base_transform() -> [f64; 6] {
    // half-pixel offset
    [1.0, 0.0, 0.0, 1.0, 0.5, 0.5]
}

fn default_placeholder() -> String {
    PLACEHOLDER_IMAGE_URI.to_string()
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            default_style: StyleConfig::default(),
            base_transform: default_base_transform(),
            grid: GridConfig::default(),
            placeholder_image: default_placeholder(),
        }
    }
}

impl RendererConfig {
    /// Create a new renderer configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from RON text. Missing sections take their defaults.
    pub fn from_ron(text: &str) -> DrawResult<Self> {
        ron::from_str(text).map_err(|e| DrawError::Config(e.to_string()))
    }

    /// Serialize to pretty RON text
    pub fn to_ron(&self) -> DrawResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DrawError::Config(e.to_string()))
    }

    /// Apply dark theme colors to the grid
    pub fn apply_dark_theme(&mut self) {
        self.grid = GridConfig {
            base: self.grid.base,
            exponent: self.grid.exponent,
            ..GridConfig::dark()
        };
    }

    /// Apply light theme colors to the grid
    pub fn apply_light_theme(&mut self) {
        self.grid = GridConfig {
            base: self.grid.base,
            exponent: self.grid.exponent,
            ..GridConfig::light()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_table() {
        let style = StyleConfig::default().to_style();
        assert_eq!(style.get(&StyleKey::Fill), Some(&Value::from("transparent")));
        assert_eq!(style.get(&StyleKey::LineWidth), Some(&Value::from(1.0)));
        assert_eq!(style.get(&StyleKey::LineDash), Some(&Value::List(Vec::new())));
        assert!(
            !style.contains_key(&StyleKey::LineDashOffset),
            "dash offset is left to the surface"
        );
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = RendererConfig::from_ron("(grid: (color: \"#eee\", base: 5, exponent: 0, min_px: 10.0, max_px: 25.0))")
            .expect("valid config");
        assert_eq!(config.grid.color, "#eee");
        assert_eq!(config.base_transform, [1.0, 0.0, 0.0, 1.0, 0.5, 0.5]);
        assert_eq!(config.default_style, StyleConfig::default());
        assert_eq!(config.placeholder_image, PLACEHOLDER_IMAGE_URI);
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = RendererConfig::new();
        config.default_style.line_width = 2.5;
        config.apply_dark_theme();
        let text = config.to_ron().expect("serializable");
        assert_eq!(RendererConfig::from_ron(&text), Ok(config));
    }

    #[test]
    fn test_invalid_ron_is_config_error() {
        let err = RendererConfig::from_ron("(grid: 3)").unwrap_err();
        assert!(matches!(err, DrawError::Config(_)), "got {err:?}");
    }
}
