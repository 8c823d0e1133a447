//! Interactor configuration

use dq_core::{DrawError, DrawResult};
use serde::{Deserialize, Serialize};

/// Pointer interaction settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InteractorConfig {
    /// Hit tolerance in pixels at scale 1
    pub eps: f64,
    /// Scale factor applied on a forward wheel step
    pub zoom_in: f64,
    /// Scale factor applied on a backward wheel step
    pub zoom_out: f64,
}

impl Default for InteractorConfig {
    fn default() -> Self {
        Self {
            eps: 5.0,
            zoom_in: 0.8,
            zoom_out: 1.25,
        }
    }
}

impl InteractorConfig {
    /// Create a new interactor configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from RON text
    pub fn from_ron(text: &str) -> DrawResult<Self> {
        ron::from_str(text).map_err(|e| DrawError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron() {
        let config = InteractorConfig::from_ron("(eps: 3.0)").expect("valid config");
        assert_eq!(config.eps, 3.0);
        assert_eq!(config.zoom_in, 0.8, "missing fields keep defaults");
        assert!(InteractorConfig::from_ron("(eps: \"x\")").is_err());
    }
}
