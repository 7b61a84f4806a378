//! Generation options

use serde::{Deserialize, Serialize};

/// Options controlling obligation rendering and filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PogOptions {
    /// Column at which display lines are wrapped on logical connectives
    pub line_width: usize,
    /// Spaces per nesting level of context frames
    pub indent: usize,
    /// Omit obligations decided by inspection (e.g. a non-zero literal divisor)
    pub skip_trivial: bool,
}

impl Default for PogOptions {
    fn default() -> Self {
        Self {
            line_width: 100,
            indent: 2,
            skip_trivial: false,
        }
    }
}

impl PogOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts = PogOptions::from_json(r#"{"skip_trivial": true}"#).unwrap();
        assert!(opts.skip_trivial);
        assert_eq!(opts.line_width, 100);
        assert_eq!(opts.indent, 2);
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(PogOptions::from_json("{}").unwrap(), PogOptions::default());
    }
}
