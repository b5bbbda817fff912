//! Engine options
//!
//! Every group deserializes with defaults for missing keys, so a host can
//! send `{}` or only the handful of fields it cares about.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::highlights::resolve::MatchScoring;
use crate::highlights::types::Confidence;

/// Default number of context chars captured on each side of a quote
pub const DEFAULT_CONTEXT_LENGTH: usize = 32;

/// Default selection debounce window
pub const DEFAULT_DEBOUNCE_MS: f64 = 300.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    pub index: TextIndexOptions,
    pub resolve: ResolveOptions,
    pub render: RenderOptions,
    pub selection: SelectionOptions,
}

impl EngineOptions {
    /// Parse options from JSON and validate ranges
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: EngineOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.render.base_opacity) {
            return Err(ConfigError::Invalid {
                field: "render.baseOpacity",
                reason: format!("{} is outside 0..=1", self.render.base_opacity),
            });
        }
        if self.render.class_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "render.classPrefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.selection.debounce_ms < 0.0 {
            return Err(ConfigError::Invalid {
                field: "selection.debounceMs",
                reason: "must not be negative".to_string(),
            });
        }
        let window = self.resolve.scoring.position_window;
        if !(0.0..=1.0).contains(&window) {
            return Err(ConfigError::Invalid {
                field: "resolve.scoring.positionWindow",
                reason: format!("{} is outside 0..=1", window),
            });
        }
        Ok(())
    }
}

/// Options for building a [`TextIndex`](crate::highlights::types::TextIndex)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextIndexOptions {
    /// Collapse every whitespace run to a single space
    pub normalize_whitespace: bool,
    /// Skip script/style/... and `data-highlight-exclude` subtrees
    pub exclude_elements: bool,
    /// Index text inside rendered highlight markers
    ///
    /// Off for resolution (a clean DOM is expected); on when mapping a
    /// selection made on the rendered DOM.
    pub include_highlight_markers: bool,
}

impl Default for TextIndexOptions {
    fn default() -> Self {
        Self {
            normalize_whitespace: false,
            exclude_elements: true,
            include_highlight_markers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Try the stored XPath/CSS hint before quote matching
    pub use_dom_hint: bool,
    /// Quote matches below this confidence are reported orphaned
    pub min_confidence: Confidence,
    pub scoring: MatchScoring,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_dom_hint: true,
            min_confidence: Confidence::Low,
            scoring: MatchScoring::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Prefix for marker classes (`{prefix}-segment`)
    pub class_prefix: String,
    /// Paint overlaps as a gradient instead of an averaged color
    pub use_gradient: bool,
    /// Opacity for records that do not carry one
    pub base_opacity: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            class_prefix: "hl".to_string(),
            use_gradient: false,
            base_opacity: crate::highlights::types::DEFAULT_OPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionOptions {
    pub debounce_ms: f64,
    pub context_length: usize,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let options = EngineOptions::from_json("{}").unwrap();
        assert_eq!(options, EngineOptions::default());
        assert!(options.index.exclude_elements);
        assert_eq!(options.render.class_prefix, "hl");
        assert_eq!(options.selection.context_length, 32);
    }

    #[test]
    fn test_partial_json_overrides_fields() {
        let options = EngineOptions::from_json(
            r#"{"render": {"useGradient": true}, "resolve": {"minConfidence": "medium", "scoring": {"contextBonus": 1.0}}}"#,
        )
        .unwrap();
        assert!(options.render.use_gradient);
        assert_eq!(options.render.base_opacity, 0.3);
        assert_eq!(options.resolve.min_confidence, Confidence::Medium);
        assert_eq!(options.resolve.scoring.context_bonus, 1.0);
        assert_eq!(options.resolve.scoring.high_threshold, 2.0);
    }

    #[test]
    fn test_invalid_opacity_is_rejected() {
        let err = EngineOptions::from_json(r#"{"render": {"baseOpacity": 3}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "render.baseOpacity", .. }));
    }

    #[test]
    fn test_bad_json_is_rejected() {
        assert!(matches!(EngineOptions::from_json("{"), Err(ConfigError::Json(_))));
    }
}
