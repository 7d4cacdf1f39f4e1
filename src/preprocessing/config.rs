//! Feature extraction configuration

use super::schema::FeatureLayout;
use serde::{Deserialize, Serialize};

/// Configuration for building feature matrices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Raw record layout consumed by the builder
    pub layout: FeatureLayout,

    /// Rescale every feature column after encoding (the target never is)
    pub normalize: bool,

    /// Substitute for unparsable values in NumberFill columns
    pub number_fill: f64,

    /// Initial carried value for CarryForwardFill columns
    pub carry_forward_fill: f64,

    /// Emit a chronological date rank column after `day`
    pub include_date_rank: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            layout: FeatureLayout::Entity,
            normalize: false,
            number_fill: 0.0,
            carry_forward_fill: 0.0,
            include_date_rank: false,
        }
    }
}

impl FeatureConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: FeatureLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_number_fill(mut self, fill: f64) -> Self {
        self.number_fill = fill;
        self
    }

    pub fn with_carry_forward_fill(mut self, fill: f64) -> Self {
        self.carry_forward_fill = fill;
        self
    }

    pub fn with_date_rank(mut self, include: bool) -> Self {
        self.include_date_rank = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeatureConfig::default();
        assert_eq!(config.layout, FeatureLayout::Entity);
        assert!(!config.normalize);
        assert!(!config.include_date_rank);
    }

    #[test]
    fn test_builder_pattern() {
        let config = FeatureConfig::new()
            .with_layout(FeatureLayout::Store)
            .with_normalize(true)
            .with_number_fill(-1.0);

        assert_eq!(config.layout, FeatureLayout::Store);
        assert!(config.normalize);
        assert_eq!(config.number_fill, -1.0);
    }

    #[test]
    fn test_partial_json() {
        let config: FeatureConfig = serde_json::from_str(r#"{"normalize": true}"#).unwrap();
        assert!(config.normalize);
        assert_eq!(config.layout, FeatureLayout::Entity);
    }
}
