//! Aggregated run configuration, loadable from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::{AcesParams, ClearParams};
use crate::error::{Error, Result};
use crate::evaluator::EvaluatorOptions;

/// Every section is optional in the document and falls back to its defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parameters of the clear simulator.
    pub clear: ClearParams,
    /// Parameters of the ACES backend.
    pub aces: AcesParams,
    /// Tree evaluation knobs.
    pub evaluator: EvaluatorOptions,
}

impl Config {
    /// Parse a configuration document; malformed input is a configuration error.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Configuration(format!("invalid config: {e}")))
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.clear.slots, 64);
        assert_eq!(config.clear.depth_budget, 40);
        assert_eq!(config.aces.q, (1 << 60) + 1);
        assert!(!config.evaluator.parallel);
    }

    #[test]
    fn test_partial_document() {
        let config =
            Config::from_json(r#"{"clear": {"depth_budget": 19}, "evaluator": {"parallel": true}}"#)
                .unwrap();
        assert_eq!(config.clear.depth_budget, 19);
        assert_eq!(config.clear.slots, 64);
        assert_eq!(config.aces, AcesParams::default());
        assert!(config.evaluator.parallel);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            Config::from_json(r#"{"clear": {"slots": "many"}}"#),
            Err(Error::Configuration(_))
        ));
    }
}
