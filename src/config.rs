use serde::{Deserialize, Serialize};
use tracing::error;

use crate::orderbook::error::{EngineError, EngineResult};

/// Settings for one execution engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exchange served by the engine; packets from other venues are dropped
    pub name: String,
    /// Price levels tracked per side
    pub book_depth: usize,
    /// Currency value of one price tick
    pub tick_size: f64,
    pub report_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "SIM".to_string(),
            book_depth: 10,
            tick_size: 0.01,
            report_interval_secs: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| {
            error!("Failed to parse engine config: {}", e);
            EngineError::InvalidConfig(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.book_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "book_depth must be positive".to_string(),
            ));
        }
        if !(self.tick_size > 0.0) {
            return Err(EngineError::InvalidConfig(
                "tick_size must be positive".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(EngineError::InvalidConfig("name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.name, "SIM");
        assert_eq!(config.book_depth, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = EngineConfig::from_json(r#"{"name": "CME", "book_depth": 5}"#).unwrap();

        assert_eq!(config.name, "CME");
        assert_eq!(config.book_depth, 5);
        assert_eq!(config.tick_size, 0.01);
        assert_eq!(config.report_interval_secs, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"book_depth": 0}"#),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"tick_size": -1.0}"#),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
