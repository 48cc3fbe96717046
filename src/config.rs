use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::ExtracurricularGrade;

pub const MAX_THRESHOLD: u32 = 200;

/// Everything one pipeline run needs besides the roster itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threshold: u32,
    pub absence_override_limit: u32,
    pub bonus: BonusTable,
    /// Canonical subject codes, in display order.
    pub subjects: Vec<String>,
    pub evaluation: EvaluationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: 75,
            absence_override_limit: 5,
            bonus: BonusTable::default(),
            subjects: ["MTK", "BINDO", "BINGGRIS", "IPA", "IPS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusTable {
    pub none: f64,
    pub good: f64,
    pub very_good: f64,
}

impl Default for BonusTable {
    fn default() -> Self {
        Self {
            none: 0.0,
            good: 65.0,
            very_good: 70.0,
        }
    }
}

impl BonusTable {
    pub fn bonus_for(&self, grade: ExtracurricularGrade) -> f64 {
        match grade {
            ExtracurricularGrade::None => self.none,
            ExtracurricularGrade::Good => self.good,
            ExtracurricularGrade::VeryGood => self.very_good,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub trees: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
            trees: 100,
        }
    }
}

impl EngineConfig {
    /// Loads a TOML file when given, otherwise the defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold > MAX_THRESHOLD {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        let fraction = self.evaluation.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::TestFraction(fraction));
        }
        if self.evaluation.trees == 0 {
            return Err(ConfigError::NoTrees);
        }
        if self.subjects.is_empty() {
            return Err(ConfigError::NoSubjects);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.threshold, 75);
        assert_eq!(config.absence_override_limit, 5);
        assert_eq!(config.bonus.bonus_for(ExtracurricularGrade::Good), 65.0);
        assert_eq!(config.bonus.bonus_for(ExtracurricularGrade::VeryGood), 70.0);
        assert_eq!(config.bonus.bonus_for(ExtracurricularGrade::None), 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            "absence_override_limit = 7\n[bonus]\ngood = 60.0\n",
        )
        .unwrap();
        assert_eq!(config.absence_override_limit, 7);
        assert_eq!(config.bonus.good, 60.0);
        assert_eq!(config.bonus.very_good, 70.0);
        assert_eq!(config.threshold, 75);
        assert_eq!(config.subjects.len(), 5);
    }

    #[test]
    fn rejects_threshold_above_range() {
        let config = EngineConfig {
            threshold: 201,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange(201))
        ));
    }

    #[test]
    fn rejects_degenerate_evaluation_settings() {
        let mut config = EngineConfig::default();
        config.evaluation.test_fraction = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::TestFraction(_))));

        let mut config = EngineConfig::default();
        config.evaluation.trees = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoTrees)));
    }
}
