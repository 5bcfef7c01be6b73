// src/config/mod.rs
//! Reconciliation configuration system
//! Handles TOML parsing and validation

use crate::record::{canonical_component_id, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Overrides the `computes` count read from a derived summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computes: Option<u64>,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub cooling: CoolingConfig,
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

/// Relative-delta bands used to classify a comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    pub consistent: f64,
    pub drift: f64,
    pub epsilon: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            consistent: 0.01,
            drift: 0.25,
            epsilon: 1e-30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Decade offsets treated as a unit-prefix slip (applied in both directions)
    pub prefix_steps: Vec<i32>,
    /// Relative delta under which a shifted value counts as the same reading
    pub match_tolerance: f64,
    pub plausible_min_pj: f64,
    pub plausible_max_pj: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            prefix_steps: vec![3, 6, 9, 12, 15],
            match_tolerance: 0.01,
            plausible_min_pj: 1e-9,
            plausible_max_pj: 1e18,
        }
    }
}

/// Cryocooler overhead the summary pipeline folds into cold components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolingConfig {
    pub enabled: bool,
    /// Wall-power multiplier for components on the ~70 K stage
    pub first_stage_factor: f64,
    /// Wall-power multiplier for components on the 4 K stage
    pub second_stage_factor: f64,
    /// Heat the first stage absorbs for free when a 4 K stage is running
    pub first_stage_free_watts: f64,
    /// Operating temperature in kelvin per component (unlisted = 300 K)
    #[serde(default)]
    pub temperatures: BTreeMap<String, f64>,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            first_stage_factor: 93.75,
            second_stage_factor: 1000.0,
            first_stage_free_watts: 80.0,
            temperatures: BTreeMap::new(),
        }
    }
}

/// One input report and the run settings that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub source: Source,
    pub path: PathBuf,
    /// Components excluded from DRAM coalescing when this report was produced
    #[serde(default)]
    pub no_coalesce: Vec<String>,
}

impl ArtifactConfig {
    pub fn new(source: Source, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
            no_coalesce: Vec::new(),
        }
    }

    pub fn with_no_coalesce<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_coalesce.extend(components.into_iter().map(Into::into));
        self
    }
}

impl ReconcileConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ReconcileConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default configuration with a sample artifact set, used by `config-gen`
    pub fn default_config() -> Self {
        let mut config = Self::default();
        config.cooling.temperatures.insert("cryocable".to_string(), 4.0);
        config.cooling.temperatures.insert("cold2hot".to_string(), 4.0);
        config.artifacts = vec![
            ArtifactConfig::new(Source::RawStats, "reports/timeloop-model.stats.txt")
                .with_no_coalesce(["main_memory"]),
            ArtifactConfig::new(Source::ErtSummary, "reports/ERT_summary.txt")
                .with_no_coalesce(["main_memory"]),
            ArtifactConfig::new(Source::DerivedSummary, "reports/summary.json")
                .with_no_coalesce(["main_memory"]),
        ];
        config
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tol = &self.tolerance;
        if !(tol.consistent >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "Consistent tolerance must be >= 0, got {}",
                tol.consistent
            )));
        }
        if !(tol.drift >= tol.consistent) {
            return Err(ConfigError::Validation(format!(
                "Drift tolerance ({}) must be >= consistent tolerance ({})",
                tol.drift, tol.consistent
            )));
        }
        if !(tol.epsilon > 0.0) {
            return Err(ConfigError::Validation("Epsilon must be > 0".to_string()));
        }

        let scale = &self.scale;
        if !(scale.match_tolerance >= 0.0 && scale.match_tolerance < 1.0) {
            return Err(ConfigError::Validation(format!(
                "Scale match tolerance must be in [0, 1), got {}",
                scale.match_tolerance
            )));
        }
        if scale.prefix_steps.iter().any(|&step| step == 0) {
            return Err(ConfigError::Validation("Prefix steps must be non-zero".to_string()));
        }
        if !(scale.plausible_min_pj < scale.plausible_max_pj) {
            return Err(ConfigError::Validation(
                "Plausible magnitude band is empty".to_string(),
            ));
        }

        let cooling = &self.cooling;
        if cooling.first_stage_factor < 1.0 || cooling.second_stage_factor < 1.0 {
            return Err(ConfigError::Validation(
                "Cooling factors must be >= 1".to_string(),
            ));
        }
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for (name, &kelvin) in &cooling.temperatures {
            if !(kelvin >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "Negative temperature for component {}: {}",
                    name, kelvin
                )));
            }
            if let Some(other) = seen.insert(canonical_component_id(name), name) {
                return Err(ConfigError::Validation(format!(
                    "Temperatures {} and {} name the same component",
                    other, name
                )));
            }
        }

        if self.computes == Some(0) {
            return Err(ConfigError::Validation("Computes must be > 0".to_string()));
        }

        for artifact in &self.artifacts {
            if artifact.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Empty path for {} artifact",
                    artifact.source
                )));
            }
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_str = self.to_toml_string()?;
        std::fs::write(path.as_ref(), toml_str)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = ReconcileConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.tolerance.consistent, 0.01);
        assert_eq!(config.tolerance.drift, 0.25);
        assert_eq!(config.artifacts.len(), 3);
    }

    #[test]
    fn test_config_validation_errors() {
        let mut config = ReconcileConfig::default();

        config.tolerance.drift = 0.001;
        assert!(config.validate().is_err());

        config.tolerance.drift = 0.25;
        config.computes = Some(0);
        assert!(config.validate().is_err());

        config.computes = None;
        config.scale.prefix_steps.push(0);
        assert!(config.validate().is_err());

        config.scale.prefix_steps.pop();
        config.cooling.temperatures.insert("cryocable".to_string(), -4.0);
        assert!(config.validate().is_err());

        config.cooling.temperatures.insert("cryocable".to_string(), 4.0);
        assert!(config.validate().is_ok());
        config
            .cooling
            .temperatures
            .insert("system_top_level.cryocable".to_string(), 70.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ReconcileConfig::from_toml_str(
            r#"
            computes = 4096

            [tolerance]
            consistent = 0.02
            drift = 0.3
            epsilon = 1e-30

            [[artifacts]]
            source = "raw_stats"
            path = "stats.txt"
            no_coalesce = ["main_memory"]
            "#,
        )
        .unwrap();

        assert_eq!(config.computes, Some(4096));
        assert_eq!(config.tolerance.consistent, 0.02);
        assert_eq!(config.scale, ScaleConfig::default());
        assert!(!config.cooling.enabled);
        assert_eq!(config.artifacts[0].source, Source::RawStats);
        assert_eq!(config.artifacts[0].no_coalesce, vec!["main_memory".to_string()]);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ReconcileConfig::default_config();
        let toml_str = config.to_toml_string().unwrap();

        // Should be able to parse it back
        let parsed = ReconcileConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.artifacts, config.artifacts);
        assert_eq!(parsed.cooling.temperatures.get("cryocable"), Some(&4.0));
    }
}
