//! Configuration management for the batch scoring service

use crate::models::UnseenCategoryPolicy;
use crate::pipeline::ScoringOptions;
use crate::rules::RuleOverlay;
use crate::types::scored::FraudCountSource;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Default upload limit: 16 MiB
pub const DEFAULT_MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub rules: RuleOverlay,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for CSV batches to score
    pub score_subject: String,
    /// Subject returning the latest scored batch
    pub predictions_subject: String,
    /// Subject returning the latest scored batch as CSV
    pub export_subject: String,
    /// Subject for liveness checks
    pub health_subject: String,
}

/// Pre-trained artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Path to the JSON bundle manifest
    pub bundle_path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Scoring policy configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoringConfig {
    #[serde(default)]
    pub unseen_category: UnseenCategoryPolicy,
    #[serde(default)]
    pub fraud_count_source: FraudCountSource,
    /// Run the rule overlay after the classifier
    #[serde(default = "default_rules_enabled")]
    pub rules_enabled: bool,
}

fn default_rules_enabled() -> bool {
    true
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            unseen_category: UnseenCategoryPolicy::default(),
            fraud_count_source: FraudCountSource::default(),
            rules_enabled: default_rules_enabled(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum concurrently scored requests
    pub workers: usize,
    /// Largest accepted payload in bytes
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_max_batch_bytes() -> usize {
    DEFAULT_MAX_BATCH_BYTES
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Pipeline options derived from `[scoring]` and `[rules]`
    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            unseen_category: self.scoring.unseen_category,
            fraud_count_source: self.scoring.fraud_count_source,
            rules: self.scoring.rules_enabled.then(|| self.rules.clone()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                score_subject: "scoring.batches".to_string(),
                predictions_subject: "scoring.predictions".to_string(),
                export_subject: "scoring.export".to_string(),
                health_subject: "scoring.health".to_string(),
            },
            artifacts: ArtifactsConfig {
                bundle_path: "model/bundle.json".to_string(),
                onnx_threads: 1,
            },
            scoring: ScoringConfig::default(),
            rules: RuleOverlay::default(),
            pipeline: PipelineConfig {
                workers: 4,
                max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.pipeline.max_batch_bytes, 16 * 1024 * 1024);
        assert_eq!(config.scoring.unseen_category, UnseenCategoryPolicy::FirstEntry);
        assert_eq!(config.scoring.fraud_count_source, FraudCountSource::Model);
        assert!(config.scoring.rules_enabled);
        assert_eq!(config.rules.amount_limit, 13500.0);
    }

    #[test]
    fn test_shipped_config_matches_default() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let shipped = AppConfig::load_from_path(path).unwrap();
        let default = AppConfig::default();

        assert_eq!(shipped.nats.score_subject, default.nats.score_subject);
        assert_eq!(shipped.artifacts.bundle_path, default.artifacts.bundle_path);
        assert_eq!(shipped.scoring, default.scoring);
        assert_eq!(shipped.rules, default.rules);
        assert_eq!(shipped.pipeline.max_batch_bytes, default.pipeline.max_batch_bytes);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
score_subject = "a"
predictions_subject = "b"
export_subject = "c"
health_subject = "d"

[artifacts]
bundle_path = "bundle.json"

[scoring]
unseen_category = "strict"
fraud_count_source = "rules"

[rules]
amount_limit = 5000.0

[pipeline]
workers = 2

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.artifacts.onnx_threads, 1);
        assert_eq!(config.scoring.unseen_category, UnseenCategoryPolicy::Strict);
        assert_eq!(config.pipeline.max_batch_bytes, DEFAULT_MAX_BATCH_BYTES);
        assert_eq!(config.rules.amount_limit, 5000.0);
        assert_eq!(config.rules.high_risk_countries, vec!["Morocco", "Pakistan"]);

        let options = config.scoring_options();
        assert_eq!(options.fraud_count_source, FraudCountSource::Rules);
        assert_eq!(options.rules.map(|r| r.amount_limit), Some(5000.0));
    }

    #[test]
    fn test_rules_disabled_yields_no_overlay() {
        let mut config = AppConfig::default();
        config.scoring.rules_enabled = false;
        assert!(config.scoring_options().rules.is_none());
    }
}
