//! Configuration for the adoptrack analysis pipeline.
//!
//! Uses `figment` for layered configuration: built-in defaults -> TOML file
//! -> `ADOPTRACK_`-prefixed environment variables. Watch lists, heuristic
//! thresholds, and the leading-indicator category tables are all plain config
//! so they can be tuned without code changes.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SourceKind;

/// One watched technology: identity, category tag, and per-source lookup
/// identifiers. A source applies to the technology when its identifier is
/// present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologySpec {
    pub name: String,
    pub display_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi: Option<String>,
}

impl TechnologySpec {
    pub fn source_id(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Github => self.github.as_deref(),
            SourceKind::Npm => self.npm.as_deref(),
            SourceKind::Pypi => self.pypi.as_deref(),
        }
    }

    pub fn applies_to(&self, kind: SourceKind) -> bool {
        self.source_id(kind).is_some()
    }
}

/// A strategic technology watch list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchList {
    /// Short key used for directory names and artifact prefixes.
    pub key: String,
    pub name: String,
    pub description: String,
    pub focus: String,
    pub technologies: Vec<TechnologySpec>,
}

/// Heuristic thresholds for confidence scoring, hype detection, velocity,
/// and comparative analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum source count for the HIGH confidence tier.
    pub high_confidence_sources: usize,
    /// Star count above which low downloads look like hype.
    pub hype_star_floor: u64,
    /// npm monthly downloads below this (with high stars) flag hype.
    pub hype_npm_monthly_floor: u64,
    /// PyPI monthly downloads below this (with high stars) flag hype.
    pub hype_pypi_monthly_floor: u64,
    /// Max/min cross-registry download ratio above which hype is flagged.
    pub hype_divergence_ratio: f64,
    /// |monthly growth rate| above this is an anomaly (5.0 = +/-500%).
    pub velocity_spike: f64,
    /// Absolute value above which a from-zero emergence is anomalous.
    pub emergence_spike_floor: f64,
    /// Days of history eligible for velocity computation.
    pub lookback_days: i64,
    /// Number of adoption leaders to surface.
    pub top_n_leaders: usize,
    /// Momentum-mean gap below which two lists are declared tied.
    pub velocity_tie_margin: f64,
    /// Category momentum gap required to emit a leading-indicator hypothesis.
    pub indicator_gap: f64,
    /// Maturity gap below which adoption lag is "minimal".
    pub lag_similarity_margin: f64,
    /// Maturity gap above which adoption lag is "significant".
    pub lag_significant_gap: f64,
    /// Categories treated as infrastructure for leading-indicator detection.
    pub infrastructure_categories: Vec<String>,
    /// Categories treated as applications for leading-indicator detection.
    pub application_categories: Vec<String>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_confidence_sources: 2,
            hype_star_floor: 10_000,
            hype_npm_monthly_floor: 1_000,
            hype_pypi_monthly_floor: 10_000,
            hype_divergence_ratio: 10.0,
            velocity_spike: 5.0,
            emergence_spike_floor: 10_000.0,
            lookback_days: 30,
            top_n_leaders: 5,
            velocity_tie_margin: 5.0,
            indicator_gap: 20.0,
            lag_similarity_margin: 10.0,
            lag_significant_gap: 30.0,
            infrastructure_categories: vec![
                "vector_db".to_string(),
                "ai_infrastructure".to_string(),
                "ml_platform".to_string(),
            ],
            application_categories: vec![
                "ai_platform".to_string(),
                "fintech_infrastructure".to_string(),
                "trading_platform".to_string(),
            ],
        }
    }
}

/// Top-level configuration: where the snapshot store lives, the tuning
/// thresholds, and the ordered watch lists (comparison runs on the first
/// two).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub thresholds: Thresholds,
    pub lists: Vec<WatchList>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            thresholds: Thresholds::default(),
            lists: vec![default_enterprise_list(), default_fintech_list()],
        }
    }
}

impl AnalysisConfig {
    /// Load configuration with figment layering: defaults, then an optional
    /// TOML file, then `ADOPTRACK_` environment variables (nested keys split
    /// on `__`).
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AnalysisConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("ADOPTRACK_").split("__"));
        let config: AnalysisConfig = figment.extract().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lists.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "at least one watch list must be configured".to_string(),
            });
        }
        for list in &self.lists {
            if list.key.is_empty() {
                return Err(ConfigError::Invalid {
                    reason: format!("watch list '{}' has an empty key", list.name),
                });
            }
        }
        Ok(())
    }

    pub fn list(&self, key: &str) -> Option<&WatchList> {
        self.lists.iter().find(|l| l.key == key)
    }

    /// Raw snapshot directory for one list.
    pub fn raw_dir(&self, list_key: &str) -> PathBuf {
        self.data_dir.join("raw").join(list_key)
    }

    /// Derived artifact directory, shared by all lists.
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

fn tech(
    name: &str,
    display_name: &str,
    category: &str,
    github: Option<&str>,
    npm: Option<&str>,
    pypi: Option<&str>,
) -> TechnologySpec {
    TechnologySpec {
        name: name.to_string(),
        display_name: display_name.to_string(),
        category: category.to_string(),
        github: github.map(str::to_string),
        npm: npm.map(str::to_string),
        pypi: pypi.map(str::to_string),
    }
}

/// Built-in watch list: AI platforms, infrastructure, and enterprise ML
/// tools.
pub fn default_enterprise_list() -> WatchList {
    WatchList {
        key: "enterprise".to_string(),
        name: "Enterprise AI Platforms".to_string(),
        description: "AI platforms, infrastructure, and enterprise ML tools".to_string(),
        focus: "What enterprises choose for AI implementation".to_string(),
        technologies: vec![
            tech(
                "openai",
                "OpenAI API",
                "ai_platform",
                Some("openai/openai-python"),
                Some("openai"),
                Some("openai"),
            ),
            tech(
                "anthropic-claude",
                "Anthropic Claude",
                "ai_platform",
                Some("anthropics/anthropic-sdk-python"),
                None,
                Some("anthropic"),
            ),
            tech(
                "google-gemini",
                "Google Gemini",
                "ai_platform",
                Some("google/generative-ai-python"),
                None,
                Some("google-generativeai"),
            ),
            tech(
                "aws-bedrock",
                "AWS Bedrock",
                "ai_platform",
                Some("awslabs/amazon-bedrock-samples"),
                None,
                Some("boto3"),
            ),
            tech(
                "azure-openai",
                "Azure OpenAI",
                "ai_platform",
                Some("Azure/azure-sdk-for-python"),
                None,
                Some("azure-ai-openai"),
            ),
            tech(
                "cohere",
                "Cohere",
                "ai_platform",
                Some("cohere-ai/cohere-python"),
                Some("cohere-ai"),
                Some("cohere"),
            ),
            tech(
                "langchain",
                "LangChain",
                "ai_infrastructure",
                Some("langchain-ai/langchain"),
                Some("langchain"),
                Some("langchain"),
            ),
            tech(
                "llamaindex",
                "LlamaIndex",
                "ai_infrastructure",
                Some("run-llama/llama_index"),
                None,
                Some("llama-index"),
            ),
            tech(
                "pinecone",
                "Pinecone",
                "vector_db",
                Some("pinecone-io/pinecone-python-client"),
                None,
                Some("pinecone-client"),
            ),
            tech(
                "weaviate",
                "Weaviate",
                "vector_db",
                Some("weaviate/weaviate"),
                None,
                Some("weaviate-client"),
            ),
            tech(
                "chromadb",
                "ChromaDB",
                "vector_db",
                Some("chroma-core/chroma"),
                None,
                Some("chromadb"),
            ),
            tech(
                "qdrant",
                "Qdrant",
                "vector_db",
                Some("qdrant/qdrant"),
                None,
                Some("qdrant-client"),
            ),
            tech(
                "databricks-ai",
                "Databricks AI",
                "ml_platform",
                Some("databricks/databricks-sdk-py"),
                None,
                Some("databricks-sdk"),
            ),
            tech(
                "huggingface",
                "Hugging Face",
                "ml_platform",
                Some("huggingface/transformers"),
                None,
                Some("transformers"),
            ),
            tech(
                "mlflow",
                "MLflow",
                "ml_platform",
                Some("mlflow/mlflow"),
                None,
                Some("mlflow"),
            ),
        ],
    }
}

/// Built-in watch list: AI in financial services, trading tools, and
/// risk/compliance.
pub fn default_fintech_list() -> WatchList {
    WatchList {
        key: "fintech".to_string(),
        name: "Fintech & Trading AI".to_string(),
        description: "AI in financial services, trading tools, and risk/compliance".to_string(),
        focus: "AI adoption in financial services and trading".to_string(),
        technologies: vec![
            tech(
                "plaid",
                "Plaid",
                "fintech_infrastructure",
                Some("plaid/plaid-python"),
                None,
                Some("plaid-python"),
            ),
            tech(
                "stripe",
                "Stripe",
                "fintech_infrastructure",
                Some("stripe/stripe-python"),
                Some("stripe"),
                Some("stripe"),
            ),
            tech(
                "alpaca",
                "Alpaca Trading",
                "trading_platform",
                Some("alpacahq/alpaca-trade-api-python"),
                None,
                Some("alpaca-trade-api"),
            ),
            tech(
                "quantlib",
                "QuantLib",
                "quant_tools",
                Some("lballabio/QuantLib"),
                None,
                Some("QuantLib"),
            ),
            tech(
                "zipline",
                "Zipline",
                "trading_backtesting",
                Some("quantopian/zipline"),
                None,
                Some("zipline-reloaded"),
            ),
            tech(
                "backtrader",
                "Backtrader",
                "trading_backtesting",
                Some("mementum/backtrader"),
                None,
                Some("backtrader"),
            ),
            tech(
                "vectorbt",
                "VectorBT",
                "trading_backtesting",
                Some("polakowo/vectorbt"),
                None,
                Some("vectorbt"),
            ),
            tech(
                "yfinance",
                "yfinance",
                "financial_data",
                Some("ranaroussi/yfinance"),
                None,
                Some("yfinance"),
            ),
            tech(
                "prophet",
                "Prophet (Meta)",
                "financial_ai",
                Some("facebook/prophet"),
                None,
                Some("prophet"),
            ),
            tech(
                "numerai",
                "Numerai",
                "trading_ai",
                Some("numerai/numerapi"),
                None,
                Some("numerapi"),
            ),
            tech(
                "great-expectations",
                "Great Expectations",
                "risk_compliance",
                Some("great-expectations/great_expectations"),
                None,
                Some("great_expectations"),
            ),
            tech(
                "evidently",
                "Evidently AI",
                "risk_compliance",
                Some("evidentlyai/evidently"),
                None,
                Some("evidently"),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_two_lists() {
        let config = AnalysisConfig::default();
        assert_eq!(config.lists.len(), 2);
        assert_eq!(config.lists[0].key, "enterprise");
        assert_eq!(config.lists[1].key, "fintech");
    }

    #[test]
    fn test_default_thresholds_match_documented_values() {
        let t = Thresholds::default();
        assert_eq!(t.high_confidence_sources, 2);
        assert_eq!(t.hype_star_floor, 10_000);
        assert_eq!(t.velocity_spike, 5.0);
        assert_eq!(t.lookback_days, 30);
        assert_eq!(t.top_n_leaders, 5);
        assert_eq!(t.velocity_tie_margin, 5.0);
        assert_eq!(t.indicator_gap, 20.0);
    }

    #[test]
    fn test_source_applicability_follows_identifiers() {
        let list = default_enterprise_list();
        let anthropic = list
            .technologies
            .iter()
            .find(|t| t.name == "anthropic-claude")
            .unwrap();
        assert!(anthropic.applies_to(SourceKind::Github));
        assert!(anthropic.applies_to(SourceKind::Pypi));
        assert!(!anthropic.applies_to(SourceKind::Npm));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AnalysisConfig::load(None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.thresholds.top_n_leaders, 5);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("adoptrack.toml");
        std::fs::write(
            &path,
            "data_dir = \"/tmp/telemetry\"\n\n[thresholds]\ntop_n_leaders = 3\n",
        )
        .unwrap();

        let config = AnalysisConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/telemetry"));
        assert_eq!(config.thresholds.top_n_leaders, 3);
        // Untouched keys keep their defaults.
        assert_eq!(config.thresholds.lookback_days, 30);
    }

    #[test]
    fn test_raw_and_processed_dirs() {
        let config = AnalysisConfig::default();
        assert_eq!(config.raw_dir("enterprise"), PathBuf::from("data/raw/enterprise"));
        assert_eq!(config.processed_dir(), PathBuf::from("data/processed"));
    }
}
