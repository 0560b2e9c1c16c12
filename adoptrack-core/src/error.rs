//! Error types for the adoptrack analytical engine.
//!
//! Two layers exist on purpose. `AdoptrackError` is the hard, list-level
//! failure surface (all-or-nothing stages, configuration, I/O). `FailureKind`
//! is the serializable per-technology taxonomy carried *inside* reports so
//! that one technology's failure never aborts computation for its peers.

use serde::{Deserialize, Serialize};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdoptrackError>;

/// Top-level error type for the adoptrack core library.
#[derive(Debug, thiserror::Error)]
pub enum AdoptrackError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// List-level analysis failures. These are all-or-nothing: partial upstream
/// data never yields partial downstream conclusions.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("insufficient data for {subject}: {reason}")]
    InsufficientData { subject: String, reason: String },

    #[error("comparative analysis requires at least 2 lists, found {found}")]
    InsufficientLists { found: usize },

    #[error("unknown watch list: {name}")]
    UnknownList { name: String },
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Per-technology (or per-source) soft failure taxonomy.
///
/// Serialized in snake_case so report consumers see the stable identifiers
/// `insufficient_data`, `insufficient_time_delta`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required inputs missing (fewer than two snapshots, absent artifact).
    InsufficientData,
    /// Snapshots too close in time to derive a rate.
    InsufficientTimeDelta,
    /// Technology absent from one of two compared snapshot sets.
    TechnologyNotFound,
    /// The upstream source recorded an error for this technology.
    DataCollectionError,
    /// Unreadable or corrupt snapshot file.
    FileLoadError,
    /// Fewer than two configured lists for comparison.
    InsufficientLists,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::InsufficientData => "insufficient_data",
            FailureKind::InsufficientTimeDelta => "insufficient_time_delta",
            FailureKind::TechnologyNotFound => "technology_not_found",
            FailureKind::DataCollectionError => "data_collection_error",
            FailureKind::FileLoadError => "file_load_error",
            FailureKind::InsufficientLists => "insufficient_lists",
        };
        f.write_str(s)
    }
}

/// A computation that either produced a value or recorded a localized
/// failure. Serializes untagged: a failed computation is `{"error": kind}`,
/// a ready one is the value itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Computed<T> {
    Failed(FailedComputation),
    Ready(T),
}

/// The serialized form of a localized failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedComputation {
    pub error: FailureKind,
}

impl<T> Computed<T> {
    pub fn failed(kind: FailureKind) -> Self {
        Computed::Failed(FailedComputation { error: kind })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Computed::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Computed::Ready(value) => Some(value),
            Computed::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Computed::Failed(f) => Some(f.error),
            Computed::Ready(_) => None,
        }
    }
}

impl<T> From<std::result::Result<T, FailureKind>> for Computed<T> {
    fn from(result: std::result::Result<T, FailureKind>) -> Self {
        match result {
            Ok(value) => Computed::Ready(value),
            Err(kind) => Computed::failed(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::InsufficientTimeDelta).unwrap();
        assert_eq!(json, "\"insufficient_time_delta\"");
        let kind: FailureKind = serde_json::from_str("\"technology_not_found\"").unwrap();
        assert_eq!(kind, FailureKind::TechnologyNotFound);
    }

    #[test]
    fn test_computed_failed_serializes_as_error_object() {
        let failed: Computed<u32> = Computed::failed(FailureKind::InsufficientData);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json, serde_json::json!({"error": "insufficient_data"}));
    }

    #[test]
    fn test_computed_ready_roundtrip() {
        let ready: Computed<u32> = Computed::Ready(7);
        let json = serde_json::to_string(&ready).unwrap();
        let back: Computed<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_ready(), Some(&7));
        assert!(back.failure().is_none());
    }
}
