//! # Adoptrack Core
//!
//! Core library for the technology adoption reality checker.
//! Cross-validates adoption claims against multi-source collector snapshots:
//! merges per-source observations with confidence scoring and hype detection,
//! computes adoption velocity between snapshot pairs, synthesizes per-list
//! strategic insights, and compares adoption patterns across lists.

pub mod comparative;
pub mod config;
pub mod error;
pub mod insights;
pub mod pipeline;
pub mod quality;
pub mod store;
pub mod types;
pub mod velocity;

// Re-export commonly used types at the crate root.
pub use comparative::{ComparativeAnalyzer, ComparativeReport, COMPARATIVE_PREFIX};
pub use config::{AnalysisConfig, TechnologySpec, Thresholds, WatchList};
pub use error::{
    AdoptrackError, AnalysisError, Computed, ConfigError, FailureKind, Result,
};
pub use insights::{InsightGenerator, InsightsReport, QUALITY_PREFIX};
pub use pipeline::{Pipeline, PipelineSummary, StageOutcome};
pub use quality::{QualityChecker, QualityReport};
pub use store::ArtifactStore;
pub use types::{
    ConfidenceAssessment, ConfidenceTier, Growth, HypeFlag, Regime, SourceKind, VelocityMetric,
};
pub use velocity::{TechnologyVelocity, VelocityEngine, VelocityReport};
