//! End-to-end analysis pipeline.
//!
//! Runs the four stages in dependency order: quality validation, per-list
//! velocity, per-list insights, then the cross-list comparison. A failed
//! stage is logged and recorded in the summary but never aborts the run;
//! later stages that depend on the missing artifact fail on their own terms.
//! No artifact is written for a stage that failed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::comparative::{ComparativeAnalyzer, COMPARATIVE_PREFIX};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::insights::{insights_prefix, velocity_prefix, InsightGenerator, QUALITY_PREFIX};
use crate::quality::QualityChecker;
use crate::store::ArtifactStore;
use crate::velocity::VelocityEngine;

/// Result of one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageOutcome>,
}

impl PipelineSummary {
    pub fn succeeded(&self) -> usize {
        self.stages.iter().filter(|s| s.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.stages.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.stages.iter().all(|s| s.succeeded)
    }
}

/// Orchestrates the analysis stages over one configuration.
pub struct Pipeline<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.config.processed_dir())
    }

    /// Validate all lists and persist the combined quality report.
    pub fn run_quality(&self) -> Result<PathBuf> {
        let reports = QualityChecker::new(self.config).validate_all();
        let path = self.store().write(QUALITY_PREFIX, &reports)?;
        Ok(path)
    }

    /// Compute and persist the velocity report for one list.
    pub fn run_velocity(&self, list_key: &str) -> Result<PathBuf> {
        let list = self
            .config
            .list(list_key)
            .ok_or_else(|| AnalysisError::UnknownList {
                name: list_key.to_string(),
            })?;
        let report = VelocityEngine::new(self.config).analyze_list(list);
        let path = self.store().write(&velocity_prefix(list_key), &report)?;
        Ok(path)
    }

    /// Generate and persist the insights report for one list. Nothing is
    /// written when an upstream artifact is missing.
    pub fn run_insights(&self, list_key: &str) -> Result<PathBuf> {
        let report = InsightGenerator::new(self.config).generate(list_key)?;
        let path = self.store().write(&insights_prefix(list_key), &report)?;
        Ok(path)
    }

    /// Compare the first two lists and persist the report. Nothing is
    /// written when the comparison itself fails.
    pub fn run_comparative(&self) -> Result<PathBuf> {
        let report = ComparativeAnalyzer::new(self.config).generate()?;
        let path = self.store().write(COMPARATIVE_PREFIX, &report)?;
        Ok(path)
    }

    /// Run every stage in order, recording each outcome.
    pub fn run(&self) -> PipelineSummary {
        let started_at = Utc::now();
        let mut stages = Vec::new();

        stages.push(outcome("quality", self.run_quality()));

        for list in &self.config.lists {
            stages.push(outcome(
                &format!("velocity:{}", list.key),
                self.run_velocity(&list.key),
            ));
        }

        for list in &self.config.lists {
            stages.push(outcome(
                &format!("insights:{}", list.key),
                self.run_insights(&list.key),
            ));
        }

        stages.push(outcome("comparative", self.run_comparative()));

        let summary = PipelineSummary {
            started_at,
            finished_at: Utc::now(),
            stages,
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "pipeline run complete"
        );
        summary
    }
}

fn outcome(stage: &str, result: Result<PathBuf>) -> StageOutcome {
    match result {
        Ok(path) => {
            info!(stage = %stage, artifact = %path.display(), "stage complete");
            StageOutcome {
                stage: stage.to_string(),
                succeeded: true,
                artifact: Some(path),
                error: None,
            }
        }
        Err(err) => {
            error!(stage = %stage, error = %err, "stage failed");
            StageOutcome {
                stage: stage.to_string(),
                succeeded: false,
                artifact: None,
                error: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_empty_data_dir_still_produces_quality_artifact() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pipeline = Pipeline::new(&config);

        let path = pipeline.run_quality().unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("quality_validation_"));
    }

    #[test]
    fn test_unknown_list_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pipeline = Pipeline::new(&config);

        let err = pipeline.run_velocity("nonexistent").unwrap_err();
        assert!(matches!(
            err,
            crate::error::AdoptrackError::Analysis(AnalysisError::UnknownList { .. })
        ));
    }

    #[test]
    fn test_failed_insights_stage_writes_no_artifact() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pipeline = Pipeline::new(&config);
        let key = config.lists[0].key.clone();

        // No upstream artifacts exist, so the stage must fail cleanly.
        assert!(pipeline.run_insights(&key).is_err());
        let store = ArtifactStore::new(config.processed_dir());
        assert!(store.latest_path(&insights_prefix(&key)).is_none());
    }

    #[test]
    fn test_run_records_every_stage_in_order() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pipeline = Pipeline::new(&config);

        let summary = pipeline.run();
        // quality + velocity and insights per list + comparative.
        assert_eq!(summary.stages.len(), 2 + 2 * config.lists.len());
        assert_eq!(summary.stages[0].stage, "quality");
        assert_eq!(summary.stages.last().unwrap().stage, "comparative");

        // Even with no raw snapshots every stage completes: quality and
        // velocity report per-technology failures rather than aborting, and
        // the downstream stages consume those artifacts.
        assert!(summary.all_succeeded());
        assert_eq!(summary.failed(), 0);
    }

    #[test]
    fn test_run_continues_past_a_failed_stage() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.lists.truncate(1);
        let pipeline = Pipeline::new(&config);

        let summary = pipeline.run();
        // One list: the comparative stage fails but is still recorded.
        let comparative = summary.stages.last().unwrap();
        assert_eq!(comparative.stage, "comparative");
        assert!(!comparative.succeeded);
        assert!(comparative.error.is_some());
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.succeeded(), summary.stages.len() - 1);
    }
}
