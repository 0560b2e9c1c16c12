//! Source normalization, cross-source confidence scoring, and hype
//! detection.
//!
//! Merges the most recent snapshot per (list, source) into one canonical
//! record per technology, scores how many independent sources corroborate
//! it, and flags technologies whose visibility diverges sharply from usage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AnalysisConfig, Thresholds, WatchList};
use crate::store::ArtifactStore;
use crate::types::{
    ConfidenceAssessment, ConfidenceTier, GithubMetrics, HypeFlag, MergedRecord, RawObservation,
    RegistryMetrics, SourceKind, SourceMetrics,
};

/// Per-technology validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyValidation {
    pub technology: String,
    pub category: String,
    pub confidence: ConfidenceAssessment,
    pub source_count: usize,
    pub hype: HypeFlag,
    pub metrics: BTreeMap<SourceKind, SourceMetrics>,
}

/// Confidence and hype counts across one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub hype_detected: usize,
}

/// Quality validation report for one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub list_name: String,
    pub validated_at: DateTime<Utc>,
    pub total_technologies: usize,
    pub technologies: Vec<TechnologyValidation>,
    pub summary: QualitySummary,
}

/// Validates data quality through multi-source cross-validation.
pub struct QualityChecker<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> QualityChecker<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Validate every configured list, keyed by list key.
    pub fn validate_all(&self) -> BTreeMap<String, QualityReport> {
        let mut results = BTreeMap::new();
        for list in &self.config.lists {
            let report = self.validate_list(list);
            info!(
                list = %list.key,
                total = report.total_technologies,
                high = report.summary.high_confidence,
                low = report.summary.low_confidence,
                hype = report.summary.hype_detected,
                "quality validation complete"
            );
            results.insert(list.key.clone(), report);
        }
        results
    }

    /// Cross-validate one list's most recent snapshots.
    pub fn validate_list(&self, list: &WatchList) -> QualityReport {
        let merged = self.merge_sources(list);

        let mut technologies = Vec::with_capacity(merged.len());
        let mut summary = QualitySummary::default();

        for record in merged.into_values() {
            let confidence = assess_confidence(
                &record.sources,
                self.config.thresholds.high_confidence_sources,
            );
            let hype = detect_hype(&record.sources, &self.config.thresholds);

            match confidence.tier {
                ConfidenceTier::High => summary.high_confidence += 1,
                ConfidenceTier::Medium => summary.medium_confidence += 1,
                ConfidenceTier::Low => summary.low_confidence += 1,
                ConfidenceTier::None => {}
            }
            if hype.is_hype {
                warn!(
                    technology = %record.technology,
                    reasons = ?hype.reasons,
                    "hype signals detected"
                );
                summary.hype_detected += 1;
            }

            technologies.push(TechnologyValidation {
                technology: record.technology,
                category: record.category,
                source_count: record.sources.len(),
                confidence,
                hype,
                metrics: record.sources,
            });
        }

        QualityReport {
            list_name: list.key.clone(),
            validated_at: Utc::now(),
            total_technologies: technologies.len(),
            technologies,
            summary,
        }
    }

    /// Merge the latest snapshot from every source into one record per
    /// technology, keyed by normalized name. A missing snapshot file or an
    /// error-marked observation leaves the source absent; it never
    /// contributes zeros.
    fn merge_sources(&self, list: &WatchList) -> BTreeMap<String, MergedRecord> {
        let store = ArtifactStore::new(self.config.raw_dir(&list.key));
        let mut merged: BTreeMap<String, MergedRecord> = BTreeMap::new();

        for kind in SourceKind::ALL {
            let observations = match store.latest::<Vec<RawObservation>>(kind.as_str()) {
                Ok(Some(observations)) => observations,
                Ok(None) => {
                    warn!(list = %list.key, source = %kind, "no snapshot found");
                    continue;
                }
                Err(err) => {
                    warn!(list = %list.key, source = %kind, error = %err, "unreadable snapshot, treating source as absent");
                    continue;
                }
            };

            for obs in &observations {
                if obs.technology.is_empty() || obs.is_errored() {
                    continue;
                }
                let key = normalize_name(&obs.technology);
                let metrics = match kind {
                    SourceKind::Github => {
                        SourceMetrics::Github(GithubMetrics::from_observation(obs))
                    }
                    SourceKind::Npm => {
                        SourceMetrics::Registry(RegistryMetrics::from_npm_observation(obs))
                    }
                    SourceKind::Pypi => {
                        SourceMetrics::Registry(RegistryMetrics::from_pypi_observation(obs))
                    }
                };
                let record = merged.entry(key.clone()).or_insert_with(|| MergedRecord {
                    technology: obs.technology.clone(),
                    category: category_for(list, &key),
                    sources: BTreeMap::new(),
                });
                record.sources.insert(kind, metrics);
            }
        }

        info!(list = %list.key, technologies = merged.len(), "merged data sources");
        merged
    }
}

/// Category tag from the list definition, matched on normalized name.
fn category_for(list: &WatchList, normalized: &str) -> String {
    list.technologies
        .iter()
        .find(|t| normalize_name(&t.name) == normalized)
        .map(|t| t.category.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Normalize technology names for comparison across sources: lowercase with
/// separators stripped.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect()
}

/// Confidence tier from the number of sources with successfully parsed data.
///
/// Evaluated in this exact order: the HIGH branch wins first, so at the
/// default threshold of 2 the MEDIUM branch (source_count == 2) is
/// unreachable. That precedence is intentional; raising the threshold makes
/// MEDIUM reachable.
pub fn assess_confidence(
    sources: &BTreeMap<SourceKind, SourceMetrics>,
    high_confidence_sources: usize,
) -> ConfidenceAssessment {
    let available: Vec<SourceKind> = sources.keys().copied().collect();
    let source_count = available.len();

    let (tier, score) = if source_count >= high_confidence_sources {
        (ConfidenceTier::High, 5)
    } else if source_count == 2 {
        (ConfidenceTier::Medium, 3)
    } else if source_count == 1 {
        (ConfidenceTier::Low, 1)
    } else {
        (ConfidenceTier::None, 0)
    };

    ConfidenceAssessment {
        tier,
        score,
        sources: available,
    }
}

/// Detect visibility-vs-usage divergence. All three rules are evaluated
/// independently and their reasons unioned.
pub fn detect_hype(
    sources: &BTreeMap<SourceKind, SourceMetrics>,
    thresholds: &Thresholds,
) -> HypeFlag {
    let mut reasons = Vec::new();

    let stars = sources
        .get(&SourceKind::Github)
        .and_then(SourceMetrics::stars)
        .unwrap_or(0);
    let npm_monthly = sources
        .get(&SourceKind::Npm)
        .and_then(SourceMetrics::monthly_downloads);
    let pypi_monthly = sources
        .get(&SourceKind::Pypi)
        .and_then(SourceMetrics::monthly_downloads);

    if let Some(npm) = npm_monthly {
        if stars > thresholds.hype_star_floor && npm < thresholds.hype_npm_monthly_floor {
            reasons.push("High GitHub stars but low npm downloads".to_string());
        }
    }

    if let Some(pypi) = pypi_monthly {
        if stars > thresholds.hype_star_floor && pypi < thresholds.hype_pypi_monthly_floor {
            reasons.push("High GitHub stars but low PyPI downloads".to_string());
        }
    }

    if let (Some(npm), Some(pypi)) = (npm_monthly, pypi_monthly) {
        if npm > 0 && pypi > 0 {
            let ratio = npm.max(pypi) as f64 / npm.min(pypi) as f64;
            if ratio > thresholds.hype_divergence_ratio {
                reasons.push(format!(
                    "Large divergence between npm and PyPI downloads ({ratio:.1}x)"
                ));
            }
        }
    }

    HypeFlag {
        is_hype: !reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn github(stars: u64) -> SourceMetrics {
        SourceMetrics::Github(GithubMetrics {
            stars,
            ..Default::default()
        })
    }

    fn registry(monthly: u64) -> SourceMetrics {
        SourceMetrics::Registry(RegistryMetrics {
            downloads_last_month: monthly,
            ..Default::default()
        })
    }

    fn sources(entries: &[(SourceKind, SourceMetrics)]) -> BTreeMap<SourceKind, SourceMetrics> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_normalize_name_strips_separators() {
        assert_eq!(normalize_name("Anthropic-Claude"), "anthropicclaude");
        assert_eq!(normalize_name("great_expectations "), "greatexpectations");
        assert_eq!(normalize_name("openai"), "openai");
    }

    #[test]
    fn test_confidence_one_source_is_low() {
        let assessment = assess_confidence(&sources(&[(SourceKind::Github, github(100))]), 2);
        assert_eq!(assessment.tier, ConfidenceTier::Low);
        assert_eq!(assessment.score, 1);
        assert_eq!(assessment.sources, vec![SourceKind::Github]);
    }

    #[test]
    fn test_confidence_three_sources_is_high() {
        let assessment = assess_confidence(
            &sources(&[
                (SourceKind::Github, github(100)),
                (SourceKind::Npm, registry(10)),
                (SourceKind::Pypi, registry(10)),
            ]),
            2,
        );
        assert_eq!(assessment.tier, ConfidenceTier::High);
        assert_eq!(assessment.score, 5);
        assert_eq!(assessment.sources.len(), 3);
    }

    #[test]
    fn test_confidence_no_sources_is_none() {
        let assessment = assess_confidence(&BTreeMap::new(), 2);
        assert_eq!(assessment.tier, ConfidenceTier::None);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn test_confidence_high_branch_shadows_medium_at_default_threshold() {
        // source_count == 2 matches the HIGH branch first; MEDIUM only
        // becomes reachable with a higher threshold.
        let two = sources(&[
            (SourceKind::Github, github(100)),
            (SourceKind::Npm, registry(10)),
        ]);
        assert_eq!(assess_confidence(&two, 2).tier, ConfidenceTier::High);
        assert_eq!(assess_confidence(&two, 3).tier, ConfidenceTier::Medium);
    }

    #[test]
    fn test_confidence_tier_non_decreasing_in_source_count() {
        fn rank(tier: ConfidenceTier) -> u8 {
            match tier {
                ConfidenceTier::None => 0,
                ConfidenceTier::Low => 1,
                ConfidenceTier::Medium => 2,
                ConfidenceTier::High => 3,
            }
        }
        let steps = [
            BTreeMap::new(),
            sources(&[(SourceKind::Github, github(1))]),
            sources(&[
                (SourceKind::Github, github(1)),
                (SourceKind::Npm, registry(1)),
            ]),
            sources(&[
                (SourceKind::Github, github(1)),
                (SourceKind::Npm, registry(1)),
                (SourceKind::Pypi, registry(1)),
            ]),
        ];
        for threshold in [2usize, 3] {
            let ranks: Vec<u8> = steps
                .iter()
                .map(|s| rank(assess_confidence(s, threshold).tier))
                .collect();
            assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_hype_high_stars_low_npm_downloads() {
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Github, github(15_000)),
                (SourceKind::Npm, registry(500)),
            ]),
            &Thresholds::default(),
        );
        assert!(flag.is_hype);
        assert_eq!(flag.reasons, vec!["High GitHub stars but low npm downloads"]);
    }

    #[test]
    fn test_hype_high_stars_low_pypi_downloads() {
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Github, github(15_000)),
                (SourceKind::Pypi, registry(5_000)),
            ]),
            &Thresholds::default(),
        );
        assert!(flag.is_hype);
        assert_eq!(flag.reasons, vec!["High GitHub stars but low PyPI downloads"]);
    }

    #[test]
    fn test_hype_registry_divergence_includes_ratio() {
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Npm, registry(120_000)),
                (SourceKind::Pypi, registry(10_000)),
            ]),
            &Thresholds::default(),
        );
        assert!(flag.is_hype);
        assert_eq!(
            flag.reasons,
            vec!["Large divergence between npm and PyPI downloads (12.0x)"]
        );
    }

    #[test]
    fn test_hype_rules_union() {
        // Stars high, npm tiny, pypi tiny, and registries diverge >10x:
        // all three rules fire.
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Github, github(50_000)),
                (SourceKind::Npm, registry(500)),
                (SourceKind::Pypi, registry(9_000)),
            ]),
            &Thresholds::default(),
        );
        assert!(flag.is_hype);
        assert_eq!(flag.reasons.len(), 3);
    }

    #[test]
    fn test_no_hype_for_healthy_signals() {
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Github, github(50_000)),
                (SourceKind::Npm, registry(2_000_000)),
                (SourceKind::Pypi, registry(1_500_000)),
            ]),
            &Thresholds::default(),
        );
        assert!(!flag.is_hype);
        assert!(flag.reasons.is_empty());
    }

    #[test]
    fn test_validate_list_treats_error_marker_as_absent_source() {
        use crate::config::TechnologySpec;
        use chrono::TimeZone;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let mut config = AnalysisConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.lists = vec![WatchList {
            key: "pilot".to_string(),
            name: "Pilot".to_string(),
            description: String::new(),
            focus: String::new(),
            technologies: vec![TechnologySpec {
                name: "langchain".to_string(),
                display_name: "LangChain".to_string(),
                category: "ai_infrastructure".to_string(),
                github: Some("langchain-ai/langchain".to_string()),
                npm: Some("langchain".to_string()),
                pypi: Some("langchain".to_string()),
            }],
        }];

        let stamp = chrono::Utc.with_ymd_and_hms(2026, 8, 30, 6, 0, 0).unwrap();
        let store = ArtifactStore::new(config.raw_dir("pilot"));
        store
            .write_at(
                "github",
                &serde_json::json!([{
                    "technology": "langchain",
                    "collected_at": "2026-08-30T06:00:00Z",
                    "stars": 90000, "forks": 14000, "watchers": 700, "open_issues": 600,
                }]),
                stamp,
            )
            .unwrap();
        store
            .write_at(
                "npm",
                &serde_json::json!([{
                    "technology": "langchain",
                    "collected_at": "2026-08-30T06:00:00Z",
                    "error": "registry timeout",
                }]),
                stamp,
            )
            .unwrap();
        store
            .write_at(
                "pypi",
                &serde_json::json!([{
                    "technology": "langchain",
                    "collected_at": "2026-08-30T06:00:00Z",
                    "downloads_recent": {"last_month": 48_000_000},
                }]),
                stamp,
            )
            .unwrap();

        let checker = QualityChecker::new(&config);
        let report = checker.validate_list(&config.lists[0]);

        assert_eq!(report.total_technologies, 1);
        let tech = &report.technologies[0];
        // npm errored, so only github and pypi count.
        assert_eq!(tech.source_count, 2);
        assert!(!tech.metrics.contains_key(&SourceKind::Npm));
        assert_eq!(tech.confidence.tier, ConfidenceTier::High);
        assert_eq!(tech.category, "ai_infrastructure");

        // Re-running on the unchanged snapshot set yields identical counts.
        let again = checker.validate_list(&config.lists[0]);
        assert_eq!(again.summary, report.summary);
        assert_eq!(again.total_technologies, report.total_technologies);
    }

    #[test]
    fn test_zero_downloads_never_divide() {
        let flag = detect_hype(
            &sources(&[
                (SourceKind::Npm, registry(0)),
                (SourceKind::Pypi, registry(100)),
            ]),
            &Thresholds::default(),
        );
        assert!(!flag.is_hype);
    }
}
