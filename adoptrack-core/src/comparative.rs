//! Cross-list comparative analysis.
//!
//! Compares two lists' momentum distributions, partitions their categories,
//! generates infrastructure-leads-application hypotheses against the
//! configured category tables, estimates adoption lag from maturity proxies,
//! and synthesizes the ordered strategic-insight statements. All inputs are
//! required; a missing artifact fails the comparison outright.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AnalysisConfig, Thresholds};
use crate::error::{AnalysisError, Computed, FailureKind, Result};
use crate::insights::{insights_prefix, velocity_prefix, InsightsReport};
use crate::store::ArtifactStore;
use crate::velocity::VelocityReport;

/// Artifact prefix for the comparative analysis report.
pub const COMPARATIVE_PREFIX: &str = "comparative_analysis";

/// Momentum distribution statistics for one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumStats {
    pub list: String,
    pub average_momentum: f64,
    pub median_momentum: f64,
}

/// Mean/median momentum comparison between two lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityComparison {
    pub first: MomentumStats,
    pub second: MomentumStats,
    /// first mean minus second mean, in percentage points.
    pub velocity_difference_percentage: f64,
    /// first mean over second mean; absent when the second mean is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_ratio: Option<f64>,
    /// The higher-mean list's key, or "tied" within the tie margin.
    pub leader: String,
    pub interpretation: String,
}

/// A category present in both lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedCategory {
    pub category: String,
    pub first_momentum: f64,
    pub second_momentum: f64,
    pub momentum_gap: f64,
    pub first_count: usize,
    pub second_count: usize,
}

/// A category present in only one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueCategory {
    pub category: String,
    pub momentum: f64,
    pub technology_count: usize,
}

/// Shared/unique partition of both lists' category rollups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatterns {
    pub shared: Vec<SharedCategory>,
    pub unique_to_first: Vec<UniqueCategory>,
    pub unique_to_second: Vec<UniqueCategory>,
}

/// A candidate infrastructure-leads-application pattern. Single-snapshot
/// and non-causal by construction; confidence is fixed at "medium".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadingIndicator {
    pub indicator_type: String,
    pub leading_category: String,
    pub following_category: String,
    pub momentum_gap: f64,
    pub hypothesis: String,
    pub confidence: String,
}

/// Relative market-maturity estimate between the two lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionLag {
    pub first_maturity_score: f64,
    pub second_maturity_score: f64,
    pub first_emerging_count: usize,
    pub second_emerging_count: usize,
    pub interpretation: String,
    pub estimated_lag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lag_magnitude: Option<String>,
    /// Caveat: a true lag measurement needs multi-period history.
    pub note: String,
}

/// Cross-list synthesis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparativeReport {
    pub generated_at: DateTime<Utc>,
    pub lists_compared: [String; 2],
    pub velocity_comparison: Computed<VelocityComparison>,
    pub category_patterns: CategoryPatterns,
    pub leading_indicators: Vec<LeadingIndicator>,
    pub adoption_lag: AdoptionLag,
    pub strategic_insights: Vec<String>,
}

/// Analyzes patterns across two strategic lists.
pub struct ComparativeAnalyzer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> ComparativeAnalyzer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compare the first two configured lists.
    pub fn generate(&self) -> Result<ComparativeReport> {
        if self.config.lists.len() < 2 {
            warn!(
                found = self.config.lists.len(),
                "comparative analysis needs at least two lists"
            );
            return Err(AnalysisError::InsufficientLists {
                found: self.config.lists.len(),
            }
            .into());
        }
        let first = self.config.lists[0].key.clone();
        let second = self.config.lists[1].key.clone();
        self.compare(&first, &second)
    }

    /// Compare two lists from their most recent insights and velocity
    /// artifacts.
    pub fn compare(&self, first_key: &str, second_key: &str) -> Result<ComparativeReport> {
        let store = ArtifactStore::new(self.config.processed_dir());

        let first_insights = store
            .latest::<InsightsReport>(&insights_prefix(first_key))
            .ok()
            .flatten();
        let second_insights = store
            .latest::<InsightsReport>(&insights_prefix(second_key))
            .ok()
            .flatten();
        let first_velocity = store
            .latest::<VelocityReport>(&velocity_prefix(first_key))
            .ok()
            .flatten();
        let second_velocity = store
            .latest::<VelocityReport>(&velocity_prefix(second_key))
            .ok()
            .flatten();

        let (Some(first_insights), Some(second_insights), Some(first_velocity), Some(second_velocity)) =
            (first_insights, second_insights, first_velocity, second_velocity)
        else {
            warn!(first = %first_key, second = %second_key, "missing artifacts for comparison");
            return Err(AnalysisError::InsufficientData {
                subject: format!("comparison of {first_key} and {second_key}"),
                reason: "latest insights and velocity artifacts are required for both lists"
                    .to_string(),
            }
            .into());
        };

        Ok(self.build(
            (first_key, &first_insights, &first_velocity),
            (second_key, &second_insights, &second_velocity),
        ))
    }

    /// Pure synthesis over already-loaded reports.
    pub fn build(
        &self,
        first: (&str, &InsightsReport, &VelocityReport),
        second: (&str, &InsightsReport, &VelocityReport),
    ) -> ComparativeReport {
        let (first_key, first_insights, first_velocity) = first;
        let (second_key, second_insights, second_velocity) = second;
        let thresholds = &self.config.thresholds;

        let velocity_comparison = compare_velocity(
            first_velocity,
            second_velocity,
            first_key,
            second_key,
            thresholds.velocity_tie_margin,
        );
        let category_patterns = category_patterns(first_insights, second_insights);
        let leading_indicators = leading_indicators(
            first_velocity,
            second_velocity,
            first_key,
            second_key,
            thresholds,
        );
        let adoption_lag = adoption_lag(
            first_insights,
            second_insights,
            first_key,
            second_key,
            thresholds,
        );

        info!(
            first = %first_key,
            second = %second_key,
            shared = category_patterns.shared.len(),
            indicators = leading_indicators.len(),
            "comparative analysis complete"
        );

        let mut report = ComparativeReport {
            generated_at: Utc::now(),
            lists_compared: [first_key.to_string(), second_key.to_string()],
            velocity_comparison,
            category_patterns,
            leading_indicators,
            adoption_lag,
            strategic_insights: Vec::new(),
        };
        report.strategic_insights = strategic_insights(&report);
        report
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

fn momenta(velocity: &VelocityReport) -> Vec<f64> {
    velocity
        .velocities
        .iter()
        .filter_map(|tech| tech.momentum())
        .collect()
}

/// Mean/median momentum comparison. Lists whose mean gap is inside the tie
/// margin are declared tied regardless of sign.
pub fn compare_velocity(
    first_velocity: &VelocityReport,
    second_velocity: &VelocityReport,
    first_key: &str,
    second_key: &str,
    tie_margin: f64,
) -> Computed<VelocityComparison> {
    let first_momenta = momenta(first_velocity);
    let second_momenta = momenta(second_velocity);

    if first_momenta.is_empty() || second_momenta.is_empty() {
        return Computed::failed(FailureKind::InsufficientData);
    }

    let first_avg = mean(&first_momenta);
    let second_avg = mean(&second_momenta);
    let difference = first_avg - second_avg;
    let ratio = (second_avg != 0.0).then(|| first_avg / second_avg);

    let (leader, interpretation) = if difference.abs() < tie_margin {
        (
            "tied".to_string(),
            format!("{first_key} and {second_key} show similar adoption velocities"),
        )
    } else if difference > 0.0 {
        (
            first_key.to_string(),
            format!(
                "{first_key} adoption is {difference:.1}% faster than {second_key}"
            ),
        )
    } else {
        (
            second_key.to_string(),
            format!(
                "{second_key} adoption is {:.1}% faster than {first_key}",
                difference.abs()
            ),
        )
    };

    Computed::Ready(VelocityComparison {
        first: MomentumStats {
            list: first_key.to_string(),
            average_momentum: first_avg,
            median_momentum: median(&first_momenta),
        },
        second: MomentumStats {
            list: second_key.to_string(),
            average_momentum: second_avg,
            median_momentum: median(&second_momenta),
        },
        velocity_difference_percentage: difference,
        velocity_ratio: ratio,
        leader,
        interpretation,
    })
}

/// Partition the union of both lists' category rollups into shared and
/// unique sets.
pub fn category_patterns(
    first_insights: &InsightsReport,
    second_insights: &InsightsReport,
) -> CategoryPatterns {
    let first_trends = &first_insights.category_trends;
    let second_trends = &second_insights.category_trends;

    let all_categories: BTreeSet<&String> =
        first_trends.keys().chain(second_trends.keys()).collect();

    let mut patterns = CategoryPatterns::default();
    for category in all_categories {
        match (first_trends.get(category), second_trends.get(category)) {
            (Some(first), Some(second)) => patterns.shared.push(SharedCategory {
                category: category.clone(),
                first_momentum: first.average_momentum,
                second_momentum: second.average_momentum,
                momentum_gap: first.average_momentum - second.average_momentum,
                first_count: first.technology_count,
                second_count: second.technology_count,
            }),
            (Some(first), None) => patterns.unique_to_first.push(UniqueCategory {
                category: category.clone(),
                momentum: first.average_momentum,
                technology_count: first.technology_count,
            }),
            (None, Some(second)) => patterns.unique_to_second.push(UniqueCategory {
                category: category.clone(),
                momentum: second.average_momentum,
                technology_count: second.technology_count,
            }),
            (None, None) => unreachable!("category came from the union of both maps"),
        }
    }
    patterns
}

/// Per-category mean momentum for one velocity report.
fn category_momentum(velocity: &VelocityReport) -> BTreeMap<String, f64> {
    let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for tech in &velocity.velocities {
        if let Some(momentum) = tech.momentum() {
            by_category
                .entry(tech.category.clone())
                .or_default()
                .push(momentum);
        }
    }
    by_category
        .into_iter()
        .map(|(category, values)| (category, mean(&values)))
        .collect()
}

/// Emit a hypothesis for every configured (infrastructure, application)
/// category pair where the first list's infrastructure momentum exceeds the
/// second list's application momentum by more than the configured gap.
///
/// These are candidates for human review, not validated causal claims.
pub fn leading_indicators(
    first_velocity: &VelocityReport,
    second_velocity: &VelocityReport,
    first_key: &str,
    second_key: &str,
    thresholds: &Thresholds,
) -> Vec<LeadingIndicator> {
    let first_by_category = category_momentum(first_velocity);
    let second_by_category = category_momentum(second_velocity);

    let mut indicators = Vec::new();
    for infra_category in &thresholds.infrastructure_categories {
        let Some(&infra_momentum) = first_by_category.get(infra_category) else {
            continue;
        };
        for app_category in &thresholds.application_categories {
            let Some(&app_momentum) = second_by_category.get(app_category) else {
                continue;
            };
            if infra_momentum > app_momentum + thresholds.indicator_gap {
                indicators.push(LeadingIndicator {
                    indicator_type: "infrastructure_leads_application".to_string(),
                    leading_category: infra_category.clone(),
                    following_category: app_category.clone(),
                    momentum_gap: infra_momentum - app_momentum,
                    hypothesis: format!(
                        "{infra_category} adoption in {first_key} may predict {app_category} growth in {second_key}"
                    ),
                    confidence: "medium".to_string(),
                });
            }
        }
    }
    indicators
}

/// Estimate relative market maturity from each list's adoption-leader mean
/// momentum.
pub fn adoption_lag(
    first_insights: &InsightsReport,
    second_insights: &InsightsReport,
    first_key: &str,
    second_key: &str,
    thresholds: &Thresholds,
) -> AdoptionLag {
    let maturity = |insights: &InsightsReport| {
        let scores: Vec<f64> = insights
            .adoption_leaders
            .iter()
            .map(|l| l.momentum_score)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            mean(&scores)
        }
    };

    let first_maturity = maturity(first_insights);
    let second_maturity = maturity(second_insights);
    let gap = first_maturity - second_maturity;

    let (interpretation, estimated_lag, lag_magnitude) = if gap.abs()
        < thresholds.lag_similarity_margin
    {
        (
            format!("{first_key} and {second_key} markets show similar maturity"),
            "minimal".to_string(),
            None,
        )
    } else {
        let magnitude = if gap.abs() > thresholds.lag_significant_gap {
            "significant"
        } else {
            "moderate"
        };
        if gap > 0.0 {
            (
                format!("{first_key} appears more mature than {second_key}"),
                format!("{second_key} likely lags {first_key}"),
                Some(magnitude.to_string()),
            )
        } else {
            (
                format!("{second_key} appears more mature than {first_key}"),
                format!("{first_key} likely lags {second_key}"),
                Some(magnitude.to_string()),
            )
        }
    };

    AdoptionLag {
        first_maturity_score: first_maturity,
        second_maturity_score: second_maturity,
        first_emerging_count: first_insights.emerging_technologies.len(),
        second_emerging_count: second_insights.emerging_technologies.len(),
        interpretation,
        estimated_lag,
        lag_magnitude,
        note: "Quantifying exact lag requires time-series data. Current analysis based on relative maturity signals.".to_string(),
    }
}

/// Fixed-order statement synthesis: velocity interpretation, up to three
/// unique categories per list, the first two hypotheses, then the lag
/// interpretation. Order and truncation counts are part of the output
/// contract.
pub fn strategic_insights(report: &ComparativeReport) -> Vec<String> {
    let mut insights = Vec::new();

    if let Computed::Ready(velocity) = &report.velocity_comparison {
        insights.push(velocity.interpretation.clone());
    }

    let unique_statement = |list: &str, unique: &[UniqueCategory]| {
        let categories: Vec<&str> = unique
            .iter()
            .take(3)
            .map(|u| u.category.as_str())
            .collect();
        format!("{list} focuses uniquely on: {}", categories.join(", "))
    };
    if !report.category_patterns.unique_to_first.is_empty() {
        insights.push(unique_statement(
            &report.lists_compared[0],
            &report.category_patterns.unique_to_first,
        ));
    }
    if !report.category_patterns.unique_to_second.is_empty() {
        insights.push(unique_statement(
            &report.lists_compared[1],
            &report.category_patterns.unique_to_second,
        ));
    }

    for indicator in report.leading_indicators.iter().take(2) {
        insights.push(indicator.hypothesis.clone());
    }

    insights.push(report.adoption_lag.interpretation.clone());
    insights
}
