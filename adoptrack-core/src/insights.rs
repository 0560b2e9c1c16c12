//! Per-list insight synthesis from quality and velocity artifacts.
//!
//! Ranks adoption leaders, joins hype candidates, rolls up category trends,
//! detects emerging and declining technologies, and renders the executive
//! summary. Both upstream artifacts are required; a missing one fails the
//! whole list rather than producing a partial report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::quality::{QualityReport, QualitySummary};
use crate::store::ArtifactStore;
use crate::types::{ConfidenceTier, Growth, Regime, SourceKind};
use crate::velocity::VelocityReport;

/// Artifact prefix for the combined quality validation report.
pub const QUALITY_PREFIX: &str = "quality_validation";

/// Artifact prefix for a list's velocity report.
pub fn velocity_prefix(list_key: &str) -> String {
    format!("velocity_{list_key}")
}

/// Artifact prefix for a list's insights report.
pub fn insights_prefix(list_key: &str) -> String {
    format!("insights_{list_key}")
}

/// A technology ranked by adoption momentum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionLeader {
    pub technology: String,
    pub category: String,
    pub momentum_score: f64,
    pub github_stars: u64,
    /// Dominant regime, taken from the stars velocity.
    pub regime: Regime,
}

/// A technology whose visibility diverges from its usage signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypeCandidate {
    pub technology: String,
    pub confidence_level: ConfidenceTier,
    pub hype_reasons: Vec<String>,
    pub available_sources: Vec<SourceKind>,
}

/// One member of a category rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMember {
    pub technology: String,
    pub momentum: f64,
}

/// Momentum statistics for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub technology_count: usize,
    pub average_momentum: f64,
    pub max_momentum: f64,
    pub min_momentum: f64,
    /// Members sorted by momentum descending.
    pub technologies: Vec<CategoryMember>,
}

/// A technology in the accelerating or new-emergence regime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingTechnology {
    pub technology: String,
    pub category: String,
    pub regime: Regime,
    pub growth_percentage: Growth,
    pub current_stars: u64,
}

/// Strategic insights for one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsReport {
    pub list_name: String,
    pub generated_at: DateTime<Utc>,
    pub data_quality_summary: QualitySummary,
    pub adoption_leaders: Vec<AdoptionLeader>,
    pub hype_detected: Vec<HypeCandidate>,
    pub category_trends: BTreeMap<String, CategoryTrend>,
    pub emerging_technologies: Vec<TrendingTechnology>,
    pub declining_technologies: Vec<TrendingTechnology>,
    pub executive_summary: String,
}

/// Generates strategic insights from analyzed data.
pub struct InsightGenerator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> InsightGenerator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Generate insights for one list from its most recent quality and
    /// velocity artifacts.
    pub fn generate(&self, list_key: &str) -> Result<InsightsReport> {
        let store = ArtifactStore::new(self.config.processed_dir());

        let quality = store
            .latest::<BTreeMap<String, QualityReport>>(QUALITY_PREFIX)
            .ok()
            .flatten()
            .and_then(|mut reports| reports.remove(list_key));
        let velocity = store
            .latest::<VelocityReport>(&velocity_prefix(list_key))
            .ok()
            .flatten();

        let (Some(quality), Some(velocity)) = (quality, velocity) else {
            warn!(list = %list_key, "missing quality or velocity artifact");
            return Err(AnalysisError::InsufficientData {
                subject: format!("insights for {list_key}"),
                reason: "latest quality and velocity artifacts are both required".to_string(),
            }
            .into());
        };

        Ok(self.build(list_key, &quality, &velocity))
    }

    /// Pure synthesis over already-loaded reports.
    pub fn build(
        &self,
        list_key: &str,
        quality: &QualityReport,
        velocity: &VelocityReport,
    ) -> InsightsReport {
        let leaders = adoption_leaders(velocity, self.config.thresholds.top_n_leaders);
        let hype = hype_candidates(quality);
        let trends = category_trends(velocity);
        let emerging = emerging_technologies(velocity);
        let declining = declining_technologies(velocity);

        info!(
            list = %list_key,
            leaders = leaders.len(),
            emerging = emerging.len(),
            declining = declining.len(),
            hype = hype.len(),
            "insights generated"
        );

        let mut report = InsightsReport {
            list_name: list_key.to_string(),
            generated_at: Utc::now(),
            data_quality_summary: quality.summary.clone(),
            adoption_leaders: leaders,
            hype_detected: hype,
            category_trends: trends,
            emerging_technologies: emerging,
            declining_technologies: declining,
            executive_summary: String::new(),
        };
        report.executive_summary = executive_summary(&report);
        report
    }
}

/// Top-N technologies by momentum score descending.
pub fn adoption_leaders(velocity: &VelocityReport, n: usize) -> Vec<AdoptionLeader> {
    let mut leaders: Vec<AdoptionLeader> = velocity
        .velocities
        .iter()
        .filter_map(|tech| {
            let github = tech.github.as_ref()?.as_ready()?;
            Some(AdoptionLeader {
                technology: tech.technology.clone(),
                category: tech.category.clone(),
                momentum_score: github.momentum_score,
                github_stars: github.latest_values.stars,
                regime: github.stars.regime,
            })
        })
        .collect();
    leaders.sort_by(|a, b| b.momentum_score.total_cmp(&a.momentum_score));
    leaders.truncate(n);
    leaders
}

/// Technologies whose quality validation raised hype flags.
pub fn hype_candidates(quality: &QualityReport) -> Vec<HypeCandidate> {
    quality
        .technologies
        .iter()
        .filter(|tech| tech.hype.is_hype)
        .map(|tech| HypeCandidate {
            technology: tech.technology.clone(),
            confidence_level: tech.confidence.tier,
            hype_reasons: tech.hype.reasons.clone(),
            available_sources: tech.confidence.sources.clone(),
        })
        .collect()
}

/// Group momentum by category tag and compute summary statistics.
pub fn category_trends(velocity: &VelocityReport) -> BTreeMap<String, CategoryTrend> {
    let mut by_category: BTreeMap<String, Vec<CategoryMember>> = BTreeMap::new();
    for tech in &velocity.velocities {
        if let Some(momentum) = tech.momentum() {
            by_category
                .entry(tech.category.clone())
                .or_default()
                .push(CategoryMember {
                    technology: tech.technology.clone(),
                    momentum,
                });
        }
    }

    by_category
        .into_iter()
        .map(|(category, mut members)| {
            let momenta: Vec<f64> = members.iter().map(|m| m.momentum).collect();
            let sum: f64 = momenta.iter().sum();
            let average = sum / momenta.len() as f64;
            let max = momenta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = momenta.iter().copied().fold(f64::INFINITY, f64::min);
            members.sort_by(|a, b| b.momentum.total_cmp(&a.momentum));
            (
                category,
                CategoryTrend {
                    technology_count: members.len(),
                    average_momentum: average,
                    max_momentum: max,
                    min_momentum: min,
                    technologies: members,
                },
            )
        })
        .collect()
}

/// Technologies in the accelerating or new-emergence regime, sorted by
/// growth percentage descending (emergence sorts first).
pub fn emerging_technologies(velocity: &VelocityReport) -> Vec<TrendingTechnology> {
    let mut emerging: Vec<TrendingTechnology> = velocity
        .velocities
        .iter()
        .filter_map(|tech| {
            let github = tech.github.as_ref()?.as_ready()?;
            matches!(
                github.stars.regime,
                Regime::Accelerating | Regime::NewEmergence
            )
            .then(|| TrendingTechnology {
                technology: tech.technology.clone(),
                category: tech.category.clone(),
                regime: github.stars.regime,
                growth_percentage: github.stars.growth_percentage,
                current_stars: github.latest_values.stars,
            })
        })
        .collect();
    emerging.sort_by(|a, b| {
        b.growth_percentage
            .sort_key()
            .total_cmp(&a.growth_percentage.sort_key())
    });
    emerging
}

/// Technologies in the declining or collapsing regime, in discovery order.
pub fn declining_technologies(velocity: &VelocityReport) -> Vec<TrendingTechnology> {
    velocity
        .velocities
        .iter()
        .filter_map(|tech| {
            let github = tech.github.as_ref()?.as_ready()?;
            matches!(github.stars.regime, Regime::Declining | Regime::Collapsing).then(|| {
                TrendingTechnology {
                    technology: tech.technology.clone(),
                    category: tech.category.clone(),
                    regime: github.stars.regime,
                    growth_percentage: github.stars.growth_percentage,
                    current_stars: github.latest_values.stars,
                }
            })
        })
        .collect()
}

/// Fixed-slot executive summary. Slots whose data is absent are omitted;
/// when every slot is absent an explicit sentinel is emitted instead of an
/// empty string.
pub fn executive_summary(report: &InsightsReport) -> String {
    let mut parts = Vec::new();

    if let Some(leader) = report.adoption_leaders.first() {
        parts.push(format!(
            "**Leading adoption:** {} ({}) with {:.1}% monthly growth momentum.",
            leader.technology, leader.category, leader.momentum_score
        ));
    }

    let emerging_count = report.emerging_technologies.len();
    if emerging_count > 0 {
        parts.push(format!(
            "**{emerging_count} technologies** showing rapid acceleration or emergence."
        ));
    }

    let hype_count = report.hype_detected.len();
    if hype_count > 0 {
        parts.push(format!(
            "**{hype_count} hype signals** detected - high visibility but low actual usage."
        ));
    }

    let fastest = report
        .category_trends
        .iter()
        .max_by(|a, b| a.1.average_momentum.total_cmp(&b.1.average_momentum));
    if let Some((category, trend)) = fastest {
        parts.push(format!(
            "**Fastest category:** {} averaging {:.1}% growth.",
            category, trend.average_momentum
        ));
    }

    if parts.is_empty() {
        "Insufficient data for summary.".to_string()
    } else {
        parts.join("\n\n")
    }
}
