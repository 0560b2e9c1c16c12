//! Core domain types shared across the analysis stages.
//!
//! Raw snapshot observations, canonical per-source metrics, confidence and
//! hype assessments, and the growth/regime model used by the velocity engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An independent telemetry ecosystem we collect audience signals from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Repository metrics (stars, forks, watchers, contributors).
    Github,
    /// npm registry download counts.
    Npm,
    /// PyPI registry download counts.
    Pypi,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Github, SourceKind::Npm, SourceKind::Pypi];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::Npm => "npm",
            SourceKind::Pypi => "pypi",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One technology's entry inside a raw snapshot file, as collected upstream.
///
/// Source-specific numeric fields stay schemaless here; the quality and
/// velocity stages map them to canonical metrics. An `error` field means the
/// source lookup failed for this technology — the observation is treated as
/// absent, never as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub technology: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawObservation {
    /// Whether the upstream collector recorded an error for this technology.
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    /// Numeric field, defaulting to 0 when absent or non-numeric.
    pub fn count(&self, key: &str) -> u64 {
        self.fields.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Numeric field nested one object deep, defaulting to 0.
    pub fn nested_count(&self, outer: &str, inner: &str) -> u64 {
        self.fields
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Float field nested one object deep, defaulting to 0.0.
    pub fn nested_float(&self, outer: &str, inner: &str) -> f64 {
        self.fields
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// Canonical repository metrics extracted from a github observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubMetrics {
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub watchers: u64,
    pub contributors: u64,
    pub commits_last_year: u64,
}

impl GithubMetrics {
    pub fn from_observation(obs: &RawObservation) -> Self {
        Self {
            stars: obs.count("stars"),
            forks: obs.count("forks"),
            open_issues: obs.count("open_issues"),
            watchers: obs.count("watchers"),
            contributors: obs.nested_count("contributors", "total_contributors"),
            commits_last_year: obs.nested_count("commit_activity", "total_commits_last_year"),
        }
    }
}

/// Canonical package-registry metrics (npm or PyPI).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads_last_day: Option<u64>,
    pub downloads_last_week: u64,
    pub downloads_last_month: u64,
    pub downloads_30_day_total: u64,
    pub downloads_30_day_avg: f64,
}

impl RegistryMetrics {
    pub fn from_npm_observation(obs: &RawObservation) -> Self {
        Self {
            downloads_last_day: None,
            downloads_last_week: obs.count("downloads_last_week"),
            downloads_last_month: obs.count("downloads_last_month"),
            downloads_30_day_total: obs.nested_count("downloads_30_day", "total_downloads"),
            downloads_30_day_avg: obs.nested_float("downloads_30_day", "daily_average"),
        }
    }

    pub fn from_pypi_observation(obs: &RawObservation) -> Self {
        Self {
            downloads_last_day: Some(obs.nested_count("downloads_recent", "last_day")),
            downloads_last_week: obs.nested_count("downloads_recent", "last_week"),
            downloads_last_month: obs.nested_count("downloads_recent", "last_month"),
            downloads_30_day_total: obs.nested_count("downloads_overall", "total_downloads_30_day"),
            downloads_30_day_avg: obs.nested_float("downloads_overall", "average_daily"),
        }
    }
}

/// Normalized metrics for one (technology, source) pair.
///
/// Untagged: repository metrics carry `stars`, registry metrics carry
/// download counts, so the serialized forms are unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceMetrics {
    Github(GithubMetrics),
    Registry(RegistryMetrics),
}

impl SourceMetrics {
    pub fn stars(&self) -> Option<u64> {
        match self {
            SourceMetrics::Github(m) => Some(m.stars),
            SourceMetrics::Registry(_) => None,
        }
    }

    pub fn monthly_downloads(&self) -> Option<u64> {
        match self {
            SourceMetrics::Github(_) => None,
            SourceMetrics::Registry(m) => Some(m.downloads_last_month),
        }
    }
}

/// Per-technology aggregation across sources for one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecord {
    /// Display name, taken from the first source that supplied it.
    pub technology: String,
    pub category: String,
    pub sources: BTreeMap<SourceKind, SourceMetrics>,
}

/// Categorical trust level reflecting how many independent sources
/// corroborate a technology's metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    None,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "HIGH",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::Low => "LOW",
            ConfidenceTier::None => "NONE",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-source agreement assessment, a pure function of source count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub tier: ConfidenceTier,
    pub score: u8,
    pub sources: Vec<SourceKind>,
}

/// Heuristic signal that visibility diverges sharply from usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypeFlag {
    pub is_hype: bool,
    pub reasons: Vec<String>,
}

/// Monthly growth, either a finite percentage or the unbounded sentinel for
/// a metric that emerged from zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "percentage", rename_all = "snake_case")]
pub enum Growth {
    /// Previous value was zero and the current one is positive; the growth
    /// rate is unbounded.
    Emerged,
    /// Finite monthly growth percentage.
    Finite(f64),
}

impl Growth {
    /// Percentage used for weighted scoring: the unbounded sentinel clamps
    /// to 100 so momentum stays finite and sortable.
    pub fn clamped_percentage(&self) -> f64 {
        match self {
            Growth::Emerged => 100.0,
            Growth::Finite(pct) => *pct,
        }
    }

    /// Ordering key where emergence sorts above any finite growth.
    pub fn sort_key(&self) -> f64 {
        match self {
            Growth::Emerged => f64::INFINITY,
            Growth::Finite(pct) => *pct,
        }
    }

    pub fn is_emerged(&self) -> bool {
        matches!(self, Growth::Emerged)
    }

    pub fn finite(&self) -> Option<f64> {
        match self {
            Growth::Emerged => None,
            Growth::Finite(pct) => Some(*pct),
        }
    }
}

/// Qualitative growth classification derived from the monthly growth
/// percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    NewEmergence,
    NoActivity,
    Accelerating,
    Growing,
    Stable,
    Declining,
    Collapsing,
}

impl Regime {
    /// Classify a finite monthly growth percentage. The five bands partition
    /// the finite line: >50, >10, >-10, >-50, and everything below.
    pub fn classify(monthly_growth_percentage: f64) -> Self {
        if monthly_growth_percentage > 50.0 {
            Regime::Accelerating
        } else if monthly_growth_percentage > 10.0 {
            Regime::Growing
        } else if monthly_growth_percentage > -10.0 {
            Regime::Stable
        } else if monthly_growth_percentage > -50.0 {
            Regime::Declining
        } else {
            Regime::Collapsing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::NewEmergence => "new_emergence",
            Regime::NoActivity => "no_activity",
            Regime::Accelerating => "accelerating",
            Regime::Growing => "growing",
            Regime::Stable => "stable",
            Regime::Declining => "declining",
            Regime::Collapsing => "collapsing",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Growth measurement for one numeric field between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityMetric {
    pub growth_percentage: Growth,
    pub absolute_change: f64,
    pub regime: Regime,
    pub is_anomaly: bool,
    pub time_delta_days: f64,
}

impl VelocityMetric {
    /// Monthly growth rate (percentage / 100), preserving the sentinel.
    pub fn growth_rate(&self) -> Growth {
        match self.growth_percentage {
            Growth::Emerged => Growth::Emerged,
            Growth::Finite(pct) => Growth::Finite(pct / 100.0),
        }
    }
}
