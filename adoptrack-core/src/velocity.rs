//! Velocity engine: growth rates and momentum from pairs of historical
//! snapshots.
//!
//! For each (list, source) the earliest and latest qualifying snapshots
//! inside the lookback window are compared field by field. Elapsed time
//! comes from each snapshot's embedded collection timestamp, never from file
//! metadata. Rates are normalized to a monthly basis before regime
//! classification.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AnalysisConfig, WatchList};
use crate::error::{Computed, FailureKind};
use crate::store::{load_json, ArtifactStore};
use crate::types::{Growth, RawObservation, Regime, SourceKind, VelocityMetric};

/// Momentum blend weights. They sum to exactly 1.0.
pub const STARS_WEIGHT: f64 = 0.5;
pub const FORKS_WEIGHT: f64 = 0.3;
pub const WATCHERS_WEIGHT: f64 = 0.2;

/// Latest raw repository values carried alongside the velocities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestGithubValues {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

/// Per-field repository velocities plus the blended momentum score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubVelocity {
    pub stars: VelocityMetric,
    pub forks: VelocityMetric,
    pub watchers: VelocityMetric,
    pub open_issues: VelocityMetric,
    pub momentum_score: f64,
    pub time_period_days: f64,
    pub latest_values: LatestGithubValues,
}

/// Monthly-download velocity for one package registry. Registries are never
/// blended with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryVelocity {
    pub monthly_downloads: VelocityMetric,
    pub latest_monthly_downloads: u64,
    pub previous_monthly_downloads: u64,
    pub time_period_days: f64,
}

/// Velocity results for one technology, one entry per applicable source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyVelocity {
    pub technology: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<Computed<GithubVelocity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<Computed<RegistryVelocity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi: Option<Computed<RegistryVelocity>>,
}

impl TechnologyVelocity {
    pub fn registry(&self, kind: SourceKind) -> Option<&Computed<RegistryVelocity>> {
        match kind {
            SourceKind::Npm => self.npm.as_ref(),
            SourceKind::Pypi => self.pypi.as_ref(),
            SourceKind::Github => None,
        }
    }

    /// Momentum score when the repository velocity computed successfully.
    pub fn momentum(&self) -> Option<f64> {
        self.github
            .as_ref()
            .and_then(Computed::as_ready)
            .map(|g| g.momentum_score)
    }
}

/// Velocity report for one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityReport {
    pub list_name: String,
    pub calculated_at: DateTime<Utc>,
    pub total_technologies: usize,
    pub velocities: Vec<TechnologyVelocity>,
}

/// Growth between two values over an elapsed period.
///
/// From-zero emergence yields the `Growth::Emerged` sentinel with anomaly
/// judged against the absolute spike floor; otherwise the raw rate is
/// normalized to a 30-day basis and classified into one of the five regime
/// bands.
pub fn simple_velocity(
    current: f64,
    previous: f64,
    time_delta_days: f64,
    spike_threshold: f64,
    emergence_spike_floor: f64,
) -> VelocityMetric {
    if previous == 0.0 {
        if current > 0.0 {
            return VelocityMetric {
                growth_percentage: Growth::Emerged,
                absolute_change: current,
                regime: Regime::NewEmergence,
                is_anomaly: current > emergence_spike_floor,
                time_delta_days,
            };
        }
        return VelocityMetric {
            growth_percentage: Growth::Finite(0.0),
            absolute_change: 0.0,
            regime: Regime::NoActivity,
            is_anomaly: false,
            time_delta_days,
        };
    }

    let absolute_change = current - previous;
    let raw_rate = absolute_change / previous;
    let monthly_rate = raw_rate * (30.0 / time_delta_days);
    let monthly_percentage = monthly_rate * 100.0;

    VelocityMetric {
        growth_percentage: Growth::Finite(monthly_percentage),
        absolute_change,
        regime: Regime::classify(monthly_percentage),
        is_anomaly: monthly_rate.abs() > spike_threshold,
        time_delta_days,
    }
}

/// Weighted momentum blend over repository growth percentages, with the
/// unbounded emergence sentinel clamped to 100 so the score stays finite
/// and sortable.
pub fn momentum_score(stars: Growth, forks: Growth, watchers: Growth) -> f64 {
    stars.clamped_percentage() * STARS_WEIGHT
        + forks.clamped_percentage() * FORKS_WEIGHT
        + watchers.clamped_percentage() * WATCHERS_WEIGHT
}

/// The two snapshot endpoints a velocity computation runs over.
enum SourceWindow {
    Ready {
        earliest: Vec<RawObservation>,
        latest: Vec<RawObservation>,
    },
    Unavailable(FailureKind),
}

/// Calculates adoption velocity and momentum metrics.
pub struct VelocityEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> VelocityEngine<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compute velocity reports for every configured list, in order.
    pub fn analyze_all(&self) -> Vec<VelocityReport> {
        self.config
            .lists
            .iter()
            .map(|list| self.analyze_list(list))
            .collect()
    }

    /// Compute per-technology, per-source velocities for one list, with the
    /// lookback window anchored at the current time.
    pub fn analyze_list(&self, list: &WatchList) -> VelocityReport {
        self.analyze_list_at(list, Utc::now())
    }

    /// Same as [`analyze_list`](Self::analyze_list) with an explicit window
    /// anchor, for deterministic replay over a fixed snapshot set.
    pub fn analyze_list_at(&self, list: &WatchList, now: DateTime<Utc>) -> VelocityReport {
        let store = ArtifactStore::new(self.config.raw_dir(&list.key));

        let github_window = self.load_window(&store, SourceKind::Github, now);
        let npm_window = self.load_window(&store, SourceKind::Npm, now);
        let pypi_window = self.load_window(&store, SourceKind::Pypi, now);

        let mut velocities = Vec::with_capacity(list.technologies.len());
        for tech in &list.technologies {
            let github = tech
                .applies_to(SourceKind::Github)
                .then(|| self.github_velocity(&github_window, &tech.name));
            let npm = tech
                .applies_to(SourceKind::Npm)
                .then(|| self.registry_velocity(&npm_window, SourceKind::Npm, &tech.name));
            let pypi = tech
                .applies_to(SourceKind::Pypi)
                .then(|| self.registry_velocity(&pypi_window, SourceKind::Pypi, &tech.name));

            if let Some(Computed::Ready(g)) = &github {
                info!(
                    technology = %tech.name,
                    momentum = format!("{:.1}", g.momentum_score),
                    "repository momentum computed"
                );
            }

            velocities.push(TechnologyVelocity {
                technology: tech.name.clone(),
                category: tech.category.clone(),
                github,
                npm,
                pypi,
            });
        }

        VelocityReport {
            list_name: list.key.clone(),
            calculated_at: now,
            total_technologies: velocities.len(),
            velocities,
        }
    }

    /// Load the earliest and latest qualifying snapshots for one source.
    fn load_window(
        &self,
        store: &ArtifactStore,
        kind: SourceKind,
        now: DateTime<Utc>,
    ) -> SourceWindow {
        let files = store.history(kind.as_str(), self.config.thresholds.lookback_days, now);
        if files.len() < 2 {
            return SourceWindow::Unavailable(FailureKind::InsufficientData);
        }
        let earliest_path = &files[0];
        let latest_path = &files[files.len() - 1];

        let earliest = match load_json::<Vec<RawObservation>>(earliest_path) {
            Ok(obs) => obs,
            Err(err) => {
                warn!(path = %earliest_path.display(), error = %err, "unreadable snapshot");
                return SourceWindow::Unavailable(FailureKind::FileLoadError);
            }
        };
        let latest = match load_json::<Vec<RawObservation>>(latest_path) {
            Ok(obs) => obs,
            Err(err) => {
                warn!(path = %latest_path.display(), error = %err, "unreadable snapshot");
                return SourceWindow::Unavailable(FailureKind::FileLoadError);
            }
        };
        SourceWindow::Ready { earliest, latest }
    }

    /// Locate one technology's endpoint observations and their elapsed days.
    fn endpoints<'w>(
        &self,
        window: &'w SourceWindow,
        tech_name: &str,
    ) -> Result<(&'w RawObservation, &'w RawObservation, f64), FailureKind> {
        let (earliest, latest) = match window {
            SourceWindow::Ready { earliest, latest } => (earliest, latest),
            SourceWindow::Unavailable(kind) => return Err(*kind),
        };

        let previous = earliest
            .iter()
            .find(|o| o.technology == tech_name)
            .ok_or(FailureKind::TechnologyNotFound)?;
        let current = latest
            .iter()
            .find(|o| o.technology == tech_name)
            .ok_or(FailureKind::TechnologyNotFound)?;

        if previous.is_errored() || current.is_errored() {
            return Err(FailureKind::DataCollectionError);
        }

        let previous_at = collection_time(previous).ok_or(FailureKind::FileLoadError)?;
        let current_at = collection_time(current).ok_or(FailureKind::FileLoadError)?;
        let elapsed_days = (current_at - previous_at).num_seconds() as f64 / 86_400.0;

        if elapsed_days < 1.0 {
            return Err(FailureKind::InsufficientTimeDelta);
        }
        Ok((previous, current, elapsed_days))
    }

    fn github_velocity(&self, window: &SourceWindow, tech_name: &str) -> Computed<GithubVelocity> {
        let (previous, current, elapsed_days) = match self.endpoints(window, tech_name) {
            Ok(endpoints) => endpoints,
            Err(kind) => return Computed::failed(kind),
        };

        let t = &self.config.thresholds;
        let field = |key: &str| {
            simple_velocity(
                current.count(key) as f64,
                previous.count(key) as f64,
                elapsed_days,
                t.velocity_spike,
                t.emergence_spike_floor,
            )
        };

        let stars = field("stars");
        let forks = field("forks");
        let watchers = field("watchers");
        let open_issues = field("open_issues");

        let momentum = momentum_score(
            stars.growth_percentage,
            forks.growth_percentage,
            watchers.growth_percentage,
        );

        Computed::Ready(GithubVelocity {
            momentum_score: momentum,
            time_period_days: elapsed_days,
            latest_values: LatestGithubValues {
                stars: current.count("stars"),
                forks: current.count("forks"),
                watchers: current.count("watchers"),
            },
            stars,
            forks,
            watchers,
            open_issues,
        })
    }

    fn registry_velocity(
        &self,
        window: &SourceWindow,
        kind: SourceKind,
        tech_name: &str,
    ) -> Computed<RegistryVelocity> {
        let (previous, current, elapsed_days) = match self.endpoints(window, tech_name) {
            Ok(endpoints) => endpoints,
            Err(kind) => return Computed::failed(kind),
        };

        let monthly = |obs: &RawObservation| match kind {
            SourceKind::Npm => obs.count("downloads_last_month"),
            SourceKind::Pypi => obs.nested_count("downloads_recent", "last_month"),
            SourceKind::Github => 0,
        };

        let current_monthly = monthly(current);
        let previous_monthly = monthly(previous);
        let t = &self.config.thresholds;

        Computed::Ready(RegistryVelocity {
            monthly_downloads: simple_velocity(
                current_monthly as f64,
                previous_monthly as f64,
                elapsed_days,
                t.velocity_spike,
                t.emergence_spike_floor,
            ),
            latest_monthly_downloads: current_monthly,
            previous_monthly_downloads: previous_monthly,
            time_period_days: elapsed_days,
        })
    }
}

/// Parse an embedded collection timestamp. Accepts RFC 3339 and naive
/// ISO-8601 (assumed UTC), matching what the collectors write.
fn collection_time(obs: &RawObservation) -> Option<DateTime<Utc>> {
    let raw = obs.collected_at.as_deref()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SPIKE: f64 = 5.0;
    const EMERGENCE_FLOOR: f64 = 10_000.0;

    fn velocity(current: f64, previous: f64, days: f64) -> VelocityMetric {
        simple_velocity(current, previous, days, SPIKE, EMERGENCE_FLOOR)
    }

    #[test]
    fn test_momentum_weights_sum_to_one() {
        assert_eq!(STARS_WEIGHT + FORKS_WEIGHT + WATCHERS_WEIGHT, 1.0);
    }

    #[test]
    fn test_emergence_below_floor_is_not_anomalous() {
        let metric = velocity(5_000.0, 0.0, 30.0);
        assert_eq!(metric.regime, Regime::NewEmergence);
        assert_eq!(metric.growth_percentage, Growth::Emerged);
        assert!(!metric.is_anomaly);
        assert_eq!(metric.absolute_change, 5_000.0);
    }

    #[test]
    fn test_emergence_above_floor_is_anomalous() {
        let metric = velocity(20_000.0, 0.0, 30.0);
        assert_eq!(metric.regime, Regime::NewEmergence);
        assert!(metric.is_anomaly);
    }

    #[test]
    fn test_zero_to_zero_is_no_activity() {
        let metric = velocity(0.0, 0.0, 30.0);
        assert_eq!(metric.regime, Regime::NoActivity);
        assert_eq!(metric.growth_percentage, Growth::Finite(0.0));
        assert!(!metric.is_anomaly);
    }

    #[test]
    fn test_sixty_percent_monthly_growth_is_accelerating() {
        // 1000 -> 1600 over 30 days: 60% monthly growth.
        let metric = velocity(1_600.0, 1_000.0, 30.0);
        assert_eq!(metric.growth_percentage, Growth::Finite(60.0));
        assert_eq!(metric.regime, Regime::Accelerating);
        assert!(!metric.is_anomaly);
    }

    #[test]
    fn test_rate_normalizes_to_monthly_basis() {
        // 10% over 15 days doubles to 20% monthly: growing.
        let metric = velocity(1_100.0, 1_000.0, 15.0);
        let pct = metric.growth_percentage.finite().unwrap();
        assert!((pct - 20.0).abs() < 1e-9);
        assert_eq!(metric.regime, Regime::Growing);
    }

    #[test]
    fn test_spike_threshold_flags_anomaly() {
        // 1 -> 100 over 30 days: 9900% monthly, far past the 500% spike.
        let metric = velocity(100.0, 1.0, 30.0);
        assert!(metric.is_anomaly);
        assert_eq!(metric.regime, Regime::Accelerating);
    }

    #[test]
    fn test_negative_growth_classifies_decline() {
        let metric = velocity(700.0, 1_000.0, 30.0);
        assert_eq!(metric.growth_percentage, Growth::Finite(-30.0));
        assert_eq!(metric.regime, Regime::Declining);

        let metric = velocity(300.0, 1_000.0, 30.0);
        assert_eq!(metric.regime, Regime::Collapsing);
    }

    #[test]
    fn test_momentum_clamps_emergence_before_weighting() {
        let score = momentum_score(Growth::Emerged, Growth::Finite(10.0), Growth::Finite(20.0));
        assert_eq!(score, 100.0 * 0.5 + 10.0 * 0.3 + 20.0 * 0.2);
        assert!(score.is_finite());
    }

    #[test]
    fn test_collection_time_accepts_rfc3339_and_naive() {
        let rfc: RawObservation = serde_json::from_value(serde_json::json!({
            "technology": "x", "collected_at": "2026-08-30T06:00:00Z",
        }))
        .unwrap();
        assert!(collection_time(&rfc).is_some());

        let naive: RawObservation = serde_json::from_value(serde_json::json!({
            "technology": "x", "collected_at": "2026-08-30T06:00:00.123456",
        }))
        .unwrap();
        assert!(collection_time(&naive).is_some());

        let missing: RawObservation =
            serde_json::from_value(serde_json::json!({"technology": "x"})).unwrap();
        assert!(collection_time(&missing).is_none());
    }

    mod engine {
        use super::*;
        use crate::config::{AnalysisConfig, TechnologySpec, WatchList};
        use pretty_assertions::assert_eq;
        use chrono::TimeZone;
        use tempfile::TempDir;

        fn fixture_config(dir: &TempDir) -> AnalysisConfig {
            let mut config = AnalysisConfig::default();
            config.data_dir = dir.path().to_path_buf();
            // Wide enough that a full calendar month of fixtures qualifies.
            config.thresholds.lookback_days = 45;
            config.lists = vec![WatchList {
                key: "pilot".to_string(),
                name: "Pilot".to_string(),
                description: String::new(),
                focus: String::new(),
                technologies: vec![TechnologySpec {
                    name: "qdrant".to_string(),
                    display_name: "Qdrant".to_string(),
                    category: "vector_db".to_string(),
                    github: Some("qdrant/qdrant".to_string()),
                    npm: None,
                    pypi: Some("qdrant-client".to_string()),
                }],
            }];
            config
        }

        fn seed(store: &ArtifactStore, source: &str, day: u32, body: serde_json::Value) {
            let stamp = Utc.with_ymd_and_hms(2026, 8, day, 6, 0, 0).unwrap();
            store.write_at(source, &body, stamp).unwrap();
        }

        #[test]
        fn test_engine_computes_per_source_velocities() {
            let dir = TempDir::new().unwrap();
            let config = fixture_config(&dir);
            let store = ArtifactStore::new(config.raw_dir("pilot"));

            seed(
                &store,
                "github",
                1,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-01T06:00:00Z",
                    "stars": 1000, "forks": 100, "watchers": 50, "open_issues": 10,
                }]),
            );
            seed(
                &store,
                "github",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "stars": 1600, "forks": 130, "watchers": 60, "open_issues": 12,
                }]),
            );
            seed(
                &store,
                "pypi",
                1,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-01T06:00:00Z",
                    "downloads_recent": {"last_month": 100_000},
                }]),
            );
            seed(
                &store,
                "pypi",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "downloads_recent": {"last_month": 150_000},
                }]),
            );

            let engine = VelocityEngine::new(&config);
            let now = Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap();
            let report = engine.analyze_list_at(&config.lists[0], now);
            assert_eq!(report.total_technologies, 1);

            let tech = &report.velocities[0];
            let github = tech.github.as_ref().unwrap().as_ready().unwrap();
            assert_eq!(github.stars.growth_percentage, Growth::Finite(60.0));
            assert_eq!(github.stars.regime, Regime::Accelerating);
            assert_eq!(github.latest_values.stars, 1600);
            // 60*0.5 + 30*0.3 + 20*0.2 = 43
            assert!((github.momentum_score - 43.0).abs() < 1e-9);

            // npm is not applicable for this technology.
            assert!(tech.npm.is_none());

            let pypi = tech.pypi.as_ref().unwrap().as_ready().unwrap();
            assert_eq!(pypi.latest_monthly_downloads, 150_000);
            assert_eq!(
                pypi.monthly_downloads.growth_percentage,
                Growth::Finite(50.0)
            );
        }

        #[test]
        fn test_single_snapshot_is_insufficient_data() {
            let dir = TempDir::new().unwrap();
            let config = fixture_config(&dir);
            let store = ArtifactStore::new(config.raw_dir("pilot"));
            seed(
                &store,
                "github",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "stars": 1600,
                }]),
            );

            let engine = VelocityEngine::new(&config);
            let now = Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap();
            let report = engine.analyze_list_at(&config.lists[0], now);
            let github = report.velocities[0].github.as_ref().unwrap();
            assert_eq!(github.failure(), Some(FailureKind::InsufficientData));
        }

        #[test]
        fn test_close_snapshots_are_insufficient_time_delta() {
            let dir = TempDir::new().unwrap();
            let config = fixture_config(&dir);
            let store = ArtifactStore::new(config.raw_dir("pilot"));

            // Two files a day apart by filename but collected two hours
            // apart: the embedded timestamps decide.
            seed(
                &store,
                "github",
                30,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T04:00:00Z",
                    "stars": 1000,
                }]),
            );
            seed(
                &store,
                "github",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "stars": 1010,
                }]),
            );

            let engine = VelocityEngine::new(&config);
            let now = Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap();
            let report = engine.analyze_list_at(&config.lists[0], now);
            let github = report.velocities[0].github.as_ref().unwrap();
            assert_eq!(github.failure(), Some(FailureKind::InsufficientTimeDelta));
        }

        #[test]
        fn test_missing_technology_and_error_marker_failures() {
            let dir = TempDir::new().unwrap();
            let config = fixture_config(&dir);
            let store = ArtifactStore::new(config.raw_dir("pilot"));

            seed(
                &store,
                "pypi",
                1,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-01T06:00:00Z",
                    "error": "package not found",
                }]),
            );
            seed(
                &store,
                "pypi",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "downloads_recent": {"last_month": 1000},
                }]),
            );
            seed(&store, "github", 1, serde_json::json!([]));
            seed(
                &store,
                "github",
                31,
                serde_json::json!([{
                    "technology": "qdrant",
                    "collected_at": "2026-08-31T06:00:00Z",
                    "stars": 10,
                }]),
            );

            let engine = VelocityEngine::new(&config);
            let now = Utc.with_ymd_and_hms(2026, 8, 31, 12, 0, 0).unwrap();
            let report = engine.analyze_list_at(&config.lists[0], now);
            let tech = &report.velocities[0];
            assert_eq!(
                tech.pypi.as_ref().unwrap().failure(),
                Some(FailureKind::DataCollectionError)
            );
            assert_eq!(
                tech.github.as_ref().unwrap().failure(),
                Some(FailureKind::TechnologyNotFound)
            );
        }
    }
}
