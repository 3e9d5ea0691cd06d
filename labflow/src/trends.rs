//! Biomarker trends over a client's stored analyses.
//!
//! Every analysis contributes at most one point per biomarker. Points are grouped on
//! [`biomarker_key`] so that "Vitamin D" and "vitamin  d" land in the same series, ordered by
//! lab test date (falling back to the upload date), and summarised into a [`BiomarkerTrend`].
//! The most frequently measured biomarkers are displayed; the rest are only listed by name.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use utoipa::ToSchema;

use crate::db::models::{analyses::AnalysisDBResponse, custom_benchmarks::CustomBenchmarkDBResponse};
use crate::types::{AnalysisId, ClientId};

/// Below this absolute percent change a series is reported as stable.
const STABLE_THRESHOLD_PERCENT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendPoint {
    #[schema(value_type = String, format = "uuid")]
    pub analysis_id: AnalysisId,
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

/// Where the latest value sits relative to the user's optimal range for the biomarker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    BelowOptimal,
    Optimal,
    AboveOptimal,
    /// No benchmark, or a benchmark without bounds
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BiomarkerTrend {
    /// Display name, taken from the latest measurement
    pub name: String,
    pub unit: Option<String>,
    pub points: Vec<TrendPoint>,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub first: f64,
    pub percent_change: Option<f64>,
    pub direction: Option<Direction>,
    pub status: RangeStatus,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendReport {
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    pub analysis_count: usize,
    /// The displayed series, most measured first
    pub biomarkers: Vec<BiomarkerTrend>,
    /// Names of the series that did not make the display cut
    pub other_biomarkers: Vec<String>,
}

/// Grouping key for a biomarker name: trimmed, lowercased, internal whitespace collapsed.
pub fn biomarker_key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `(latest - first) / |first| * 100`, undefined for a single point or a zero baseline.
pub fn percent_change(first: f64, latest: f64, count: usize) -> Option<f64> {
    if count < 2 || first == 0.0 {
        return None;
    }
    Some((latest - first) / first.abs() * 100.0)
}

fn direction(percent_change: f64) -> Direction {
    if percent_change.abs() < STABLE_THRESHOLD_PERCENT {
        Direction::Stable
    } else if percent_change > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    }
}

fn range_status(value: f64, benchmark: Option<&CustomBenchmarkDBResponse>) -> RangeStatus {
    let Some(benchmark) = benchmark else {
        return RangeStatus::Unknown;
    };
    match (benchmark.optimal_min, benchmark.optimal_max) {
        (None, None) => RangeStatus::Unknown,
        (Some(min), _) if value < min => RangeStatus::BelowOptimal,
        (_, Some(max)) if value > max => RangeStatus::AboveOptimal,
        _ => RangeStatus::Optimal,
    }
}

struct Series {
    name: String,
    unit: Option<String>,
    points: Vec<TrendPoint>,
}

/// Build the trend report for one client.
pub fn compute_trends(
    client_id: ClientId,
    analyses: &[AnalysisDBResponse],
    benchmarks: &[CustomBenchmarkDBResponse],
    max_display: usize,
) -> TrendReport {
    let mut ordered: Vec<&AnalysisDBResponse> = analyses.iter().collect();
    ordered.sort_by_key(|a| (a.lab_test_date.unwrap_or_else(|| a.created_at.date_naive()), a.created_at));

    // BTreeMap keeps the grouping pass deterministic before the final sort
    let mut series: BTreeMap<String, Series> = BTreeMap::new();
    for analysis in ordered {
        let date = analysis.lab_test_date.unwrap_or_else(|| analysis.created_at.date_naive());
        let mut seen = HashSet::new();

        for biomarker in &analysis.biomarkers {
            if !biomarker.value.is_finite() {
                continue;
            }
            let key = biomarker_key(&biomarker.name);
            if key.is_empty() || !seen.insert(key.clone()) {
                continue;
            }

            let entry = series.entry(key).or_insert_with(|| Series {
                name: String::new(),
                unit: None,
                points: Vec::new(),
            });
            entry.name = biomarker.name.trim().to_string();
            entry.unit = biomarker.unit.clone();
            entry.points.push(TrendPoint {
                analysis_id: analysis.id,
                date,
                value: biomarker.value,
            });
        }
    }

    let benchmarks_by_key: HashMap<String, &CustomBenchmarkDBResponse> =
        benchmarks.iter().map(|b| (biomarker_key(&b.biomarker_name), b)).collect();

    let mut trends: Vec<BiomarkerTrend> = series
        .into_iter()
        .filter_map(|(key, s)| {
            let first = s.points.first()?.value;
            let latest = s.points.last()?.value;
            let min = s.points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
            let max = s.points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
            let count = s.points.len();
            let change = percent_change(first, latest, count);
            let benchmark = benchmarks_by_key.get(&key).copied();

            Some(BiomarkerTrend {
                name: s.name,
                unit: s.unit,
                count,
                min,
                max,
                latest,
                first,
                percent_change: change,
                direction: change.map(direction),
                status: range_status(latest, benchmark),
                optimal_min: benchmark.and_then(|b| b.optimal_min),
                optimal_max: benchmark.and_then(|b| b.optimal_max),
                points: s.points,
            })
        })
        .collect();

    trends.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    let hidden = if trends.len() > max_display {
        trends.split_off(max_display)
    } else {
        Vec::new()
    };
    let mut other_biomarkers: Vec<String> = hidden.into_iter().map(|t| t.name).collect();
    other_biomarkers.sort();

    TrendReport {
        client_id,
        analysis_count: analyses.len(),
        biomarkers: trends,
        other_biomarkers,
    }
}
