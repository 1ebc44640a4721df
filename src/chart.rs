//! Chart series for the rendering layer. Every value is a percentage so tests
//! and subjects with different maximum marks stay comparable.

use serde::Serialize;

use crate::calc::{round_off_2_decimals, PerformanceRecord, SubjectTotal};
use crate::ranking::{Band, Distribution, SubjectAverage};

pub const COLOR_EXCELLENT: &str = "#9ece6a";
pub const COLOR_GOOD: &str = "#ff9e64";
pub const COLOR_NEEDS_IMPROVEMENT: &str = "#f7768e";
pub const COLOR_GOOD_SLICE: &str = "#4a90e2";
pub const COLOR_SERIES: &str = "#7aa2f7";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Bar,
    Line,
    Doughnut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: String,
    pub data: Vec<Option<f64>>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

pub fn band_color(band: Band) -> &'static str {
    match band {
        Band::Excellent => COLOR_EXCELLENT,
        Band::Good => COLOR_GOOD,
        Band::NeedsImprovement => COLOR_NEEDS_IMPROVEMENT,
    }
}

/// Weakest subject first.
pub fn subject_difficulty(averages: &[SubjectAverage]) -> ChartData {
    let mut sorted: Vec<&SubjectAverage> = averages.iter().collect();
    sorted.sort_by(|a, b| {
        a.average
            .partial_cmp(&b.average)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ChartData {
        kind: ChartKind::Bar,
        labels: sorted.iter().map(|a| a.subject.clone()).collect(),
        series: vec![ChartSeries {
            label: "Average Performance by Subject".to_string(),
            data: sorted.iter().map(|a| Some(a.average)).collect(),
            colors: sorted
                .iter()
                .map(|a| band_color(a.band).to_string())
                .collect(),
        }],
    }
}

pub fn performance_distribution(d: &Distribution) -> ChartData {
    ChartData {
        kind: ChartKind::Doughnut,
        labels: [Band::Excellent, Band::Good, Band::NeedsImprovement]
            .iter()
            .map(|b| b.label().to_string())
            .collect(),
        series: vec![ChartSeries {
            label: "Students".to_string(),
            data: vec![
                Some(d.excellent as f64),
                Some(d.good as f64),
                Some(d.needs_improvement as f64),
            ],
            colors: vec![
                COLOR_EXCELLENT.to_string(),
                COLOR_GOOD_SLICE.to_string(),
                COLOR_NEEDS_IMPROVEMENT.to_string(),
            ],
        }],
    }
}

pub fn student_trend(records: &[PerformanceRecord]) -> ChartData {
    ChartData {
        kind: ChartKind::Line,
        labels: records.iter().map(|r| r.test.test_name.clone()).collect(),
        series: vec![ChartSeries {
            label: "Overall %".to_string(),
            data: records
                .iter()
                .map(|r| Some(round_off_2_decimals(r.percentage())))
                .collect(),
            colors: vec![COLOR_SERIES.to_string()],
        }],
    }
}

/// One series per test over the union of subjects; `None` where a test did not cover the subject.
pub fn subject_comparison(records: &[PerformanceRecord]) -> ChartData {
    let mut labels: Vec<String> = Vec::new();
    for r in records {
        for m in &r.max_marks {
            if !labels.contains(&m.subject) {
                labels.push(m.subject.clone());
            }
        }
    }

    let series = records
        .iter()
        .map(|r| {
            let data = labels
                .iter()
                .map(|subject| {
                    r.max_marks.iter().find(|m| &m.subject == subject).map(|m| {
                        let obtained = r.score(subject).unwrap_or(0.0);
                        round_off_2_decimals(crate::calc::percent(obtained, m.max_marks))
                    })
                })
                .collect();
            ChartSeries {
                label: r.test.test_name.clone(),
                data,
                colors: Vec::new(),
            }
        })
        .collect();

    ChartData {
        kind: ChartKind::Bar,
        labels,
        series,
    }
}

pub fn subject_totals(totals: &[SubjectTotal]) -> ChartData {
    let pcts: Vec<f64> = totals
        .iter()
        .map(|t| round_off_2_decimals(t.percentage()))
        .collect();
    ChartData {
        kind: ChartKind::Bar,
        labels: totals.iter().map(|t| t.subject.clone()).collect(),
        series: vec![ChartSeries {
            label: "Subject %".to_string(),
            colors: pcts
                .iter()
                .map(|p| band_color(Band::classify(*p)).to_string())
                .collect(),
            data: pcts.into_iter().map(Some).collect(),
        }],
    }
}
