use serde::Serialize;
use std::cmp::Ordering;

use crate::calc::{percent, round_off_2_decimals, StudentTotals};

pub const DEFAULT_RANKING_SIZE: usize = 3;
pub const EXCELLENT_THRESHOLD: f64 = 75.0;
pub const GOOD_THRESHOLD: f64 = 50.0;
pub const HARDEST_SUBJECT_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    Excellent,
    Good,
    NeedsImprovement,
}

impl Band {
    pub fn classify(percentage: f64) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            Band::Excellent
        } else if percentage >= GOOD_THRESHOLD {
            Band::Good
        } else {
            Band::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::Excellent => "Excellent (>75%)",
            Band::Good => "Good (50-75%)",
            Band::NeedsImprovement => "Needs Improvement (<50%)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub student_id: String,
    pub name: String,
    pub percentage: f64,
}

impl RankedEntry {
    fn from_totals(t: &StudentTotals) -> Self {
        Self {
            student_id: t.student_id.clone(),
            name: t.name.clone(),
            percentage: round_off_2_decimals(t.percentage()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub top: Vec<RankedEntry>,
    pub bottom: Vec<RankedEntry>,
}

/// Ranks by total obtained marks. Bottom is the tail of the same ordering,
/// so the two cohorts never share a student while the roster holds 2n.
pub fn rank(totals: &[StudentTotals], n: usize) -> Rankings {
    let mut ranked: Vec<&StudentTotals> = totals.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_obtained
            .partial_cmp(&a.total_obtained)
            .unwrap_or(Ordering::Equal)
    });
    let top = ranked
        .iter()
        .take(n)
        .map(|t| RankedEntry::from_totals(t))
        .collect();
    let bottom = ranked
        .iter()
        .rev()
        .take(n)
        .map(|t| RankedEntry::from_totals(t))
        .collect();
    Rankings { top, bottom }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
    pub student_count: usize,
    pub band: Band,
    pub hardest: bool,
}

/// Mean subject percentage across students who had marks available in it.
pub fn subject_averages(totals: &[StudentTotals]) -> Vec<SubjectAverage> {
    let mut acc: Vec<(String, f64, usize)> = Vec::new();
    for t in totals {
        for s in &t.subjects {
            if s.max <= 0.0 {
                continue;
            }
            let p = percent(s.obtained, s.max);
            match acc.iter_mut().find(|(name, _, _)| *name == s.subject) {
                Some(entry) => {
                    entry.1 += p;
                    entry.2 += 1;
                }
                None => acc.push((s.subject.clone(), p, 1)),
            }
        }
    }
    acc.into_iter()
        .map(|(subject, sum, count)| {
            let average = round_off_2_decimals(sum / count as f64);
            SubjectAverage {
                subject,
                average,
                student_count: count,
                band: Band::classify(average),
                hardest: average < HARDEST_SUBJECT_THRESHOLD,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub excellent: usize,
    pub good: usize,
    pub needs_improvement: usize,
}

pub fn distribution(totals: &[StudentTotals]) -> Distribution {
    let mut d = Distribution::default();
    for t in totals {
        match Band::classify(t.percentage()) {
            Band::Excellent => d.excellent += 1,
            Band::Good => d.good += 1,
            Band::NeedsImprovement => d.needs_improvement += 1,
        }
    }
    d
}

pub fn class_average(totals: &[StudentTotals]) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }
    let sum: f64 = totals.iter().map(|t| t.percentage()).sum();
    round_off_2_decimals(sum / totals.len() as f64)
}
