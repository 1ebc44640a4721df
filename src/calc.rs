use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::{ClassEntry, Student, SubjectMax, TestDescriptor, TestSheet};

/// Half-up rounding to one decimal: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Percentage of `obtained` over `max`; 0 when there is nothing to divide by.
pub fn percent(obtained: f64, max: f64) -> f64 {
    if max > 0.0 && obtained.is_finite() {
        100.0 * obtained / max
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFilters {
    pub test_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TestFilters {
    pub fn matches(&self, test: &TestDescriptor) -> bool {
        let type_ok = self
            .test_type
            .as_ref()
            .map(|t| test.test_type.trim().eq_ignore_ascii_case(t))
            .unwrap_or(true);
        let from_ok = self.from.map(|d| test.date >= d).unwrap_or(true);
        let to_ok = self.to.map(|d| test.date <= d).unwrap_or(true);
        type_ok && from_ok && to_ok
    }
}

fn parse_filter_date(v: Option<&serde_json::Value>, key: &str) -> Result<Option<NaiveDate>, CalcError> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(|s| s.trim().parse::<NaiveDate>().ok())
            .map(Some)
            .ok_or_else(|| {
                CalcError::new(
                    "bad_params",
                    format!("filters.{key} must be a YYYY-MM-DD date"),
                )
            }),
    }
}

pub fn parse_test_filters(raw: Option<&serde_json::Value>) -> Result<TestFilters, CalcError> {
    let Some(raw) = raw else {
        return Ok(TestFilters::default());
    };
    if raw.is_null() {
        return Ok(TestFilters::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "filters must be an object"));
    };

    let test_type = match obj.get("testType") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(CalcError::new(
                    "bad_params",
                    "filters.testType must be string or null",
                ));
            };
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("ALL") {
                None
            } else {
                Some(t.to_string())
            }
        }
    };
    let from = parse_filter_date(obj.get("from"), "from")?;
    let to = parse_filter_date(obj.get("to"), "to")?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(CalcError::new("bad_params", "filters.from is after filters.to"));
        }
    }

    Ok(TestFilters {
        test_type,
        from,
        to,
    })
}

/// The class's tests that pass `filters`, oldest first.
pub fn select_tests(
    class: &ClassEntry,
    tests: &[TestDescriptor],
    filters: &TestFilters,
) -> Vec<TestDescriptor> {
    let mut out: Vec<TestDescriptor> = tests
        .iter()
        .filter(|t| class.owns_test(&t.class_name) && filters.matches(t))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub test: TestDescriptor,
    pub scores: BTreeMap<String, f64>,
    pub max_marks: Vec<SubjectMax>,
}

impl PerformanceRecord {
    pub fn score(&self, subject: &str) -> Option<f64> {
        self.scores.get(subject).copied()
    }

    pub fn total_obtained(&self) -> f64 {
        self.max_marks
            .iter()
            .map(|m| self.score(&m.subject).unwrap_or(0.0))
            .sum()
    }

    pub fn total_max(&self) -> f64 {
        self.max_marks.iter().map(|m| m.max_marks).sum()
    }

    pub fn percentage(&self) -> f64 {
        percent(self.total_obtained(), self.total_max())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTotal {
    pub subject: String,
    pub obtained: f64,
    pub max: f64,
    pub count: usize,
}

impl SubjectTotal {
    pub fn percentage(&self) -> f64 {
        percent(self.obtained, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTotals {
    pub student_id: String,
    pub name: String,
    pub subjects: Vec<SubjectTotal>,
    pub total_obtained: f64,
    pub total_max: f64,
    pub tests_taken: usize,
}

impl StudentTotals {
    pub fn percentage(&self) -> f64 {
        percent(self.total_obtained, self.total_max)
    }
}

/// One student's records, oldest test first. Tests without a result are skipped.
pub fn student_records(student_id: &str, sheets: &[TestSheet]) -> Vec<PerformanceRecord> {
    let mut records: Vec<PerformanceRecord> = sheets
        .iter()
        .filter_map(|ts| {
            let result = ts.sheet.result_for(student_id)?;
            Some(PerformanceRecord {
                test: ts.test.clone(),
                scores: result.scores.clone(),
                max_marks: ts.sheet.subjects.clone(),
            })
        })
        .collect();
    records.sort_by(|a, b| a.test.date.cmp(&b.test.date));
    records
}

/// Running per-subject totals in first-appearance order.
#[derive(Debug, Default)]
struct SubjectAccumulator {
    order: Vec<SubjectTotal>,
    index: HashMap<String, usize>,
}

impl SubjectAccumulator {
    fn add(&mut self, subject: &str, obtained: f64, max: f64) {
        let idx = match self.index.get(subject) {
            Some(i) => *i,
            None => {
                self.order.push(SubjectTotal {
                    subject: subject.to_string(),
                    obtained: 0.0,
                    max: 0.0,
                    count: 0,
                });
                self.index.insert(subject.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let t = &mut self.order[idx];
        t.obtained += obtained;
        t.max += max;
        t.count += 1;
    }
}

/// Accumulates over the max-marks mapping of each record; absent scores count as 0.
pub fn subject_totals(records: &[PerformanceRecord]) -> Vec<SubjectTotal> {
    let mut acc = SubjectAccumulator::default();
    for r in records {
        for m in &r.max_marks {
            let score = r.score(&m.subject).unwrap_or(0.0);
            acc.add(&m.subject, if score.is_finite() { score } else { 0.0 }, m.max_marks);
        }
    }
    acc.order
}

pub fn totals_for_student(student: &Student, sheets: &[TestSheet]) -> StudentTotals {
    let records = student_records(&student.id, sheets);
    let subjects = subject_totals(&records);
    let total_obtained = subjects.iter().map(|s| s.obtained).sum();
    let total_max = subjects.iter().map(|s| s.max).sum();
    StudentTotals {
        student_id: student.id.clone(),
        name: student.name.clone(),
        subjects,
        total_obtained,
        total_max,
        tests_taken: records.len(),
    }
}

/// Totals for every roster student, in roster order.
pub fn class_totals(roster: &[Student], sheets: &[TestSheet]) -> Vec<StudentTotals> {
    roster
        .iter()
        .map(|s| totals_for_student(s, sheets))
        .collect()
}
