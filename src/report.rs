use chrono::NaiveDate;
use serde::Serialize;

use crate::calc::{
    self, percent, round_off_1_decimal, round_off_2_decimals, CalcError, PerformanceRecord,
    SubjectTotal,
};
use crate::chart::{self, ChartData};
use crate::model::{Note, Student, TestSheet};
use crate::ranking::Band;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub subject: String,
    pub obtained: f64,
    pub max: f64,
    pub percentage: f64,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub obtained: f64,
    pub max: f64,
    pub percentage: f64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub test_name: String,
    pub test_type: String,
    pub date: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub overall: ReportSummary,
}

/// Rows follow the mark sheet's subject list, so an unscored subject still shows as 0.
pub fn format_record(record: &PerformanceRecord) -> TestReport {
    let rows: Vec<ReportRow> = record
        .max_marks
        .iter()
        .map(|m| {
            let score = record.score(&m.subject);
            let obtained = score.unwrap_or(0.0);
            ReportRow {
                subject: m.subject.clone(),
                obtained,
                max: m.max_marks,
                percentage: round_off_1_decimal(percent(obtained, m.max_marks)),
                missing: score.is_none(),
            }
        })
        .collect();

    let obtained: f64 = rows.iter().map(|r| r.obtained).sum();
    let max: f64 = rows.iter().map(|r| r.max).sum();
    let pct = percent(obtained, max);
    TestReport {
        test_name: record.test.test_name.clone(),
        test_type: record.test.test_type.clone(),
        date: record.test.date,
        rows,
        overall: ReportSummary {
            obtained,
            max,
            percentage: round_off_1_decimal(pct),
            band: Band::classify(pct),
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCharts {
    pub trend: ChartData,
    pub subject_comparison: ChartData,
    pub subject_totals: ChartData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    pub tests: Vec<TestReport>,
    pub subject_totals: Vec<SubjectTotal>,
    pub overall: ReportSummary,
    pub notes: Vec<Note>,
    pub charts: StudentCharts,
}

pub fn build_student_report(
    roster: &[Student],
    student_id: &str,
    sheets: &[TestSheet],
    notes: &[Note],
) -> Result<StudentReport, CalcError> {
    let Some(student) = roster.iter().find(|s| s.id == student_id) else {
        return Err(CalcError::new(
            "not_found",
            format!("student {student_id} is not on this roster"),
        ));
    };

    let records = calc::student_records(student_id, sheets);
    let totals = calc::subject_totals(&records);
    let obtained: f64 = totals.iter().map(|t| t.obtained).sum();
    let max: f64 = totals.iter().map(|t| t.max).sum();
    let pct = percent(obtained, max);

    Ok(StudentReport {
        student: student.clone(),
        tests: records.iter().map(format_record).collect(),
        overall: ReportSummary {
            obtained,
            max,
            percentage: round_off_2_decimals(pct),
            band: Band::classify(pct),
        },
        notes: notes_for_student(notes, student_id),
        charts: StudentCharts {
            trend: chart::student_trend(&records),
            subject_comparison: chart::subject_comparison(&records),
            subject_totals: chart::subject_totals(&totals),
        },
        subject_totals: totals,
    })
}

/// A student's notes, oldest first.
pub fn notes_for_student(notes: &[Note], student_id: &str) -> Vec<Note> {
    let mut out: Vec<Note> = notes
        .iter()
        .filter(|n| n.student_id == student_id)
        .cloned()
        .collect();
    out.sort_by_key(|n| n.date);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MarkSheet, StudentResult, SubjectMax, TestDescriptor};
    use std::collections::BTreeMap;

    fn record(subjects: &[(&str, f64)], scores: &[(&str, f64)]) -> PerformanceRecord {
        PerformanceRecord {
            test: TestDescriptor {
                test_name: "Unit 1".to_string(),
                test_type: "Unit".to_string(),
                date: "2024-01-10".parse().expect("date"),
                class_name: "Class 10".to_string(),
                marks_file: "unit1.json".to_string(),
            },
            scores: scores
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            max_marks: subjects
                .iter()
                .map(|(s, m)| SubjectMax {
                    subject: s.to_string(),
                    max_marks: *m,
                })
                .collect(),
        }
    }

    #[test]
    fn omitted_subject_still_gets_a_row() {
        let r = format_record(&record(&[("Math", 50.0), ("Sci", 50.0)], &[("Math", 40.0)]));
        assert_eq!(r.rows.len(), 2);
        assert_eq!(r.rows[1].subject, "Sci");
        assert_eq!(r.rows[1].obtained, 0.0);
        assert!(r.rows[1].missing);
        assert!(!r.rows[0].missing);
        assert_eq!(r.rows[0].percentage, 80.0);
        assert_eq!(r.overall.obtained, 40.0);
        assert_eq!(r.overall.max, 100.0);
        assert_eq!(r.overall.percentage, 40.0);
        assert_eq!(r.overall.band, Band::NeedsImprovement);
    }

    #[test]
    fn rows_round_to_one_decimal_and_guard_zero_max() {
        let r = format_record(&record(&[("Math", 30.0), ("Art", 0.0)], &[("Math", 20.0), ("Art", 5.0)]));
        assert_eq!(r.rows[0].percentage, 66.7);
        assert_eq!(r.rows[1].percentage, 0.0);
        assert!(r.overall.percentage.is_finite());
    }

    #[test]
    fn unknown_student_is_not_found() {
        let e = build_student_report(&[], "S9", &[], &[]).unwrap_err();
        assert_eq!(e.code, "not_found");
    }

    #[test]
    fn student_without_results_has_an_empty_report() {
        let roster: Vec<Student> = serde_json::from_value(serde_json::json!([
            { "student_id": "S2", "name": "B" }
        ]))
        .expect("roster");
        let sheets = vec![TestSheet {
            test: record(&[], &[]).test,
            sheet: MarkSheet {
                subjects: vec![SubjectMax {
                    subject: "Math".to_string(),
                    max_marks: 50.0,
                }],
                results: vec![StudentResult {
                    student_id: "S1".to_string(),
                    scores: BTreeMap::new(),
                }],
            },
        }];
        let report = build_student_report(&roster, "S2", &sheets, &[]).expect("report");
        assert!(report.tests.is_empty());
        assert!(report.subject_totals.is_empty());
        assert_eq!(report.overall.percentage, 0.0);
        assert!(report.charts.trend.labels.is_empty());
    }

    #[test]
    fn notes_are_filtered_and_date_ordered() {
        let notes: Vec<Note> = serde_json::from_value(serde_json::json!([
            { "studentId": "S1", "noteType": "Praise", "date": "2024-03-01", "noteText": "b" },
            { "studentId": "S2", "noteType": "Concern", "date": "2024-01-01", "noteText": "x" },
            { "studentId": "S1", "noteType": "Concern", "date": "2024-01-15", "noteText": "a" }
        ]))
        .expect("notes");
        let out = notes_for_student(&notes, "S1");
        let texts: Vec<&str> = out.iter().map(|n| n.note_text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
