use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One row of the class directory document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntry {
    pub file_name: String,
    pub display_text: String,
    #[serde(default)]
    pub id_prefix: String,
}

impl ClassEntry {
    pub fn owns_test(&self, test_class: &str) -> bool {
        self.display_text.trim().eq_ignore_ascii_case(test_class.trim())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    #[serde(default, alias = "father_name")]
    pub father_name: String,
    #[serde(default, alias = "mother_name")]
    pub mother_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(alias = "student_id")]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "class")]
    pub class_name: String,
    #[serde(default, alias = "parents")]
    pub guardian: Guardian,
    #[serde(default)]
    pub contact: Contact,
}

/// Test directory row as stored on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDirectoryEntry {
    pub class: String,
    pub test_name: String,
    #[serde(default)]
    pub test_type: String,
    pub date: NaiveDate,
    pub marks_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDescriptor {
    pub test_name: String,
    pub test_type: String,
    pub date: NaiveDate,
    pub class_name: String,
    pub marks_file: String,
}

impl From<TestDirectoryEntry> for TestDescriptor {
    fn from(e: TestDirectoryEntry) -> Self {
        Self {
            test_name: e.test_name,
            test_type: e.test_type,
            date: e.date,
            class_name: e.class,
            marks_file: e.marks_file,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSheetDoc {
    pub test_info: TestInfoDoc,
    pub results: Vec<ResultDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestInfoDoc {
    pub subjects: Vec<String>,
    pub maxmarks: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDoc {
    pub student_id: String,
    #[serde(default)]
    pub scores: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMax {
    pub subject: String,
    pub max_marks: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentResult {
    pub student_id: String,
    pub scores: BTreeMap<String, f64>,
}

/// A validated mark sheet: subjects zipped with their maximum marks.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkSheet {
    pub subjects: Vec<SubjectMax>,
    pub results: Vec<StudentResult>,
}

impl MarkSheet {
    pub fn from_doc(doc: MarkSheetDoc) -> Result<Self, String> {
        let info = doc.test_info;
        if info.subjects.len() != info.maxmarks.len() {
            return Err(format!(
                "testInfo.subjects has {} entries but testInfo.maxmarks has {}",
                info.subjects.len(),
                info.maxmarks.len()
            ));
        }

        let mut seen = HashSet::new();
        let mut subjects = Vec::with_capacity(info.subjects.len());
        for (subject, max) in info.subjects.into_iter().zip(info.maxmarks) {
            let name = subject.trim().to_string();
            if name.is_empty() {
                return Err("testInfo.subjects contains an empty subject".to_string());
            }
            if !seen.insert(name.clone()) {
                return Err(format!("testInfo.subjects lists {name} twice"));
            }
            subjects.push(SubjectMax {
                subject: name,
                max_marks: max.unwrap_or(0.0),
            });
        }

        let mut results = Vec::with_capacity(doc.results.len());
        for r in doc.results {
            let mut scores = BTreeMap::new();
            for (key, value) in r.scores {
                let subject = key.trim().to_string();
                if scores.insert(subject.clone(), value.unwrap_or(0.0)).is_some() {
                    return Err(format!("result {} lists {subject} twice", r.student_id));
                }
            }
            results.push(StudentResult {
                student_id: r.student_id,
                scores,
            });
        }

        Ok(Self { subjects, results })
    }

    pub fn result_for(&self, student_id: &str) -> Option<&StudentResult> {
        self.results.iter().find(|r| r.student_id == student_id)
    }
}

/// A mark sheet paired with the directory row that named it.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSheet {
    pub test: TestDescriptor,
    pub sheet: MarkSheet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub student_id: String,
    #[serde(default)]
    pub note_type: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub note_text: String,
}
