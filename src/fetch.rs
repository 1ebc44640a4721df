use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Instant;

use crate::config::DashboardConfig;
use crate::model::{
    ClassEntry, MarkSheet, MarkSheetDoc, Note, Student, TestDescriptor, TestDirectoryEntry,
    TestSheet,
};
use crate::source::DocumentSource;

#[derive(Debug, Clone, Serialize)]
pub struct LoadError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LoadError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn for_document(code: &str, reference: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: Some(serde_json::json!({ "document": reference })),
        }
    }
}

fn fetch_bytes(source: &dyn DocumentSource, reference: &str) -> Result<Vec<u8>, LoadError> {
    source
        .fetch(reference)
        .map_err(|e| LoadError::for_document("fetch_failed", reference, format!("{e:#}")))
}

fn parse_json<T: DeserializeOwned>(reference: &str, bytes: &[u8]) -> Result<T, LoadError> {
    serde_json::from_slice(bytes).map_err(|e| {
        LoadError::for_document("bad_document", reference, format!("{reference}: {e}"))
    })
}

pub fn fetch_json<T: DeserializeOwned>(
    source: &dyn DocumentSource,
    reference: &str,
) -> Result<T, LoadError> {
    let bytes = fetch_bytes(source, reference)?;
    parse_json(reference, &bytes)
}

pub fn load_class_directory(
    source: &dyn DocumentSource,
    cfg: &DashboardConfig,
) -> Result<Vec<ClassEntry>, LoadError> {
    fetch_json(source, &cfg.class_directory)
}

pub fn load_roster(source: &dyn DocumentSource, class_file: &str) -> Result<Vec<Student>, LoadError> {
    let students: Vec<Student> = fetch_json(source, class_file)?;
    let mut seen = HashSet::new();
    for s in &students {
        if !seen.insert(s.id.as_str()) {
            return Err(LoadError::for_document(
                "bad_document",
                class_file,
                format!("{class_file}: student id {} appears twice", s.id),
            ));
        }
    }
    Ok(students)
}

pub fn load_test_directory(
    source: &dyn DocumentSource,
    cfg: &DashboardConfig,
) -> Result<Vec<TestDescriptor>, LoadError> {
    let rows: Vec<TestDirectoryEntry> = fetch_json(source, &cfg.test_directory)?;
    Ok(rows.into_iter().map(TestDescriptor::from).collect())
}

/// Notes are optional; a dataset without a notes document has no notes.
pub fn load_notes(source: &dyn DocumentSource, cfg: &DashboardConfig) -> Result<Vec<Note>, LoadError> {
    if !source.contains(&cfg.notes_file) {
        return Ok(Vec::new());
    }
    fetch_json(source, &cfg.notes_file)
}

#[derive(Debug, Clone)]
pub struct MarkSheetBatch {
    pub sheets: Vec<TestSheet>,
    pub digest: String,
}

fn load_one_sheet(
    source: &dyn DocumentSource,
    cfg: &DashboardConfig,
    test: &TestDescriptor,
) -> Result<(TestSheet, String, Vec<u8>), LoadError> {
    let reference = cfg.marks_reference(&test.marks_file);
    let bytes = fetch_bytes(source, &reference)?;
    let doc: MarkSheetDoc = parse_json(&reference, &bytes)?;
    let sheet = MarkSheet::from_doc(doc)
        .map_err(|m| LoadError::for_document("bad_document", &reference, format!("{reference}: {m}")))?;
    Ok((
        TestSheet {
            test: test.clone(),
            sheet,
        },
        reference,
        bytes,
    ))
}

/// Fetches every mark sheet in parallel; one failure fails the batch.
pub fn load_mark_sheets(
    source: &dyn DocumentSource,
    cfg: &DashboardConfig,
    tests: &[TestDescriptor],
) -> Result<MarkSheetBatch, LoadError> {
    let start = Instant::now();
    let loaded = tests
        .par_iter()
        .map(|t| load_one_sheet(source, cfg, t))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::warn!(code = %e.code, message = %e.message, "mark sheet batch rejected");
            e
        })?;

    let mut hasher = Sha256::new();
    let mut sheets = Vec::with_capacity(loaded.len());
    for (sheet, reference, bytes) in loaded {
        hasher.update(reference.as_bytes());
        hasher.update([0_u8]);
        hasher.update(&bytes);
        sheets.push(sheet);
    }
    let digest = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();

    tracing::debug!(
        sheets = sheets.len(),
        elapsed = ?start.elapsed(),
        "mark sheets loaded"
    );
    Ok(MarkSheetBatch { sheets, digest })
}

/// Roster and mark sheets are independent, so they load side by side.
pub fn load_class_inputs(
    source: &dyn DocumentSource,
    cfg: &DashboardConfig,
    class_file: &str,
    tests: &[TestDescriptor],
) -> Result<(Vec<Student>, MarkSheetBatch), LoadError> {
    let (roster, batch) = rayon::join(
        || load_roster(source, class_file),
        || load_mark_sheets(source, cfg, tests),
    );
    Ok((roster?, batch?))
}
