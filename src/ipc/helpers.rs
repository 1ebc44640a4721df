use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::calc::{self, TestFilters};
use crate::fetch::MarkSheetBatch;
use crate::ipc::error::{calc_err, err, load_err, superseded_err};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassEntry, Student, TestDescriptor};
use crate::session::{RequestTicket, Session, Superseded};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn active_session<'a>(state: &'a AppState, req: &Request) -> Result<&'a Session, serde_json::Value> {
    state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_dataset", "select a dataset first", None))
}

pub fn parse_filters(req: &Request) -> Result<TestFilters, serde_json::Value> {
    calc::parse_test_filters(req.params.get("filters")).map_err(|e| calc_err(&req.id, e))
}

/// `params.n`, falling back to the dataset's configured ranking size.
pub fn ranking_size(req: &Request, default: usize) -> Result<usize, serde_json::Value> {
    match req.params.get("n") {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    "n must be a non-negative integer",
                    Some(json!({ "n": v })),
                )
            }),
    }
}

/// Everything a class-scoped request works from, loaded under one request ticket.
pub struct ClassInputs {
    pub ticket: RequestTicket,
    pub class: ClassEntry,
    pub class_file: String,
    pub filters: TestFilters,
    pub tests: Vec<TestDescriptor>,
    pub roster: Arc<Vec<Student>>,
    pub batch: MarkSheetBatch,
}

pub fn load_class_inputs(session: &Session, req: &Request) -> Result<ClassInputs, serde_json::Value> {
    let ticket = session.begin();
    let class_file = required_str(req, "classFile")?;
    let filters = parse_filters(req)?;
    let class = session
        .class_entry(&class_file)
        .map_err(|e| load_err(&req.id, e))?;
    let all_tests = session.tests().map_err(|e| load_err(&req.id, e))?;
    let tests = calc::select_tests(&class, &all_tests, &filters);

    let started = Instant::now();
    let (roster, batch) = session
        .class_inputs(&class_file, &tests)
        .map_err(|e| load_err(&req.id, e))?;
    tracing::debug!(
        request = %req.id,
        seq = ticket.seq,
        class_file = %class_file,
        tests = tests.len(),
        students = roster.len(),
        elapsed = ?started.elapsed(),
        "class inputs loaded"
    );

    if !session.is_current(ticket) {
        return Err(superseded_err(
            &req.id,
            Superseded {
                seq: ticket.seq,
                latest: session.latest_seq(),
            },
        ));
    }

    Ok(ClassInputs {
        ticket,
        class,
        class_file,
        filters,
        tests,
        roster,
        batch,
    })
}
