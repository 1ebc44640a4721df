use crate::ipc::error::{calc_err, load_err, ok, superseded_err};
use crate::ipc::helpers::{active_session, load_class_inputs, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;

fn handle_student_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let inputs = match load_class_inputs(session, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let notes = match session.notes() {
        Ok(v) => v,
        Err(e) => return load_err(&req.id, e),
    };

    let model = match report::build_student_report(
        &inputs.roster,
        &student_id,
        &inputs.batch.sheets,
        &notes,
    ) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let selection = match session.commit(inputs.ticket, &inputs.class_file, Some(&student_id)) {
        Ok(v) => v,
        Err(s) => return superseded_err(&req.id, s),
    };

    ok(
        &req.id,
        json!({
            "class": inputs.class,
            "filters": inputs.filters,
            "selection": selection,
            "report": model,
            "dataDigest": inputs.batch.digest,
        }),
    )
}

fn handle_notes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match session.notes() {
        Ok(notes) => ok(
            &req.id,
            json!({
                "studentId": student_id,
                "notes": report::notes_for_student(&notes, &student_id),
            }),
        ),
        Err(e) => load_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.report" => Some(handle_student_report(state, req)),
        "notes.list" => Some(handle_notes_list(state, req)),
        _ => None,
    }
}
