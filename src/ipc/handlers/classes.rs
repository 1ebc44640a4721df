use crate::calc;
use crate::ipc::error::{err, load_err, ok};
use crate::ipc::helpers::{active_session, parse_filters, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match session.classes() {
        Ok(classes) => ok(&req.id, json!({ "classes": classes.as_slice() })),
        Err(e) => load_err(&req.id, e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_file = match required_str(req, "classFile") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = session.class_entry(&class_file) {
        return load_err(&req.id, e);
    }
    match session.roster(&class_file) {
        Ok(students) => ok(
            &req.id,
            json!({ "classFile": class_file, "students": students.as_slice() }),
        ),
        Err(e) => load_err(&req.id, e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_file = match required_str(req, "classFile") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = session.class_entry(&class_file) {
        return load_err(&req.id, e);
    }
    let roster = match session.roster(&class_file) {
        Ok(v) => v,
        Err(e) => return load_err(&req.id, e),
    };
    let Some(student) = roster.iter().find(|s| s.id == student_id) else {
        return err(
            &req.id,
            "not_found",
            "student not found",
            Some(json!({ "classFile": class_file, "studentId": student_id })),
        );
    };
    let notes = match session.notes() {
        Ok(v) => v,
        Err(e) => return load_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({
            "student": student,
            "notes": report::notes_for_student(&notes, &student_id),
        }),
    )
}

fn handle_tests_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_file = match required_str(req, "classFile") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class = match session.class_entry(&class_file) {
        Ok(v) => v,
        Err(e) => return load_err(&req.id, e),
    };
    let tests = match session.tests() {
        Ok(v) => v,
        Err(e) => return load_err(&req.id, e),
    };

    let selected = calc::select_tests(&class, &tests, &filters);
    let mut test_types: Vec<&str> = tests
        .iter()
        .filter(|t| class.owns_test(&t.class_name))
        .map(|t| t.test_type.as_str())
        .filter(|t| !t.trim().is_empty())
        .collect();
    test_types.sort_unstable();
    test_types.dedup();

    ok(
        &req.id,
        json!({
            "class": class,
            "filters": filters,
            "testTypes": test_types,
            "tests": selected,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "tests.list" => Some(handle_tests_list(state, req)),
        _ => None,
    }
}
