use crate::ipc::error::{load_err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use serde_json::json;
use std::path::PathBuf;

fn dataset_json(session: &Session) -> serde_json::Value {
    json!({
        "path": session.source().describe(),
        "kind": session.source().kind(),
        "config": session.config(),
    })
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataset": state.session.as_ref().map(dataset_json),
            "selection": state.session.as_ref().and_then(|s| s.current_selection()),
        }),
    )
}

fn handle_dataset_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match Session::open(&path) {
        Ok(session) => {
            let out = dataset_json(&session);
            // A new dataset drops every cached roster and selection from the old one.
            state.session = Some(session);
            ok(&req.id, out)
        }
        Err(e) => load_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "dataset.select" => Some(handle_dataset_select(state, req)),
        _ => None,
    }
}
