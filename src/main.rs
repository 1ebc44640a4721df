mod calc;
mod chart;
mod config;
mod fetch;
mod ipc;
mod logging;
mod model;
mod ranking;
mod report;
mod session;
mod source;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    if let Err(e) = logging::init_tracing() {
        eprintln!("reportd: logging disabled: {e}");
    }

    let mut state = ipc::AppState { session: None };
    if let Ok(path) = std::env::var(config::DATASET_ENV) {
        match session::Session::open(&PathBuf::from(&path)) {
            Ok(s) => state.session = Some(s),
            Err(e) => tracing::error!(path = %path, code = %e.code, message = %e.message, "startup dataset not opened"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                // No id to answer to.
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{reply}");
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
