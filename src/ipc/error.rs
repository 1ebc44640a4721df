use serde_json::json;

use crate::calc::CalcError;
use crate::fetch::LoadError;
use crate::session::Superseded;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn load_err(id: &str, e: LoadError) -> serde_json::Value {
    tracing::warn!(request = id, code = %e.code, message = %e.message, "load failed");
    err(id, &e.code, e.message, e.details)
}

pub fn calc_err(id: &str, e: CalcError) -> serde_json::Value {
    err(id, &e.code, e.message, e.details)
}

pub fn superseded_err(id: &str, s: Superseded) -> serde_json::Value {
    err(
        id,
        "superseded",
        "a newer request replaced this one",
        Some(json!({ "seq": s.seq, "latestSeq": s.latest })),
    )
}
