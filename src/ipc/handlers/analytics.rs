use crate::calc;
use crate::chart;
use crate::ipc::error::{ok, superseded_err};
use crate::ipc::helpers::{active_session, load_class_inputs, ranking_size};
use crate::ipc::types::{AppState, Request};
use crate::ranking;
use serde_json::json;

fn handle_class_rankings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let n = match ranking_size(req, session.config().ranking_size) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let inputs = match load_class_inputs(session, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let totals = calc::class_totals(&inputs.roster, &inputs.batch.sheets);
    let rankings = ranking::rank(&totals, n);

    if let Err(s) = session.commit(inputs.ticket, &inputs.class_file, None) {
        return superseded_err(&req.id, s);
    }
    ok(
        &req.id,
        json!({
            "classFile": inputs.class_file,
            "filters": inputs.filters,
            "n": n,
            "top": rankings.top,
            "bottom": rankings.bottom,
            "dataDigest": inputs.batch.digest,
        }),
    )
}

fn handle_class_analytics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match active_session(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let n = match ranking_size(req, session.config().ranking_size) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let inputs = match load_class_inputs(session, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let totals = calc::class_totals(&inputs.roster, &inputs.batch.sheets);
    let rankings = ranking::rank(&totals, n);
    let subject_averages = ranking::subject_averages(&totals);
    let distribution = ranking::distribution(&totals);
    let hardest: Vec<&str> = subject_averages
        .iter()
        .filter(|a| a.hardest)
        .map(|a| a.subject.as_str())
        .collect();

    let selection = match session.commit(inputs.ticket, &inputs.class_file, None) {
        Ok(v) => v,
        Err(s) => return superseded_err(&req.id, s),
    };
    tracing::info!(
        request = %req.id,
        class_file = %inputs.class_file,
        students = totals.len(),
        tests = inputs.tests.len(),
        "class analytics computed"
    );

    ok(
        &req.id,
        json!({
            "class": inputs.class,
            "filters": inputs.filters,
            "selection": selection,
            "stats": {
                "totalStudents": inputs.roster.len(),
                "classAverage": ranking::class_average(&totals),
                "testCount": inputs.tests.len(),
            },
            "tests": inputs.tests,
            "subjectAverages": subject_averages,
            "hardestSubjects": hardest,
            "distribution": distribution,
            "topBottom": {
                "n": n,
                "top": rankings.top,
                "bottom": rankings.bottom,
            },
            "charts": {
                "subjectDifficulty": chart::subject_difficulty(&subject_averages),
                "performanceDistribution": chart::performance_distribution(&distribution),
            },
            "students": totals,
            "dataDigest": inputs.batch.digest,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "class.rankings" => Some(handle_class_rankings(state, req)),
        "class.analytics" => Some(handle_class_analytics(state, req)),
        _ => None,
    }
}
