#![allow(dead_code)]

use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn fixture_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(rel)
}

pub fn dashboard_fixture() -> PathBuf {
    fixture_path("fixtures/dashboard")
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn copy_dir(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).expect("create copy target");
    for ent in std::fs::read_dir(src).expect("read fixture dir") {
        let ent = ent.expect("dir entry");
        let from = ent.path();
        let to = dst.join(ent.file_name());
        if from.is_dir() {
            copy_dir(&from, &to);
        } else {
            std::fs::copy(&from, &to).expect("copy fixture file");
        }
    }
}

/// Copies the fixture dataset somewhere it can be broken without touching the original.
pub fn scratch_dataset(prefix: &str) -> PathBuf {
    let dst = temp_dir(prefix).join("dashboard");
    copy_dir(&dashboard_fixture(), &dst);
    dst
}

fn add_dir_to_zip(zip: &mut ZipWriter<File>, root: &Path, dir: &Path, prefix: &str) {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").path())
        .collect();
    entries.sort();
    for p in entries {
        if p.is_dir() {
            add_dir_to_zip(zip, root, &p, prefix);
            continue;
        }
        let rel = p
            .strip_prefix(root)
            .expect("relative path")
            .to_string_lossy()
            .replace('\\', "/");
        zip.start_file(format!("{prefix}{rel}"), opts)
            .expect("start zip entry");
        let bytes = std::fs::read(&p).expect("read file");
        zip.write_all(&bytes).expect("write zip entry");
    }
}

/// Zips `dir` into `out`, nesting entries under `prefix` (may be empty).
pub fn write_bundle(dir: &Path, out: &Path, prefix: &str) {
    let file = File::create(out).expect("create bundle");
    let mut zip = ZipWriter::new(file);
    add_dir_to_zip(&mut zip, dir, dir, prefix);
    zip.finish().expect("finish bundle");
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("REPORTD_DATASET");
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn reportd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn send_line(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, line: &str) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");

    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response for {}", line);
    serde_json::from_str(out.trim()).expect("parse response json")
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    let value = send_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error code of a request that is expected to fail.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub fn select_dataset(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    path: &Path,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        "select",
        "dataset.select",
        json!({ "path": path.to_string_lossy() }),
    )
}

pub fn ids(entries: &serde_json::Value) -> Vec<String> {
    entries
        .as_array()
        .expect("array")
        .iter()
        .map(|e| {
            e.get("studentId")
                .and_then(|v| v.as_str())
                .expect("studentId")
                .to_string()
        })
        .collect()
}

pub fn pcts(entries: &serde_json::Value) -> Vec<f64> {
    entries
        .as_array()
        .expect("array")
        .iter()
        .map(|e| e.get("percentage").and_then(|v| v.as_f64()).expect("percentage"))
        .collect()
}
