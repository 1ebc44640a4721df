use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{self, DashboardConfig};
use crate::fetch::{self, LoadError, MarkSheetBatch};
use crate::model::{ClassEntry, Note, Student, TestDescriptor};
use crate::source::{self, DocumentSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub class_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superseded {
    pub seq: u64,
    pub latest: u64,
}

#[derive(Default)]
struct Cache {
    classes: Option<Arc<Vec<ClassEntry>>>,
    tests: Option<Arc<Vec<TestDescriptor>>>,
    notes: Option<Arc<Vec<Note>>>,
    rosters: HashMap<String, Arc<Vec<Student>>>,
}

/// One browsing session over one dataset: cached directory lookups, the
/// current selection, and the request counter behind last-request-wins.
pub struct Session {
    source: Box<dyn DocumentSource>,
    config: DashboardConfig,
    next_seq: AtomicU64,
    cache: Mutex<Cache>,
    current: Mutex<Option<Selection>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Writers only swap whole values in, so a poisoned guard still holds consistent data.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(source: Box<dyn DocumentSource>, config: DashboardConfig) -> Self {
        Self {
            source,
            config,
            next_seq: AtomicU64::new(0),
            cache: Mutex::new(Cache::default()),
            current: Mutex::new(None),
        }
    }

    /// Opens a dataset directory or zip bundle and reads its optional config.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let source = source::open_source(path)
            .map_err(|e| LoadError::new("fetch_failed", format!("{e:#}")))?;
        let config = config::load_config(source.as_ref())?;
        tracing::info!(
            dataset = %source.describe(),
            kind = source.kind(),
            "dataset opened"
        );
        Ok(Self::new(source, config))
    }

    pub fn source(&self) -> &dyn DocumentSource {
        self.source.as_ref()
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn begin(&self) -> RequestTicket {
        RequestTicket {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub fn latest_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.seq == self.latest_seq()
    }

    /// Records the selection only when no newer request has started since `ticket`.
    pub fn commit(
        &self,
        ticket: RequestTicket,
        class_file: &str,
        student_id: Option<&str>,
    ) -> Result<Selection, Superseded> {
        let mut current = lock(&self.current);
        let latest = self.latest_seq();
        if ticket.seq != latest {
            tracing::debug!(seq = ticket.seq, latest, "discarding superseded result");
            return Err(Superseded {
                seq: ticket.seq,
                latest,
            });
        }
        let sel = Selection {
            class_file: class_file.to_string(),
            student_id: student_id.map(|s| s.to_string()),
            seq: ticket.seq,
        };
        *current = Some(sel.clone());
        Ok(sel)
    }

    pub fn current_selection(&self) -> Option<Selection> {
        lock(&self.current).clone()
    }

    pub fn classes(&self) -> Result<Arc<Vec<ClassEntry>>, LoadError> {
        if let Some(v) = lock(&self.cache).classes.clone() {
            tracing::trace!("class directory cache hit");
            return Ok(v);
        }
        let v = Arc::new(fetch::load_class_directory(self.source(), &self.config)?);
        lock(&self.cache).classes = Some(v.clone());
        Ok(v)
    }

    pub fn class_entry(&self, class_file: &str) -> Result<ClassEntry, LoadError> {
        self.classes()?
            .iter()
            .find(|c| c.file_name == class_file)
            .cloned()
            .ok_or_else(|| LoadError::new("not_found", format!("unknown class file {class_file}")))
    }

    pub fn tests(&self) -> Result<Arc<Vec<TestDescriptor>>, LoadError> {
        if let Some(v) = lock(&self.cache).tests.clone() {
            tracing::trace!("test directory cache hit");
            return Ok(v);
        }
        let v = Arc::new(fetch::load_test_directory(self.source(), &self.config)?);
        lock(&self.cache).tests = Some(v.clone());
        Ok(v)
    }

    pub fn notes(&self) -> Result<Arc<Vec<Note>>, LoadError> {
        if let Some(v) = lock(&self.cache).notes.clone() {
            return Ok(v);
        }
        let v = Arc::new(fetch::load_notes(self.source(), &self.config)?);
        lock(&self.cache).notes = Some(v.clone());
        Ok(v)
    }

    fn cached_roster(&self, class_file: &str) -> Option<Arc<Vec<Student>>> {
        lock(&self.cache).rosters.get(class_file).cloned()
    }

    pub fn roster(&self, class_file: &str) -> Result<Arc<Vec<Student>>, LoadError> {
        if let Some(v) = self.cached_roster(class_file) {
            tracing::trace!(class_file, "roster cache hit");
            return Ok(v);
        }
        let v = Arc::new(fetch::load_roster(self.source(), class_file)?);
        self.remember_roster(class_file, v.clone());
        Ok(v)
    }

    fn remember_roster(&self, class_file: &str, roster: Arc<Vec<Student>>) {
        lock(&self.cache)
            .rosters
            .insert(class_file.to_string(), roster);
    }

    /// Roster plus mark sheets for `tests`; an uncached roster is fetched alongside the sheets.
    pub fn class_inputs(
        &self,
        class_file: &str,
        tests: &[TestDescriptor],
    ) -> Result<(Arc<Vec<Student>>, MarkSheetBatch), LoadError> {
        if let Some(roster) = self.cached_roster(class_file) {
            let batch = fetch::load_mark_sheets(self.source(), &self.config, tests)?;
            return Ok((roster, batch));
        }
        let (roster, batch) =
            fetch::load_class_inputs(self.source(), &self.config, class_file, tests)?;
        let roster = Arc::new(roster);
        self.remember_roster(class_file, roster.clone());
        Ok((roster, batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    struct EmptySource;

    impl DocumentSource for EmptySource {
        fn describe(&self) -> String {
            "empty".to_string()
        }
        fn kind(&self) -> &'static str {
            "memory"
        }
        fn fetch(&self, reference: &str) -> anyhow::Result<Vec<u8>> {
            match reference {
                "classes.json" => Ok(br#"[{"fileName":"c10.json","displayText":"Class 10"}]"#.to_vec()),
                "c10.json" => Ok(br#"[{"student_id":"S1","name":"A"}]"#.to_vec()),
                _ => anyhow::bail!("no document {reference}"),
            }
        }
        fn contains(&self, reference: &str) -> bool {
            matches!(reference, "classes.json" | "c10.json")
        }
    }

    fn session() -> Session {
        Session::new(Box::new(EmptySource), DashboardConfig::default())
    }

    #[test]
    fn newest_request_wins() {
        let s = session();
        let slow = s.begin();
        let fast = s.begin();
        assert!(s.commit(fast, "c10.json", Some("S1")).is_ok());
        let stale = s.commit(slow, "c9.json", None).unwrap_err();
        assert_eq!(stale.latest, fast.seq);
        let cur = s.current_selection().expect("selection");
        assert_eq!(cur.class_file, "c10.json");
        assert_eq!(cur.student_id.as_deref(), Some("S1"));
    }

    #[test]
    fn stale_result_from_another_thread_is_discarded() {
        let s = Arc::new(session());
        let slow = s.begin();
        let (started_tx, started_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();

        let worker = {
            let s = Arc::clone(&s);
            thread::spawn(move || {
                started_tx.send(()).expect("signal");
                go_rx.recv().expect("wait");
                s.commit(slow, "c9.json", None)
            })
        };
        started_rx.recv().expect("started");
        let fast = s.begin();
        s.commit(fast, "c10.json", None).expect("fast commit");
        go_tx.send(()).expect("release");

        let slow_result = worker.join().expect("join");
        assert!(slow_result.is_err());
        assert_eq!(
            s.current_selection().map(|c| c.class_file),
            Some("c10.json".to_string())
        );
    }

    #[test]
    fn lookups_are_cached() {
        let s = session();
        assert!(s.cached_roster("c10.json").is_none());
        let a = s.roster("c10.json").expect("roster");
        let b = s.roster("c10.json").expect("roster");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(s.class_entry("c10.json").expect("class").display_text, "Class 10");
        assert_eq!(s.class_entry("nope.json").unwrap_err().code, "not_found");
    }

    #[test]
    fn failed_lookup_keeps_prior_selection() {
        let s = session();
        let t = s.begin();
        s.commit(t, "c10.json", None).expect("commit");
        assert_eq!(s.roster("missing.json").unwrap_err().code, "fetch_failed");
        assert_eq!(
            s.current_selection().map(|c| c.class_file),
            Some("c10.json".to_string())
        );
    }
}
