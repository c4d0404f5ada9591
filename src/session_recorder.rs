//! Captures collapsed folds and bookmarks when a document closes and replays
//! them when the same file is opened again.

use crate::config::SessionConfig;
use crate::session_host::{
    DocumentEvents, EditorDocument, StatusSink, StderrStatus, BOOKMARK_MARKER,
    FOLD_LEVEL_HEADER_FLAG,
};
use crate::session_store::{SessionRecord, SessionStore};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub struct SessionRecorder {
    store: SessionStore,
    store_path: PathBuf,
    debug: bool,
    status: Box<dyn StatusSink>,
}

impl SessionRecorder {
    /// Loads the store from `store_path`. Called once when the host loads the plugin.
    pub fn init(store_path: &Path, status: Box<dyn StatusSink>) -> Result<Self> {
        let store = SessionStore::load(store_path)?;
        Ok(Self::with_store(store, store_path, status))
    }

    /// Plugin entry point for hosts without their own status window.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let mut recorder = Self::init(&config.store_path(), Box::new(StderrStatus))?;
        recorder.set_debug(config.debug);
        Ok(recorder)
    }

    pub fn with_store(
        store: SessionStore,
        store_path: &Path,
        status: Box<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            store_path: store_path.to_path_buf(),
            debug: false,
            status,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
        self.debug_log(&format!(
            "store={} entries={}",
            self.store_path.display(),
            self.store.len()
        ));
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Writes the store back to disk. Called once when the host unloads the plugin.
    pub fn shutdown(mut self) -> Result<SessionStore> {
        let stats = self.store.save(&self.store_path)?;
        self.debug_log(&format!(
            "saved entries={} bytes={} unchanged={}",
            self.store.len(),
            stats.bytes_written,
            stats.skipped_unchanged
        ));
        Ok(self.store)
    }

    /// Scans every line of `doc` for collapsed fold headers and bookmarks.
    /// Returns `None` when the document has no real path or nothing to remember.
    pub fn capture(&self, doc: &dyn EditorDocument) -> Option<SessionRecord> {
        doc.real_path()?;

        let mut record = SessionRecord::default();
        let lines = doc.line_count();
        for line in 0..lines {
            let level = doc.fold_level(line);
            if level & FOLD_LEVEL_HEADER_FLAG != 0 && !doc.fold_expanded(line) {
                record.folds.push(line);
            }
            if doc.is_marker_set(line, BOOKMARK_MARKER) {
                record.bookmarks.push(line);
            }
        }

        self.debug_log(&format!(
            "lines={lines} folds={:?} bookmarks={:?}",
            record.folds, record.bookmarks
        ));

        if record.is_empty() {
            None
        } else {
            Some(record)
        }
    }

    fn debug_log(&self, msg: &str) {
        if self.debug {
            self.status.status_add(msg);
        }
    }
}

impl DocumentEvents for SessionRecorder {
    fn on_open(&self, doc: &mut dyn EditorDocument) {
        let Some(path) = doc.real_path().map(path_key) else {
            return;
        };
        self.debug_log(&format!("open={path}"));
        let Some(record) = self.store.get(&path) else {
            return;
        };

        doc.colourise();
        let lines = doc.line_count();

        for &line in &record.folds {
            if line < lines {
                doc.toggle_fold(line);
            } else {
                self.debug_log(&format!("skip fold line={line} lines={lines}"));
            }
        }
        for &line in &record.bookmarks {
            if line < lines {
                doc.set_marker(line, BOOKMARK_MARKER);
            } else {
                self.debug_log(&format!("skip bookmark line={line} lines={lines}"));
            }
        }
    }

    fn on_close(&mut self, doc: &dyn EditorDocument) {
        let Some(path) = doc.real_path().map(path_key) else {
            self.debug_log("close: no real path, skipped");
            return;
        };
        self.debug_log(&format!("close={path}"));

        // Entries are never pruned here: a close with nothing to record keeps
        // whatever was stored for the path before.
        if let Some(record) = self.capture(doc) {
            self.store.insert(path, record);
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Colourise,
        ToggleFold(usize),
        SetMarker(usize, u32),
    }

    /// In-memory stand-in for a host editor document.
    struct FakeDoc {
        path: Option<PathBuf>,
        lines: usize,
        headers: BTreeSet<usize>,
        collapsed: BTreeSet<usize>,
        markers: BTreeSet<usize>,
        calls: Vec<Call>,
    }

    impl FakeDoc {
        fn new(path: Option<&str>, lines: usize) -> Self {
            Self {
                path: path.map(PathBuf::from),
                lines,
                headers: BTreeSet::new(),
                collapsed: BTreeSet::new(),
                markers: BTreeSet::new(),
                calls: Vec::new(),
            }
        }

        fn header(mut self, line: usize, expanded: bool) -> Self {
            self.headers.insert(line);
            if !expanded {
                self.collapsed.insert(line);
            }
            self
        }

        fn bookmark(mut self, line: usize) -> Self {
            self.markers.insert(line);
            self
        }
    }

    impl EditorDocument for FakeDoc {
        fn real_path(&self) -> Option<&Path> {
            self.path.as_deref()
        }

        fn line_count(&self) -> usize {
            self.lines
        }

        fn fold_level(&self, line: usize) -> u32 {
            let base = 0x400;
            if self.headers.contains(&line) {
                base | FOLD_LEVEL_HEADER_FLAG
            } else {
                base
            }
        }

        fn fold_expanded(&self, line: usize) -> bool {
            !self.collapsed.contains(&line)
        }

        fn is_marker_set(&self, line: usize, marker: u32) -> bool {
            marker == BOOKMARK_MARKER && self.markers.contains(&line)
        }

        fn colourise(&mut self) {
            self.calls.push(Call::Colourise);
        }

        fn toggle_fold(&mut self, line: usize) {
            self.calls.push(Call::ToggleFold(line));
        }

        fn set_marker(&mut self, line: usize, marker: u32) {
            self.calls.push(Call::SetMarker(line, marker));
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Rc<RefCell<Vec<String>>>);

    impl StatusSink for Collect {
        fn status_add(&self, msg: &str) {
            self.0.borrow_mut().push(msg.to_string());
        }
    }

    fn recorder(store: SessionStore) -> SessionRecorder {
        SessionRecorder::with_store(
            store,
            Path::new("/tmp/unused.json"),
            Box::new(Collect::default()),
        )
    }

    fn record(folds: &[usize], bookmarks: &[usize]) -> SessionRecord {
        SessionRecord {
            folds: folds.to_vec(),
            bookmarks: bookmarks.to_vec(),
        }
    }

    #[test]
    fn close_records_collapsed_headers_and_bookmarks() {
        let mut rec = recorder(SessionStore::new());
        let doc = FakeDoc::new(Some("/src/models.py"), 12)
            .header(1, true)
            .header(3, false)
            .header(8, false)
            .bookmark(0)
            .bookmark(10);

        rec.on_close(&doc);
        assert_eq!(
            rec.store().get("/src/models.py"),
            Some(&record(&[3, 8], &[0, 10]))
        );
    }

    #[test]
    fn expanded_flag_without_header_is_not_a_fold() {
        let rec = recorder(SessionStore::new());
        let mut doc = FakeDoc::new(Some("/src/a.py"), 5);
        // collapsed state reported on a non-header line must be ignored
        doc.collapsed.insert(2);
        assert_eq!(rec.capture(&doc), None);
    }

    #[test]
    fn capture_is_idempotent_on_unchanged_document() {
        let rec = recorder(SessionStore::new());
        let doc = FakeDoc::new(Some("/src/a.py"), 20)
            .header(4, false)
            .bookmark(9);
        let first = rec.capture(&doc);
        let second = rec.capture(&doc);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn close_without_real_path_is_ignored() {
        let mut rec = recorder(SessionStore::new());
        let doc = FakeDoc::new(None, 10).header(2, false).bookmark(3);
        rec.on_close(&doc);
        assert!(rec.store().is_empty());
    }

    #[test]
    fn empty_close_never_creates_an_entry() {
        let mut rec = recorder(SessionStore::new());
        let doc = FakeDoc::new(Some("/src/plain.py"), 30).header(5, true);
        rec.on_close(&doc);
        assert!(!rec.store().contains("/src/plain.py"));
    }

    #[test]
    fn empty_close_keeps_previous_entry() {
        let mut store = SessionStore::new();
        store.insert("/src/sticky.py", record(&[1], &[2]));
        let mut rec = recorder(store);

        rec.on_close(&FakeDoc::new(Some("/src/sticky.py"), 30));
        assert_eq!(rec.store().get("/src/sticky.py"), Some(&record(&[1], &[2])));
    }

    #[test]
    fn close_overwrites_previous_entry() {
        let mut store = SessionStore::new();
        store.insert("/src/a.py", record(&[1, 2], &[3]));
        let mut rec = recorder(store);

        rec.on_close(&FakeDoc::new(Some("/src/a.py"), 30).bookmark(7));
        assert_eq!(rec.store().get("/src/a.py"), Some(&record(&[], &[7])));
    }

    #[test]
    fn open_replays_exactly_the_recorded_lines() {
        let mut store = SessionStore::new();
        store.insert("/src/a.py", record(&[2, 5], &[7]));
        let rec = recorder(store);

        let mut doc = FakeDoc::new(Some("/src/a.py"), 20);
        rec.on_open(&mut doc);
        assert_eq!(
            doc.calls,
            vec![
                Call::Colourise,
                Call::ToggleFold(2),
                Call::ToggleFold(5),
                Call::SetMarker(7, BOOKMARK_MARKER),
            ]
        );
        assert_eq!(rec.store().len(), 1);
    }

    #[test]
    fn open_of_unknown_path_touches_nothing() {
        let rec = recorder(SessionStore::new());
        let mut doc = FakeDoc::new(Some("/src/new.py"), 20);
        rec.on_open(&mut doc);
        assert!(doc.calls.is_empty());

        let mut unsaved = FakeDoc::new(None, 20);
        rec.on_open(&mut unsaved);
        assert!(unsaved.calls.is_empty());
    }

    #[test]
    fn open_skips_lines_past_end_of_shrunk_file() {
        let mut store = SessionStore::new();
        store.insert("/src/a.py", record(&[2, 50], &[4, 60]));
        let rec = recorder(store);

        let mut doc = FakeDoc::new(Some("/src/a.py"), 10);
        rec.on_open(&mut doc);
        assert_eq!(
            doc.calls,
            vec![
                Call::Colourise,
                Call::ToggleFold(2),
                Call::SetMarker(4, BOOKMARK_MARKER),
            ]
        );
    }

    #[test]
    fn debug_mode_reports_to_status_sink() {
        let sink = Collect::default();
        let mut rec = SessionRecorder::with_store(
            SessionStore::new(),
            Path::new("/tmp/unused.json"),
            Box::new(sink.clone()),
        );
        rec.on_close(&FakeDoc::new(Some("/src/a.py"), 3).bookmark(1));
        assert!(sink.0.borrow().is_empty());

        rec.set_debug(true);
        rec.on_close(&FakeDoc::new(Some("/src/b.py"), 3).bookmark(1));
        let messages = sink.0.borrow();
        assert!(messages.iter().any(|m| m.starts_with("store=")));
        assert!(messages.iter().any(|m| m == "close=/src/b.py"));
        assert!(messages.iter().any(|m| m.contains("bookmarks=[1]")));
    }

    #[test]
    fn init_and_shutdown_persist_across_sessions() {
        let tmp = TempDir::new().unwrap();
        let path = crate::session_store::store_path_in(tmp.path());

        let mut first = SessionRecorder::init(&path, Box::new(Collect::default())).unwrap();
        first.on_close(&FakeDoc::new(Some("/src/a.py"), 10).header(3, false).bookmark(6));
        first.shutdown().unwrap();

        let second = SessionRecorder::init(&path, Box::new(Collect::default())).unwrap();
        let mut doc = FakeDoc::new(Some("/src/a.py"), 10);
        second.on_open(&mut doc);
        assert_eq!(
            doc.calls,
            vec![
                Call::Colourise,
                Call::ToggleFold(3),
                Call::SetMarker(6, BOOKMARK_MARKER),
            ]
        );
    }

    #[test]
    fn from_config_uses_plugins_dir_under_host_config() {
        let tmp = TempDir::new().unwrap();
        let config = SessionConfig {
            config_dir: Some(tmp.path().to_path_buf()),
            debug: false,
        };
        let mut rec = SessionRecorder::from_config(&config).unwrap();
        rec.on_close(&FakeDoc::new(Some("/src/a.py"), 4).bookmark(2));
        rec.shutdown().unwrap();

        let stored_path = tmp.path().join("plugins").join("remember.json");
        let stored = SessionStore::load(&stored_path).unwrap();
        assert_eq!(stored.get("/src/a.py"), Some(&record(&[], &[2])));
    }

    #[test]
    fn shutdown_without_changes_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remember.json");
        let mut store = SessionStore::new();
        store.insert("/src/a.py", record(&[3], &[]));
        store.save(&path).unwrap();
        let before = std::fs::read(&path).unwrap();

        let sink = Collect::default();
        let mut rec = SessionRecorder::init(&path, Box::new(sink.clone())).unwrap();
        rec.set_debug(true);
        rec.on_open(&mut FakeDoc::new(Some("/src/a.py"), 10));
        // same state captured again on close
        rec.on_close(&FakeDoc::new(Some("/src/a.py"), 10).header(3, false));
        std::thread::sleep(std::time::Duration::from_millis(5));
        rec.shutdown().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(sink.0.borrow().iter().any(|m| m.ends_with("unchanged=true")));
    }

    #[test]
    fn init_fails_loudly_on_corrupt_store() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remember.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SessionRecorder::init(&path, Box::new(Collect::default())).is_err());
    }
}
