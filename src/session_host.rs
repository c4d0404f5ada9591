//! Host editor seam for the session recorder.
//! Host adapters implement these traits over their own editor widget API.

use std::path::Path;

/// Fold-level bit marking a line as the header of a foldable region.
pub const FOLD_LEVEL_HEADER_FLAG: u32 = 0x2000;

/// Marker number the host uses for user bookmarks.
pub const BOOKMARK_MARKER: u32 = 1;

// ── Host queries and commands ───────────────────────────────

/// One open document together with its editing widget.
pub trait EditorDocument {
    /// Resolved absolute path on disk. `None` for unsaved or virtual buffers.
    fn real_path(&self) -> Option<&Path>;

    fn line_count(&self) -> usize;

    /// Raw fold level of `line`, including flag bits.
    fn fold_level(&self, line: usize) -> u32;

    fn fold_expanded(&self, line: usize) -> bool;

    fn is_marker_set(&self, line: usize, marker: u32) -> bool;

    /// Re-run syntax colouring over the whole buffer. Fold structure is
    /// derived from it, so this must happen before folds are toggled.
    fn colourise(&mut self);

    fn toggle_fold(&mut self, line: usize);

    fn set_marker(&mut self, line: usize, marker: u32);
}

/// Host status/log window.
pub trait StatusSink {
    fn status_add(&self, msg: &str);
}

/// Fallback sink for hosts without a status window.
pub struct StderrStatus;

impl StatusSink for StderrStatus {
    fn status_add(&self, msg: &str) {
        eprintln!("remember: {msg}");
    }
}

// ── Lifecycle events ────────────────────────────────────────

/// The two callbacks a host adapter wires to its document-open and
/// document-close signals. Calls are delivered one at a time.
pub trait DocumentEvents {
    fn on_open(&self, doc: &mut dyn EditorDocument);
    fn on_close(&mut self, doc: &dyn EditorDocument);
}
