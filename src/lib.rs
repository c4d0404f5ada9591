//! Two small editor helpers:
//!
//! - a session recorder that remembers collapsed folds and bookmarks per file
//!   between editor sessions ([`session_recorder`]), driven by a host editor
//!   through the traits in [`session_host`];
//! - `runtest`, which finds the Python class/method under the cursor and runs
//!   the matching test ([`scope`], [`runtest`]).

pub mod atomic_write;
pub mod config;
pub mod runtest;
pub mod scope;
pub mod session_host;
pub mod session_recorder;
pub mod session_store;

pub use session_host::{DocumentEvents, EditorDocument, StatusSink};
pub use session_recorder::SessionRecorder;
pub use session_store::{SessionRecord, SessionStore};
