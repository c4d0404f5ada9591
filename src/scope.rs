//! Heuristic scope lookup for Python test files.
//!
//! Two line regexes scanned bottom-up from the cursor. This is not a parser:
//! multi-line signatures, decorators and nested functions beyond the first
//! match are not understood.

use crate::runtest::RuntestError;
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    // Indented `def name(`; module-level functions are not matched.
    static ref RE_DEF: Regex = Regex::new(r"^\s+def\s+(.*)\(").expect("valid def regex");
    // Unindented `class Name(`.
    static ref RE_CLASS: Regex = Regex::new(r"^class\s+(.*)\(").expect("valid class regex");
}

/// Enclosing class and function found above a cursor position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub class_name: Option<String>,
    pub def_name: Option<String>,
}

/// Scans `lines[..limit]` from the bottom up. The first indented `def` wins;
/// the first unindented `class` wins and ends the scan.
pub fn find_enclosing_scope<S: AsRef<str>>(lines: &[S], limit: usize) -> Scope {
    let limit = limit.min(lines.len());
    let mut scope = Scope::default();

    for line in lines[..limit].iter().rev() {
        let line = line.as_ref();
        if scope.def_name.is_none() {
            if let Some(caps) = RE_DEF.captures(line) {
                scope.def_name = Some(caps[1].to_string());
            }
        }
        if scope.class_name.is_none() {
            if let Some(caps) = RE_CLASS.captures(line) {
                scope.class_name = Some(caps[1].to_string());
                break;
            }
        }
    }

    scope
}

/// `app.module[.Class][.def]`
pub fn build_test_identifier(
    app: &str,
    module: &str,
    class_name: Option<&str>,
    def_name: Option<&str>,
) -> String {
    let mut id = format!("{app}.{module}");
    if let Some(class_name) = class_name {
        id.push('.');
        id.push_str(class_name);
    }
    if let Some(def_name) = def_name {
        id.push('.');
        id.push_str(def_name);
    }
    id
}

/// Turns a cursor position into a scan limit the way a Python slice end
/// does: negative values count back from `len`, floored at 0.
pub fn slice_end(position: i64, len: usize) -> usize {
    if position >= 0 {
        usize::try_from(position).unwrap_or(usize::MAX).min(len)
    } else {
        let back = usize::try_from(position.unsigned_abs()).unwrap_or(usize::MAX);
        len.saturating_sub(back)
    }
}

/// App is the directory two levels above the file; module is the file name
/// up to its first `.`. `/x/myapp/tests/test_mod.py` -> `("myapp", "test_mod")`.
/// A file with fewer than two directories above it has no app and is rejected
/// with [`RuntestError::NoAppDirectory`].
pub fn resolve_app_and_module(path: &Path) -> Result<(String, String)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?
        .to_string_lossy();
    let module = file_name.split('.').next().unwrap_or_default().to_string();

    let app = path
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .ok_or_else(|| RuntestError::NoAppDirectory(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    Ok((app, module))
}

/// File + cursor position handed to `runtest`. A negative position counts
/// back from the end of the file.
#[derive(Debug, Clone)]
pub struct ScopeQuery {
    pub file_path: PathBuf,
    pub cursor_line: i64,
}

impl ScopeQuery {
    pub fn new(file_path: impl Into<PathBuf>, cursor_line: i64) -> Self {
        Self {
            file_path: file_path.into(),
            cursor_line,
        }
    }

    /// Reads the file and returns the dotted identifier of the test under the cursor.
    pub fn test_identifier(&self) -> Result<String> {
        let (app, module) = resolve_app_and_module(&self.file_path)?;
        let content = std::fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read {}", self.file_path.display()))?;
        let lines: Vec<&str> = content.lines().collect();
        let limit = slice_end(self.cursor_line, lines.len());
        let scope = find_enclosing_scope(&lines, limit);

        Ok(build_test_identifier(
            &app,
            &module,
            scope.class_name.as_deref(),
            scope.def_name.as_deref(),
        ))
    }
}
