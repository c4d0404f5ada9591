use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub buffer_size: usize,
    /// Leave the target alone when it already holds exactly these bytes.
    pub idempotent_skip: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            buffer_size: 16 * 1024,
            idempotent_skip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub bytes_written: u64,
    pub skipped_unchanged: bool,
}

/// Replaces a file through a sibling temp file + rename.
///
/// The temp file is owned by a `NamedTempFile` guard, so any early return
/// (failed write, failed sync, failed rename) closes and unlinks it and leaves
/// the previous target untouched.
pub struct AtomicWriter {
    options: WriteOptions,
}

impl AtomicWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    pub fn write_str(&self, path: &Path, content: &str) -> Result<WriteStats> {
        self.write_bytes(path, content.as_bytes())
    }

    pub fn write_bytes(&self, path: &Path, content: &[u8]) -> Result<WriteStats> {
        let parent = path.parent().with_context(|| {
            format!(
                "Cannot write to {}: path has no parent directory",
                path.display()
            )
        })?;
        // "store.json" yields parent="" which NamedTempFile::new_in rejects.
        let parent: &Path = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        let exists = match fs::metadata(path) {
            Ok(meta) => Some(meta.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to stat {}", path.display()));
            }
        };

        if self.options.idempotent_skip {
            if let Some(len) = exists {
                if len == content.len() as u64 && file_equals_bytes(path, content)? {
                    return Ok(WriteStats {
                        bytes_written: 0,
                        skipped_unchanged: true,
                    });
                }
            }
        }

        if exists.is_none() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory for {}", path.display())
            })?;
        }

        let mut temp_file = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

        {
            let mut writer =
                BufWriter::with_capacity(self.options.buffer_size.max(1), temp_file.as_file_mut());
            writer
                .write_all(content)
                .with_context(|| format!("Failed to write {} bytes to temp file", content.len()))?;
            writer.flush().context("Failed to flush temp file")?;
        }

        temp_file
            .as_file()
            .sync_data()
            .with_context(|| format!("Failed to sync temp data for {}", path.display()))?;

        temp_file.persist(path).map_err(|e| {
            anyhow::Error::new(e.error)
                .context(format!("Failed to atomically replace {}", path.display()))
        })?;

        fsync_parent_dir(parent)
            .with_context(|| format!("Failed to sync parent dir {}", parent.display()))?;

        Ok(WriteStats {
            bytes_written: content.len() as u64,
            skipped_unchanged: false,
        })
    }
}

fn file_equals_bytes(path: &Path, expected: &[u8]) -> Result<bool> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to read existing file {}", path.display()))?;
    let mut buf = [0u8; 8192];
    let mut offset = 0usize;

    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read existing file {}", path.display()))?;
        if n == 0 {
            return Ok(offset == expected.len());
        }
        if expected.get(offset..offset + n) != Some(&buf[..n]) {
            return Ok(false);
        }
        offset += n;
    }
}

#[cfg(unix)]
fn fsync_parent_dir(parent: &Path) -> Result<()> {
    let dir = File::open(parent)
        .with_context(|| format!("Failed to open parent dir {}", parent.display()))?;
    dir.sync_all()
        .with_context(|| format!("Failed to fsync parent dir {}", parent.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn fsync_parent_dir(_parent: &Path) -> Result<()> {
    Ok(())
}
