//! Append-only request log (spec §6 "Persisted state"). Deliberately built
//! on raw `std::fs` rather than the `log`/`logforth` pipeline: rotation here
//! needs an exact byte threshold and a single `.1` generation, not a
//! level-filtered, formatted event stream.

use std::fs::{File, OpenOptions};
use std::io::{Result, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;

/// One handle per process, guarding the log file with a mutex since multiple
/// request tasks write concurrently (spec §6: "writes are serialized; a
/// request never blocks on another's write for more than the duration of a
/// single line").
pub struct RequestLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RequestLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Append one line (a newline is added if missing) and rotate if the
    /// file has crossed [`ROTATE_AT_BYTES`] (spec §6 "rotation": the current
    /// file is renamed to `<path>.1`, overwriting any prior `.1`, and a fresh
    /// file is opened — only one prior generation is ever kept).
    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        file.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;

        if file.metadata()?.len() >= ROTATE_AT_BYTES {
            *file = self.rotate()?;
        }

        Ok(())
    }

    /// Rename the current file to `<path>.1`, overwriting any prior
    /// generation, and open a fresh file at `path` (spec §6 "rotation").
    fn rotate(&self) -> Result<File> {
        let rotated = self.path.with_extension("log.1");
        std::fs::rename(&self.path, &rotated)?;
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_lines_are_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.log");
        let log = RequestLog::open(&path).unwrap();
        log.append("first line").unwrap();
        log.append("second line").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first line\nsecond line\n");
    }

    #[test]
    fn rotation_preserves_a_single_prior_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.log");
        let log = RequestLog::open(&path).unwrap();

        let big_line = "x".repeat(1024 * 1024);
        for _ in 0..11 {
            log.append(&big_line).unwrap();
        }

        assert!(dir.path().join("proxy.log.1").exists());
        assert!(path.exists());
    }
}
