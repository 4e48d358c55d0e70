//! Logging — env_logger tee'd into a diagnostic log file.
//!
//! Everything the `log` macros emit goes to stderr and, through the same
//! formatter, into the diagnostic file. The file handle is shared with
//! `DiagnosticLog` so the clear-all action can truncate it while the
//! logger keeps writing (the handle is append-mode, so writes after a
//! truncate land at the new start).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Handle to the diagnostic log file, independent of the answer log.
#[derive(Clone)]
pub struct DiagnosticLog {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {:?}", dir))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {:?}", path))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    /// Truncate the file in place.
    pub fn clear(&self) -> io::Result<()> {
        let file = self.file.lock().unwrap();
        file.set_len(0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> TeeWriter {
        TeeWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Writes each formatted log line to stderr and the diagnostic file.
struct TeeWriter {
    file: Arc<Mutex<File>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Console output is best effort; the file is the durable copy.
        let _ = io::stderr().write_all(buf);
        self.file.lock().unwrap().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.lock().unwrap().flush()
    }
}

/// Initialize logging once at startup. `RUST_LOG` overrides the config level.
pub fn init(level: &str, file: &Path) -> Result<DiagnosticLog> {
    let diag = DiagnosticLog::open(file)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(diag.writer())))
        .init();
    Ok(diag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_writer_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let diag = DiagnosticLog::open(dir.path().join("app.log")).unwrap();
        let mut writer = diag.writer();
        writer.write_all(b"line one\n").unwrap();
        writer.write_all(b"line two\n").unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(diag.path()).unwrap();
        assert_eq!(contents, "line one\nline two\n");
    }

    #[test]
    fn clear_truncates_and_writing_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let diag = DiagnosticLog::open(dir.path().join("app.log")).unwrap();
        let mut writer = diag.writer();
        writer.write_all(b"before clear\n").unwrap();
        diag.clear().unwrap();
        assert_eq!(std::fs::read_to_string(diag.path()).unwrap(), "");

        writer.write_all(b"after clear\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(
            std::fs::read_to_string(diag.path()).unwrap(),
            "after clear\n"
        );
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("deep").join("app.log");
        let diag = DiagnosticLog::open(&nested).unwrap();
        assert!(diag.path().exists());
    }
}
