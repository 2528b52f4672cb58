//! Durable event log, one JSON object per line

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crossway_core::{CausalEvent, CrosswayResult};

#[derive(Debug)]
pub struct EventLogStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLogStore {
    /// Open `path` for appending, creating parent directories as needed
    pub fn open(path: impl Into<PathBuf>) -> CrosswayResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(EventLogStore {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a raw line; blank input is ignored
    pub fn append_line(&self, line: &str) -> CrosswayResult<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let mut file = self.file.lock();
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    pub fn append(&self, event: &CausalEvent) -> CrosswayResult<()> {
        self.append_line(&serde_json::to_string(event)?)
    }

    /// Every line written so far, in order
    pub fn read_all(&self) -> CrosswayResult<Vec<String>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}
