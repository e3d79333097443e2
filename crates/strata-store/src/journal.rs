//! Append-only JSONL journal.
//!
//! One line per event: a run opened or closed, a recommendation created, an
//! execution record opened or closed. Lines are never rewritten; replay keeps
//! the last line seen for each id.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use strata_core::model::{AnalysisRun, ExecutionRecord, Recommendation};

use crate::error::{Result, StoreError};

pub const JOURNAL_FILE: &str = "ledger.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "row", rename_all = "snake_case")]
pub enum Event {
    Run(AnalysisRun),
    Recommendation(Recommendation),
    Execution(ExecutionRecord),
}

pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open (creating if needed) the journal in `dir` and return every event
    /// already in it.
    ///
    /// A torn final line (crash mid-append) is skipped with a warning; a bad
    /// line anywhere else is corruption.
    pub fn open(dir: impl AsRef<Path>) -> Result<(Self, Vec<Event>)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(JOURNAL_FILE);

        let mut events = Vec::new();
        if path.exists() {
            let lines: Vec<String> = BufReader::new(File::open(&path)?)
                .lines()
                .collect::<std::io::Result<_>>()?;
            let last = lines.len();
            for (i, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(line) {
                    Ok(ev) => events.push(ev),
                    Err(e) if i + 1 == last => {
                        warn!(path = %path.display(), line = i + 1, error = %e, "ignoring torn journal tail");
                    }
                    Err(e) => {
                        return Err(StoreError::Corrupt {
                            line: i + 1,
                            detail: e.to_string(),
                        })
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((
            Self {
                path,
                writer: BufWriter::new(file),
            },
            events,
        ))
    }

    pub fn append(&mut self, event: &Event) -> Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
