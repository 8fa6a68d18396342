//! Markdown table journal.
//!
//! Rows are appended as events arrive; `finish` flushes the stream and
//! appends a counter summary section. A mutex guards the writer so the
//! journal can be shared across tasks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::{Counters, Journal, JournalError, JournalEvent, JournalSummary};

/// Journal writing a markdown event table to a file.
pub struct MarkdownJournal {
    writer: Mutex<BufWriter<File>>,
    counters: Counters,
}

impl MarkdownJournal {
    /// Create the journal file and write the table header.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, JournalError> {
        let file = File::create(path).map_err(|e| JournalError::Io(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# liftgate execution journal")
            .and_then(|()| writeln!(writer))
            .and_then(|()| writeln!(writer, "| time | kind | description | details |"))
            .and_then(|()| writeln!(writer, "|---|---|---|---|"))
            .map_err(|e| JournalError::Io(e.to_string()))?;
        Ok(Self {
            writer: Mutex::new(writer),
            counters: Counters::default(),
        })
    }
}

impl Journal for MarkdownJournal {
    fn record(&self, event: JournalEvent) {
        self.counters.tally(event.kind);
        let details = event
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        let Ok(mut writer) = self.writer.lock() else {
            tracing::warn!("journal writer poisoned, dropping event");
            return;
        };
        if let Err(e) = writeln!(
            writer,
            "| {} | {:?} | {} | {} |",
            chrono::Utc::now().to_rfc3339(),
            event.kind,
            event.description,
            details
        ) {
            tracing::warn!(error = %e, "journal write failed");
        }
    }

    fn finish(&self) -> JournalSummary {
        let summary = self.counters.summary();
        if let Ok(mut writer) = self.writer.lock() {
            let result = writeln!(writer)
                .and_then(|()| writeln!(writer, "## Summary"))
                .and_then(|()| writeln!(writer))
                .and_then(|()| writeln!(writer, "| counter | total |"))
                .and_then(|()| writeln!(writer, "|---|---|"))
                .and_then(|()| writeln!(writer, "| bus frames in | {} |", summary.bus_rx))
                .and_then(|()| writeln!(writer, "| bus frames out | {} |", summary.bus_tx))
                .and_then(|()| {
                    writeln!(writer, "| dispatcher requests | {} |", summary.dispatch_tx)
                })
                .and_then(|()| {
                    writeln!(writer, "| dispatcher replies | {} |", summary.dispatch_rx)
                })
                .and_then(|()| {
                    writeln!(writer, "| tasks assigned | {} |", summary.tasks_assigned)
                })
                .and_then(|()| writeln!(writer, "| errors | {} |", summary.errors))
                .and_then(|()| writer.flush());
            if let Err(e) = result {
                tracing::warn!(error = %e, "journal summary write failed");
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_journal_writes_rows_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("journal.md");

        let journal = MarkdownJournal::create(&path).expect("create");
        journal.bus_rx("floor call", serde_json::json!({"id": "0x100"}));
        journal.dispatch_tx("posted", serde_json::json!({"path": "peticion_piso"}));
        journal.error("timeout");
        let summary = journal.finish();
        assert_eq!(summary.bus_rx, 1);
        assert_eq!(summary.errors, 1);

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.contains("| time | kind | description | details |"));
        assert!(content.contains("floor call"));
        assert!(content.contains("## Summary"));
        assert!(content.contains("| bus frames in | 1 |"));
        assert!(content.contains("| errors | 1 |"));
    }
}
