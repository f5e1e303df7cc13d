//! NDJSON (newline-delimited JSON) stream sink.
//!
//! Each row is serialized directly to the writer without an intermediate
//! `String`.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_summary(&summary)?;
//! sink.write_changes(&changes)?;
//! ```

use super::{GrantChangeRow, SyncSummaryRow};
use serde::Serialize;
use std::io::{self, BufWriter, Write};

/// Buffered NDJSON writer.
pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    /// Write NDJSON to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Create a sink wrapping any writer (file, Vec<u8>, etc.).
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
            rows_written: 0,
        }
    }

    pub fn write_summary(&mut self, row: &SyncSummaryRow) -> io::Result<()> {
        self.write_row(row)
    }

    pub fn write_changes(&mut self, rows: &[GrantChangeRow]) -> io::Result<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChangeKind;
    use crate::synchronizer::SyncAction;

    #[test]
    fn one_line_per_row() {
        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);

        let summary = SyncSummaryRow {
            record_id: "r1".into(),
            new_state: "active".into(),
            action: SyncAction::Revoked,
            granted: 0,
            revoked: 2,
            owner_retained: true,
            elapsed_ms: 3,
            created_at: "2026-10-19T00:00:00+00:00".into(),
        };
        let changes: Vec<GrantChangeRow> = ["u1", "u3"]
            .iter()
            .map(|p| GrantChangeRow {
                record_id: "r1".into(),
                template_id: "t1".into(),
                principal_id: (*p).into(),
                change: ChangeKind::Revoke,
                created_at: "2026-10-19T00:00:00+00:00".into(),
            })
            .collect();

        sink.write_summary(&summary).unwrap();
        sink.write_changes(&changes).unwrap();
        assert_eq!(sink.rows_written(), 3);
        assert_eq!(sink.finish().unwrap(), 3);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "revoked");
        let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["change"], "revoke");
        assert_eq!(last["principal_id"], "u3");
    }
}
