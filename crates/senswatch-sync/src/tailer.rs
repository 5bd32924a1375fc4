//! Incremental reader for the append-only change log.

use crate::error::{Result, SyncError};
use crate::event::{ChangeEvent, EventParser};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

/// Events read by one poll, and the log offset just past them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailBatch {
    /// Parsed events in log order
    pub events: Vec<ChangeEvent>,
    /// Byte offset after the last complete line read
    pub end_offset: u64,
}

impl TailBatch {
    /// Whether the poll found no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Tails the change log from an in-memory byte offset.
///
/// The offset starts at 0 and only moves forward on [`commit`](Self::commit),
/// so a batch whose processing failed is read again by the next poll.
#[derive(Debug)]
pub struct ChangeLogTailer {
    path: PathBuf,
    parser: EventParser,
    offset: u64,
}

impl ChangeLogTailer {
    /// Tail `path` from its beginning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, parser: EventParser) -> Self {
        Self {
            path: path.into(),
            parser,
            offset: 0,
        }
    }

    /// Log file being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the first byte not yet committed.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read every complete line appended since the committed offset.
    ///
    /// A trailing line without `\n` is left for the next poll. If the log
    /// shrank below the offset it was truncated or rotated, and reading
    /// restarts at 0.
    pub async fn poll(&mut self) -> Result<TailBatch> {
        let log_error = |source| SyncError::ChangeLog {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::File::open(&self.path).await.map_err(log_error)?;
        let size = file.metadata().await.map_err(log_error)?.len();

        if size < self.offset {
            warn!(
                "Change log {} shrank from {} to {} bytes, reading from start",
                self.path.display(),
                self.offset,
                size
            );
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(log_error)?;
        let mut appended = Vec::new();
        file.read_to_end(&mut appended).await.map_err(log_error)?;

        let complete = match appended.iter().rposition(|&b| b == b'\n') {
            Some(last) => &appended[..=last],
            None => &[][..],
        };

        let events: Vec<ChangeEvent> = complete
            .split(|&b| b == b'\n')
            .filter_map(|line| self.parser.parse_line(&String::from_utf8_lossy(line)))
            .collect();

        let end_offset = self.offset + complete.len() as u64;
        debug!(
            "Read {} events from {} ({}..{})",
            events.len(),
            self.path.display(),
            self.offset,
            end_offset
        );

        Ok(TailBatch { events, end_offset })
    }

    /// Mark a polled batch as fully processed.
    pub fn commit(&mut self, batch: &TailBatch) {
        self.offset = batch.end_offset;
    }
}
