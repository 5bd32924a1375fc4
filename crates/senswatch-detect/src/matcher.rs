//! Windowed stream matcher.
//!
//! [`StreamMatcher`] consumes a file's bytes chunk by chunk and produces the
//! same [`MatchTable`] as running every rule over the whole decoded text.
//!
//! Text is buffered until it reaches `overlap + window_bytes`; files smaller
//! than that are scanned exactly once, at end of stream. For larger inputs
//! each rule keeps an absolute resume cursor. A raw match is accepted only if
//! it starts before `window_end - overlap`, where everything that decides the
//! match is already buffered; later matches are deferred to the next window.

use crate::decode::Utf8Decoder;
use crate::rules::{next_cursor, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes kept in front of the smallest cursor so that `^` can only match at
/// the true start of the text.
const RETAIN_CONTEXT: usize = 4;

/// Rule name to matched values, in text order. Rules without matches are
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchTable(BTreeMap<String, Vec<String>>);

impl MatchTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one matched value for a rule.
    pub fn push(&mut self, rule: &str, value: String) {
        self.0.entry(rule.to_string()).or_default().push(value);
    }

    /// Append several values for a rule; no entry is created for none.
    pub fn extend_rule<I>(&mut self, rule: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut values = values.into_iter().peekable();
        if values.peek().is_some() {
            self.0.entry(rule.to_string()).or_default().extend(values);
        }
    }

    /// Values matched by a rule.
    #[must_use]
    pub fn get(&self, rule: &str) -> &[String] {
        self.0.get(rule).map_or(&[], Vec::as_slice)
    }

    /// Iterate `(rule, values)` pairs in rule name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(rule, values)| (rule.as_str(), values.as_slice()))
    }

    /// Per-rule match counts.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.0
            .iter()
            .map(|(rule, values)| (rule.clone(), values.len()))
            .collect()
    }

    /// Total number of matched values across all rules.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Whether no rule matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Run every rule over a complete text.
#[must_use]
pub fn scan_text(rules: &RuleSet, text: &str) -> MatchTable {
    let mut table = MatchTable::new();
    for rule in rules.iter() {
        table.extend_rule(rule.name(), rule.find_all(text));
    }
    table
}

/// Incremental matcher over one file's byte stream.
#[derive(Debug)]
pub struct StreamMatcher<'r> {
    rules: &'r RuleSet,
    decoder: Utf8Decoder,
    buffer: String,
    /// Absolute text offset of `buffer[0]`
    base: usize,
    /// Absolute resume offset per rule, in catalog order
    cursors: Vec<usize>,
    window_bytes: usize,
    settled: usize,
    settled_text: Option<Vec<String>>,
    table: MatchTable,
    finished: bool,
}

impl<'r> StreamMatcher<'r> {
    /// Create a matcher scanning in windows of `window_bytes` new text.
    #[must_use]
    pub fn new(rules: &'r RuleSet, window_bytes: usize) -> Self {
        Self {
            rules,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            base: 0,
            cursors: vec![0; rules.len()],
            window_bytes,
            settled: 0,
            settled_text: None,
            table: MatchTable::new(),
            finished: false,
        }
    }

    /// Also collect each window's newly settled text for
    /// [`take_settled_text`](Self::take_settled_text).
    #[must_use]
    pub fn with_settled_text(mut self) -> Self {
        self.settled_text = Some(Vec::new());
        self
    }

    /// Feed the next chunk of raw bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        self.decoder.decode(chunk, &mut self.buffer);
        if self.buffer.len() >= self.rules.overlap() + self.window_bytes {
            self.scan(false);
        }
    }

    /// Mark end of stream and scan everything still buffered.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.decoder.finish(&mut self.buffer);
        self.scan(true);
        self.finished = true;
    }

    /// Text settled since the last call, one segment per window. Concatenated
    /// over a whole stream the segments equal the decoded text.
    pub fn take_settled_text(&mut self) -> Vec<String> {
        self.settled_text.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Matches accepted so far.
    #[must_use]
    pub fn table(&self) -> &MatchTable {
        &self.table
    }

    /// Consume the matcher, returning its table. Call [`finish`](Self::finish)
    /// first or matches near the end of the stream are lost.
    #[must_use]
    pub fn into_table(self) -> MatchTable {
        self.table
    }

    fn scan(&mut self, eof: bool) {
        let end = self.base + self.buffer.len();
        let limit = if eof {
            end
        } else {
            let rel = self.buffer.len().saturating_sub(self.rules.overlap());
            self.base + floor_char_boundary(&self.buffer, rel)
        };

        let rules = self.rules;
        for (idx, rule) in rules.iter().enumerate() {
            let mut cursor = self.cursors[idx];
            while let Some(raw) = rule.find_at(&self.buffer, cursor - self.base) {
                if !eof && self.base + raw.start >= limit {
                    break;
                }
                let rel = next_cursor(&self.buffer, cursor - self.base, raw.candidate.end());
                cursor = self.base + rel;
                if let Some(value) = rule.accept(raw.candidate.as_str()) {
                    self.table.push(rule.name(), value);
                }
            }
            // No match starts in [cursor, limit): skip ahead.
            self.cursors[idx] = cursor.max(limit);
        }

        if let Some(segments) = self.settled_text.as_mut() {
            if limit > self.settled {
                let from = self.settled - self.base;
                segments.push(self.buffer[from..limit - self.base].to_string());
            }
        }
        self.settled = self.settled.max(limit);

        if !eof {
            self.retain_from(limit);
        }
    }

    fn retain_from(&mut self, limit: usize) {
        let min_cursor = self.cursors.iter().copied().min().unwrap_or(limit);
        let target = min_cursor.min(limit).saturating_sub(RETAIN_CONTEXT);
        if target <= self.base {
            return;
        }
        let cut = floor_char_boundary(&self.buffer, target - self.base);
        self.buffer.drain(..cut);
        self.base += cut;
    }
}

/// Largest char boundary of `text` at or below `idx`.
fn floor_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Match an async byte stream, reading `chunk_bytes` at a time.
pub async fn match_reader<R>(
    rules: &RuleSet,
    reader: &mut R,
    chunk_bytes: usize,
    window_bytes: usize,
) -> std::io::Result<MatchTable>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut matcher = StreamMatcher::new(rules, window_bytes);
    let mut chunk = vec![0u8; chunk_bytes.max(1)];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        matcher.feed(&chunk[..read]);
    }

    matcher.finish();
    Ok(matcher.into_table())
}
