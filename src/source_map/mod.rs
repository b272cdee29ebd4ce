//! Mapping from structural paths back to source lines.
//!
//! A [`SourceMap`] records, for every value reachable in a parsed document,
//! the 1-based line range of the text that produced it. Paths are JSON
//! Pointers (RFC 6901), the same form the validator reports instance paths in.
//!
//! The map is built by re-scanning the original text. JSON and YAML flow
//! collections are handled by the [`flow`] scanner, YAML block structure by
//! [`block`]. Scanning is best-effort: on text it cannot follow the scan
//! stops and whatever was mapped so far is kept. Entries whose path does not
//! resolve in the parsed value are dropped, so values the parser synthesized
//! never point at an unrelated line.

mod block;
mod flow;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{Format, LineRange};

/// Structural path to line-range lookup for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: BTreeMap<String, LineRange>,
}

impl SourceMap {
    /// Build the map for `text`, which was parsed as `format` into `value`.
    pub fn build(text: &str, format: Format, value: &Value) -> Self {
        let mut entries = match format {
            Format::Json => flow::scan_json(text),
            Format::Yaml => block::scan_yaml(text),
        };
        entries.retain(|pointer, _| value.pointer(pointer).is_some());
        tracing::trace!(entries = entries.len(), %format, "built source map");
        Self { entries }
    }

    /// Build a map against the pretty-printed JSON rendering of `value`.
    ///
    /// For values that have no source text of their own.
    pub fn from_value(value: &Value) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::build(&text, Format::Json, value),
            Err(_) => Self::default(),
        }
    }

    /// Line range of the value at `pointer`.
    pub fn get(&self, pointer: &str) -> Option<LineRange> {
        self.entries.get(pointer).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(pointer, range)` pairs in pointer order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, LineRange)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Shared state for the flow and block scanners.
struct Scanner<'a> {
    text: &'a str,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
    entries: BTreeMap<String, LineRange>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            text,
            line_starts,
            entries: BTreeMap::new(),
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    /// 1-based line containing byte `offset`.
    fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Record the value spanning bytes `start..end` (end exclusive).
    fn record_span(&mut self, pointer: &str, start: usize, end: usize) {
        let last = end.saturating_sub(1).max(start);
        let range = LineRange::new(self.line_of(start), self.line_of(last));
        self.entries.insert(pointer.to_string(), range);
    }

    fn record_lines(&mut self, pointer: &str, start: usize, end: usize) {
        self.entries
            .insert(pointer.to_string(), LineRange::new(start, end));
    }

    fn into_entries(self) -> BTreeMap<String, LineRange> {
        self.entries
    }
}

fn child_pointer(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, crate::types::escape_pointer_segment(segment))
}
