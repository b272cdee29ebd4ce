//! Flow-style scanning: JSON documents and YAML `[...]` / `{...}` collections.

use std::collections::BTreeMap;

use super::{child_pointer, Scanner};
use crate::types::LineRange;

/// Scan a complete JSON document.
pub(super) fn scan_json(text: &str) -> BTreeMap<String, LineRange> {
    let mut scanner = Scanner::new(text);
    let start = scanner.skip_space(text.strip_prefix('\u{feff}').map_or(0, |_| 3));
    scanner.flow_value(start, "");
    scanner.into_entries()
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn ends_plain(next: Option<u8>) -> bool {
    match next {
        None => true,
        Some(b) => is_space(b) || matches!(b, b',' | b']' | b'}'),
    }
}

impl Scanner<'_> {
    /// Skip whitespace, line breaks and `#` comments.
    pub(super) fn skip_space(&self, mut pos: usize) -> usize {
        let bytes = self.bytes();
        while pos < bytes.len() {
            match bytes[pos] {
                b if is_space(b) => pos += 1,
                b'#' if pos == 0 || is_space(bytes[pos - 1]) => {
                    while pos < bytes.len() && bytes[pos] != b'\n' {
                        pos += 1;
                    }
                }
                _ => break,
            }
        }
        pos
    }

    /// Scan the value starting at `pos`, recording it and everything inside
    /// it. Returns the offset just past the value, or `None` if the text
    /// could not be followed.
    pub(super) fn flow_value(&mut self, pos: usize, pointer: &str) -> Option<usize> {
        let end = match *self.bytes().get(pos)? {
            b'{' => return self.flow_mapping(pos, pointer),
            b'[' => return self.flow_sequence(pos, pointer),
            b'"' => self.double_quoted(pos)?,
            b'\'' => self.single_quoted(pos)?,
            _ => self.plain(pos)?,
        };
        self.record_span(pointer, pos, end);
        Some(end)
    }

    fn flow_mapping(&mut self, open: usize, pointer: &str) -> Option<usize> {
        let mut pos = self.skip_space(open + 1);
        loop {
            if *self.bytes().get(pos)? == b'}' {
                self.record_span(pointer, open, pos + 1);
                return Some(pos + 1);
            }

            let (key, after_key) = self.flow_key(pos)?;
            let child = child_pointer(pointer, &key);
            let key_start = pos;
            pos = self.skip_space(after_key);

            if self.bytes().get(pos) == Some(&b':') {
                pos = self.skip_space(pos + 1);
                match *self.bytes().get(pos)? {
                    // `{a: , b: 1}` and `{a:}` leave the value empty (null)
                    b',' | b'}' => self.record_span(&child, key_start, after_key),
                    _ => {
                        let end = self.flow_value(pos, &child)?;
                        pos = self.skip_space(end);
                    }
                }
            } else {
                self.record_span(&child, key_start, after_key);
            }

            match *self.bytes().get(pos)? {
                b',' => pos = self.skip_space(pos + 1),
                b'}' => {}
                _ => return None,
            }
        }
    }

    fn flow_sequence(&mut self, open: usize, pointer: &str) -> Option<usize> {
        let mut pos = self.skip_space(open + 1);
        let mut index = 0usize;
        loop {
            if *self.bytes().get(pos)? == b']' {
                self.record_span(pointer, open, pos + 1);
                return Some(pos + 1);
            }

            let child = format!("{}/{}", pointer, index);
            let end = self.flow_value(pos, &child)?;
            pos = self.skip_space(end);
            index += 1;

            match *self.bytes().get(pos)? {
                b',' => pos = self.skip_space(pos + 1),
                b']' => {}
                _ => return None,
            }
        }
    }

    /// Scan a mapping key, returning its decoded text and the offset past it.
    fn flow_key(&self, pos: usize) -> Option<(String, usize)> {
        let end = match *self.bytes().get(pos)? {
            b'"' => {
                let end = self.double_quoted(pos)?;
                return Some((decode_double(&self.text[pos..end]), end));
            }
            b'\'' => {
                let end = self.single_quoted(pos)?;
                return Some((decode_single(&self.text[pos..end]), end));
            }
            _ => self.plain(pos)?,
        };
        Some((self.text[pos..end].to_string(), end))
    }

    /// Offset just past the closing quote of a double-quoted scalar.
    pub(super) fn double_quoted(&self, open: usize) -> Option<usize> {
        let bytes = self.bytes();
        let mut pos = open + 1;
        while pos < bytes.len() {
            match bytes[pos] {
                b'\\' => pos += 2,
                b'"' => return Some(pos + 1),
                _ => pos += 1,
            }
        }
        None
    }

    /// Offset just past the closing quote of a single-quoted scalar.
    pub(super) fn single_quoted(&self, open: usize) -> Option<usize> {
        let bytes = self.bytes();
        let mut pos = open + 1;
        while pos < bytes.len() {
            if bytes[pos] == b'\'' {
                if bytes.get(pos + 1) == Some(&b'\'') {
                    pos += 2;
                    continue;
                }
                return Some(pos + 1);
            }
            pos += 1;
        }
        None
    }

    /// End of a plain scalar inside a flow context, trailing blanks excluded.
    fn plain(&self, start: usize) -> Option<usize> {
        let bytes = self.bytes();
        let mut pos = start;
        while pos < bytes.len() {
            match bytes[pos] {
                b',' | b']' | b'}' | b'\n' | b'\r' => break,
                b':' if ends_plain(bytes.get(pos + 1).copied()) => break,
                b'#' if pos > start && is_space(bytes[pos - 1]) => break,
                _ => pos += 1,
            }
        }
        while pos > start && matches!(bytes[pos - 1], b' ' | b'\t') {
            pos -= 1;
        }
        (pos > start).then_some(pos)
    }
}

/// Decode a double-quoted scalar including its quotes.
pub(super) fn decode_double(raw: &str) -> String {
    serde_json::from_str::<String>(raw)
        .unwrap_or_else(|_| raw[1..raw.len().saturating_sub(1).max(1)].to_string())
}

/// Decode a single-quoted scalar including its quotes.
pub(super) fn decode_single(raw: &str) -> String {
    raw[1..raw.len().saturating_sub(1).max(1)].replace("''", "'")
}
