//! YAML block structure: indentation-scoped mappings and sequences.
//!
//! The scanner walks content lines (blank lines, comment lines, directives
//! and document markers are dropped up front) and uses each line's
//! indentation to decide where a collection ends. Anything in flow style is
//! handed to the flow scanner. Only the first document of a stream is mapped.

use std::collections::BTreeMap;

use super::flow::{decode_double, decode_single};
use super::{child_pointer, Scanner};
use crate::types::LineRange;

/// Scan a YAML document.
pub(super) fn scan_yaml(text: &str) -> BTreeMap<String, LineRange> {
    let lines = content_lines(text);
    let mut parser = BlockParser {
        scan: Scanner::new(text),
        lines,
    };
    if let Some(first) = parser.lines.first().copied() {
        parser.node(0, first.start, -1, "", false);
    }
    parser.scan.into_entries()
}

/// One non-blank, non-comment line.
#[derive(Debug, Clone, Copy)]
struct Line {
    /// 1-based line number.
    number: usize,
    /// Byte offset of the first byte of the line.
    base: usize,
    /// Leading spaces.
    indent: usize,
    /// Byte offset of the first content byte.
    start: usize,
    /// Byte offset past the last content byte, trailing comment excluded.
    end: usize,
}

fn content_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut base = 0;
    for (idx, raw) in text.split('\n').enumerate() {
        let line_base = base;
        base += raw.len() + 1;

        let body = raw.trim_end_matches('\r');
        let indent = body.len() - body.trim_start_matches(' ').len();
        let mut content = &body[indent..];
        let mut start = line_base + indent;

        if content.is_empty() || content.starts_with('#') || content.starts_with('%') {
            continue;
        }
        if content == "---" || content == "..." {
            continue;
        }
        if let Some(rest) = content.strip_prefix("--- ") {
            let trimmed = rest.trim_start();
            start += content.len() - trimmed.len();
            content = trimmed;
        }

        let len = strip_comment(content).len();
        if len == 0 {
            continue;
        }
        lines.push(Line {
            number: idx + 1,
            base: line_base,
            indent,
            start,
            end: start + len,
        });
    }
    lines
}

/// Content with any trailing `# comment` and trailing blanks removed.
fn strip_comment(content: &str) -> &str {
    let bytes = content.as_bytes();
    let mut quote: Option<u8> = None;
    let mut cut = bytes.len();
    for (i, &b) in bytes.iter().enumerate() {
        let prev = if i == 0 { None } else { Some(bytes[i - 1]) };
        match quote {
            Some(q) if b == q && !(q == b'"' && prev == Some(b'\\')) => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' if prev.map_or(true, |p| b" \t[{,:-".contains(&p)) => {
                    quote = Some(b)
                }
                b'#' if prev.map_or(true, |p| p == b' ' || p == b'\t') => {
                    cut = i;
                    break;
                }
                _ => {}
            },
        }
    }
    content[..cut].trim_end_matches([' ', '\t'])
}

fn is_sequence_entry(s: &str) -> bool {
    s == "-" || s.starts_with("- ") || s.starts_with("-\t")
}

/// If `s` starts a block mapping entry, the decoded key and the offset of
/// its `:` indicator within `s`.
fn mapping_key(s: &str) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    let (key, after) = match *bytes.first()? {
        b'"' | b'\'' => {
            let quote = bytes[0];
            let mut pos = 1;
            loop {
                match *bytes.get(pos)? {
                    b'\\' if quote == b'"' => pos += 2,
                    b'\'' if quote == b'\'' && bytes.get(pos + 1) == Some(&b'\'') => pos += 2,
                    b if b == quote => break,
                    _ => pos += 1,
                }
            }
            let raw = &s[..=pos];
            let key = if quote == b'"' {
                decode_double(raw)
            } else {
                decode_single(raw)
            };
            (key, pos + 1)
        }
        b'[' | b'{' | b'?' | b'|' | b'>' => return None,
        _ => {
            let colon = (0..bytes.len()).find(|&i| {
                bytes[i] == b':'
                    && matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t'))
            })?;
            let key = s[..colon].trim_end();
            if key.is_empty() {
                return None;
            }
            return Some((key.to_string(), colon));
        }
    };

    let gap = s[after..].len() - s[after..].trim_start().len();
    let colon = after + gap;
    let ok = bytes.get(colon) == Some(&b':')
        && matches!(bytes.get(colon + 1), None | Some(b' ') | Some(b'\t'));
    ok.then_some((key, colon))
}

struct BlockParser<'a> {
    scan: Scanner<'a>,
    lines: Vec<Line>,
}

/// Where scanning resumes and the last line of the value just scanned.
type Scanned = (usize, usize);

impl BlockParser<'_> {
    fn content(&self, idx: usize) -> &str {
        let line = self.lines[idx];
        &self.scan.text[line.start..line.end]
    }

    /// Skip blanks between `pos` and the end of line `idx`.
    fn skip_blanks(&self, idx: usize, mut pos: usize) -> usize {
        let bytes = self.scan.bytes();
        while pos < self.lines[idx].end && matches!(bytes[pos], b' ' | b'\t') {
            pos += 1;
        }
        pos
    }

    /// Skip `&anchor` and `!tag` node properties.
    fn skip_properties(&self, idx: usize, mut pos: usize) -> usize {
        let bytes = self.scan.bytes();
        let end = self.lines[idx].end;
        while pos < end && matches!(bytes[pos], b'&' | b'!') {
            while pos < end && !matches!(bytes[pos], b' ' | b'\t') {
                pos += 1;
            }
            pos = self.skip_blanks(idx, pos);
        }
        pos
    }

    /// Index of the first content line starting at or after byte `offset`.
    fn line_after(&self, idx: usize, offset: usize) -> usize {
        (idx + 1..self.lines.len())
            .find(|&j| self.lines[j].start >= offset)
            .unwrap_or(self.lines.len())
    }

    /// Scan the node starting at byte `pos` on line `idx`.
    ///
    /// `parent` is the indentation of the enclosing collection (-1 at the
    /// top level). `in_mapping` allows a value written on the following
    /// lines to be a sequence at the parent's own indentation.
    fn node(
        &mut self,
        idx: usize,
        pos: usize,
        parent: isize,
        pointer: &str,
        in_mapping: bool,
    ) -> Option<Scanned> {
        let line = self.lines[idx];
        let pos = self.skip_properties(idx, pos);

        if pos >= line.end {
            return self.node_below(idx, parent, pointer, in_mapping);
        }

        let column = pos - line.base;
        let text = self.scan.text;
        let first = text.as_bytes()[pos];
        let rest = &text[pos..line.end];

        if is_sequence_entry(rest) {
            return self.sequence(idx, pos, column, pointer);
        }
        match first {
            b'[' | b'{' => {
                let end = self.scan.flow_value(pos, pointer)?;
                let last = self.scan.line_of(end.saturating_sub(1));
                Some((self.line_after(idx, end), last))
            }
            b'|' | b'>' => {
                let last = self.continuation(idx, parent);
                let end_line = self.lines[last].number;
                self.scan.record_lines(pointer, line.number, end_line);
                Some((last + 1, end_line))
            }
            _ if mapping_key(rest).is_some() => self.mapping(idx, pos, column, pointer),
            b'"' | b'\'' => {
                let end = if first == b'"' {
                    self.scan.double_quoted(pos)?
                } else {
                    self.scan.single_quoted(pos)?
                };
                self.scan.record_span(pointer, pos, end);
                let last = self.scan.line_of(end - 1);
                Some((self.line_after(idx, end), last))
            }
            _ => {
                let last = self.continuation(idx, parent);
                let end_line = self.lines[last].number;
                self.scan.record_lines(pointer, line.number, end_line);
                Some((last + 1, end_line))
            }
        }
    }

    /// A value left empty on its own line: either nested on the following
    /// lines or null.
    fn node_below(
        &mut self,
        idx: usize,
        parent: isize,
        pointer: &str,
        in_mapping: bool,
    ) -> Option<Scanned> {
        let next = idx + 1;
        if let Some(line) = self.lines.get(next).copied() {
            let indent = line.indent as isize;
            if indent > parent || (in_mapping && indent == parent && is_sequence_entry(self.content(next))) {
                return self.node(next, line.start, parent, pointer, false);
            }
        }
        let number = self.lines[idx].number;
        self.scan.record_lines(pointer, number, number);
        Some((next, number))
    }

    /// Last line index of a multi-line scalar starting on line `idx`.
    fn continuation(&self, idx: usize, parent: isize) -> usize {
        let mut last = idx;
        while let Some(line) = self.lines.get(last + 1) {
            if line.indent as isize <= parent {
                break;
            }
            last += 1;
        }
        last
    }

    fn mapping(&mut self, idx: usize, pos: usize, indent: usize, pointer: &str) -> Option<Scanned> {
        let start_line = self.lines[idx].number;
        let (mut i, mut p) = (idx, pos);
        loop {
            let end = self.lines[i].end;
            let (key, colon) = mapping_key(&self.scan.text[p..end])?;
            let child = child_pointer(pointer, &key);
            let value = self.skip_blanks(i, p + colon + 1);

            let (next, last) = self.node(i, value, indent as isize, &child, true)?;

            let continues = self.lines.get(next).is_some_and(|line| {
                let content = self.content(next);
                line.indent == indent && !is_sequence_entry(content) && mapping_key(content).is_some()
            });
            if !continues {
                self.scan.record_lines(pointer, start_line, last);
                return Some((next, last));
            }
            i = next;
            p = self.lines[next].start;
        }
    }

    fn sequence(&mut self, idx: usize, pos: usize, indent: usize, pointer: &str) -> Option<Scanned> {
        let start_line = self.lines[idx].number;
        let (mut i, mut p) = (idx, pos);
        let mut index = 0usize;
        loop {
            let child = format!("{}/{}", pointer, index);
            let item = self.skip_blanks(i, p + 1);

            let (next, last) = self.node(i, item, indent as isize, &child, false)?;
            index += 1;

            let continues = self
                .lines
                .get(next)
                .is_some_and(|line| line.indent == indent && is_sequence_entry(self.content(next)));
            if !continues {
                self.scan.record_lines(pointer, start_line, last);
                return Some((next, last));
            }
            i = next;
            p = self.lines[next].start;
        }
    }
}
