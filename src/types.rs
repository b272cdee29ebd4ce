//! Core types shared by the loader, registry and validator.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Key holding the named sub-schemas of a schema document.
pub const DEFINITIONS_KEY: &str = "$defs";

/// Definition names starting with this prefix are comments, not schemas.
pub const COMMENT_PREFIX: &str = "$comment";

/// References starting with this prefix select the whole device schema.
pub const DEVICE_PREFIX: &str = "device";

/// Textual serialization of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Infer the format from a file extension: `.yaml`/`.yml` is YAML,
    /// anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }

    /// Guess the format from document content.
    ///
    /// Only meant for front ends handed raw text with no file name. The
    /// loader itself always goes by extension.
    pub fn sniff(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Format::Json;
        }
        if trimmed.contains("---") || trimmed.starts_with("- ") || looks_like_mapping(trimmed) {
            return Format::Yaml;
        }
        Format::Json
    }

    /// Parse a format name (`json`, `yaml` or `yml`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("JSON"),
            Format::Yaml => f.write_str("YAML"),
        }
    }
}

fn looks_like_mapping(text: &str) -> bool {
    let first = text.lines().next().unwrap_or("");
    match first.find(':') {
        Some(idx) => {
            let key = &first[..idx];
            !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Inclusive, 1-based span of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns true if `line` falls within the range.
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Options for loading documents.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Timeout applied to remote fetches.
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote fetch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options controlling how a schema document is split into sub-schemas.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Key of the named-definitions mapping.
    pub definitions_key: String,
    /// Definitions whose name starts with this prefix are skipped.
    pub comment_prefix: String,
    /// References starting with this prefix select the whole document.
    pub device_prefix: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            definitions_key: DEFINITIONS_KEY.to_string(),
            comment_prefix: COMMENT_PREFIX.to_string(),
            device_prefix: DEVICE_PREFIX.to_string(),
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definitions_key(mut self, key: impl Into<String>) -> Self {
        self.definitions_key = key.into();
        self
    }

    pub fn comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = prefix.into();
        self
    }

    pub fn device_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.device_prefix = prefix.into();
        self
    }

    /// Returns true if the definition `name` is a comment entry.
    pub fn is_comment(&self, name: &str) -> bool {
        name.starts_with(&self.comment_prefix)
    }

    /// Returns true if `reference` selects the whole device schema.
    pub fn is_device(&self, reference: &str) -> bool {
        reference.starts_with(&self.device_prefix)
    }
}

/// Escape a single JSON Pointer segment (RFC 6901).
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/param.on_off.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a/param.YML")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("device.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("no_extension")), Format::Json);
    }

    #[test]
    fn format_sniffing() {
        assert_eq!(Format::sniff("  {\"a\": 1}"), Format::Json);
        assert_eq!(Format::sniff("[1, 2]"), Format::Json);
        assert_eq!(Format::sniff("---\na: 1"), Format::Yaml);
        assert_eq!(Format::sniff("type: STRING\n"), Format::Yaml);
        assert_eq!(Format::sniff("- one\n- two"), Format::Yaml);
        assert_eq!(Format::sniff("\"on\""), Format::Json);
    }

    #[test]
    fn format_parse() {
        assert_eq!(Format::parse("YAML"), Some(Format::Yaml));
        assert_eq!(Format::parse("yml"), Some(Format::Yaml));
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("toml"), None);
    }

    #[test]
    fn registry_options_prefixes() {
        let opts = RegistryOptions::new();
        assert!(opts.is_comment("$comment"));
        assert!(opts.is_comment("$comment_params"));
        assert!(!opts.is_comment("param"));
        assert!(opts.is_device("device"));
        assert!(opts.is_device("device_info"));
        assert!(!opts.is_device("param"));
    }

    #[test]
    fn pointer_escaping() {
        assert_eq!(escape_pointer_segment("a/b"), "a~1b");
        assert_eq!(escape_pointer_segment("a~b"), "a~0b");
        assert_eq!(escape_pointer_segment("plain"), "plain");
    }

    #[test]
    fn line_range_display_and_contains() {
        let range = LineRange::new(3, 7);
        assert_eq!(range.to_string(), "3-7");
        assert!(range.contains(3));
        assert!(range.contains(7));
        assert!(!range.contains(8));
    }
}
