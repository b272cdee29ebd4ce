//! Error types for document loading, schema registration and lookup.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Format, LineRange};

/// Errors while obtaining or parsing a document.
///
/// Digest and parse failures are variants here too; use
/// [`LoadError::is_integrity_failure`] and [`LoadError::is_parse_failure`]
/// to tell them apart from IO and network errors.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unsupported locator scheme '{scheme}' in {locator}")]
    UnsupportedScheme { locator: String, scheme: String },

    #[error("invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    // Integrity errors (exit code 2)
    #[error("digest mismatch for {origin}: expected {expected}, computed {actual}")]
    DigestMismatch {
        origin: String,
        expected: String,
        actual: String,
    },

    // Parse errors (exit code 2)
    #[error("{origin} is not valid UTF-8")]
    NotUtf8 { origin: String },

    #[error("invalid JSON in {origin}: {source}")]
    InvalidJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {origin}: {source}")]
    InvalidYaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::UnsupportedScheme { .. }
            | LoadError::InvalidLocator { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }

    /// Returns true if the bytes were obtained but failed digest verification.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, LoadError::DigestMismatch { .. })
    }

    /// Returns true if the bytes were obtained but could not be parsed.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            LoadError::NotUtf8 { .. } | LoadError::InvalidJson { .. } | LoadError::InvalidYaml { .. }
        )
    }

    /// Format the document was being parsed as, for parse failures.
    pub fn format(&self) -> Option<Format> {
        match self {
            LoadError::InvalidJson { .. } => Some(Format::Json),
            LoadError::InvalidYaml { .. } => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Errors while registering the sub-schemas of a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("'{key}' in schema document must be a mapping of named schemas")]
    InvalidDefinitions { key: String },

    #[error("{message} at #{pointer}{}", on_lines(.lines))]
    InvalidFragment {
        name: String,
        pointer: String,
        message: String,
        lines: Option<LineRange>,
    },

    #[error("invalid device schema: {message}")]
    InvalidDocument { message: String },
}

fn on_lines(lines: &Option<LineRange>) -> String {
    match lines {
        Some(range) => format!(" on lines {}", range),
        None => String::new(),
    }
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }

    /// Name of the definition that failed to compile, if any.
    pub fn fragment_name(&self) -> Option<&str> {
        match self {
            SchemaError::InvalidFragment { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Source lines of the failing definition, if known.
    pub fn lines(&self) -> Option<LineRange> {
        match self {
            SchemaError::InvalidFragment { lines, .. } => *lines,
            _ => None,
        }
    }
}

/// A schema reference that names nothing in the registry.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("could not find {reference} in schema definition file")]
    UnknownReference { reference: String },
}

impl LookupError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while validating a document against a schema reference.
///
/// A document that fails validation is not an error; see
/// [`Outcome::Invalid`](crate::Outcome::Invalid).
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Lookup(e) => e.exit_code(),
            ValidateError::Schema(e) => e.exit_code(),
        }
    }
}
