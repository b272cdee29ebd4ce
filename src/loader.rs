//! Document loading from local files and remote URLs.
//!
//! A document is read as raw bytes, optionally checked against an expected
//! SHA-256 digest, parsed as JSON or YAML (chosen by file extension) and
//! paired with a [`SourceMap`] over its text.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::LoadError;
use crate::source_map::SourceMap;
use crate::types::{Format, LineRange, LoaderOptions};

/// Where a document's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A file on local storage.
    Path(PathBuf),
    /// An `http://` or `https://` URL.
    Remote(Url),
}

impl Locator {
    /// Parse a locator: a plain path, a `file://` URI or an HTTP(S) URL.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidLocator` for malformed URIs and
    /// `LoadError::UnsupportedScheme` for any other scheme.
    pub fn parse(source: &str) -> Result<Self, LoadError> {
        if !source.contains("://") {
            return Ok(Locator::Path(PathBuf::from(source)));
        }

        let url = Url::parse(source).map_err(|e| LoadError::InvalidLocator {
            locator: source.to_string(),
            message: e.to_string(),
        })?;

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(Locator::Path)
                .map_err(|()| LoadError::InvalidLocator {
                    locator: source.to_string(),
                    message: "not a local file path".to_string(),
                }),
            "http" | "https" => Ok(Locator::Remote(url)),
            scheme => Err(LoadError::UnsupportedScheme {
                locator: source.to_string(),
                scheme: scheme.to_string(),
            }),
        }
    }

    /// Returns true if loading requires a network fetch.
    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Remote(_))
    }

    /// Format implied by the locator's file extension.
    pub fn format(&self) -> Format {
        match self {
            Locator::Path(path) => Format::from_path(path),
            Locator::Remote(url) => Format::from_path(Path::new(url.path())),
        }
    }

    /// Final path segment, e.g. `param.on_off.yaml`.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Locator::Path(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Locator::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        }
    }
}

impl FromStr for Locator {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Path(path) => write!(f, "{}", path.display()),
            Locator::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A parsed document together with its source map.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub value: Value,
    pub source_map: SourceMap,
    pub format: Format,
    /// Where the document came from, for messages.
    pub origin: String,
}

impl ParsedDocument {
    /// Source lines of the value at `pointer`.
    pub fn lines(&self, pointer: &str) -> Option<LineRange> {
        self.source_map.get(pointer)
    }
}

/// Load and parse the document at `source` with default options.
///
/// # Errors
///
/// See [`load_document`].
pub fn load(source: &str, expected_digest: Option<&str>) -> Result<ParsedDocument, LoadError> {
    let locator = Locator::parse(source)?;
    load_document(&locator, expected_digest, &LoaderOptions::default())
}

/// Load and parse the document at `locator`.
///
/// If `expected_digest` is given, the hex SHA-256 of the raw bytes must
/// match it (case-insensitively) before anything is parsed.
///
/// # Errors
///
/// Returns an IO/network variant of `LoadError` if the bytes cannot be
/// obtained, `LoadError::DigestMismatch` if verification fails, or a parse
/// variant if the text is malformed.
pub fn load_document(
    locator: &Locator,
    expected_digest: Option<&str>,
    options: &LoaderOptions,
) -> Result<ParsedDocument, LoadError> {
    let origin = locator.to_string();
    let bytes = read_bytes(locator, options)?;

    if let Some(expected) = expected_digest {
        verify_digest(&bytes, expected, &origin)?;
    }

    let text = String::from_utf8(bytes).map_err(|_| LoadError::NotUtf8 {
        origin: origin.clone(),
    })?;

    parse_document(&text, locator.format(), &origin)
}

/// Parse document text and build its source map.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidYaml`.
pub fn parse_document(text: &str, format: Format, origin: &str) -> Result<ParsedDocument, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let value: Value = match format {
        Format::Json => serde_json::from_str(text).map_err(|source| LoadError::InvalidJson {
            origin: origin.to_string(),
            source,
        })?,
        Format::Yaml => serde_yaml::from_str(text).map_err(|source| LoadError::InvalidYaml {
            origin: origin.to_string(),
            source,
        })?,
    };

    let source_map = SourceMap::build(text, format, &value);
    tracing::debug!(%origin, %format, mapped = source_map.len(), "parsed document");

    Ok(ParsedDocument {
        value,
        source_map,
        format,
        origin: origin.to_string(),
    })
}

/// Obtain the raw bytes behind `locator`.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound`/`ReadError` for local files and
/// `LoadError::NetworkError` for failed or non-2xx fetches.
pub fn read_bytes(locator: &Locator, options: &LoaderOptions) -> Result<Vec<u8>, LoadError> {
    match locator {
        Locator::Path(path) => read_file(path),
        #[cfg(feature = "remote")]
        Locator::Remote(url) => fetch(url, options),
        #[cfg(not(feature = "remote"))]
        Locator::Remote(url) => {
            let _ = options;
            Err(LoadError::UnsupportedScheme {
                locator: url.to_string(),
                scheme: url.scheme().to_string(),
            })
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read document");
    Ok(bytes)
}

/// Fetch a document over HTTP(S). A single attempt is made.
#[cfg(feature = "remote")]
fn fetch(url: &Url, options: &LoaderOptions) -> Result<Vec<u8>, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(network_error)?;

    let response = client.get(url.clone()).send().map_err(network_error)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network_error)?;

    let bytes = response.bytes().map_err(network_error)?;
    tracing::debug!(%url, bytes = bytes.len(), "fetched document");
    Ok(bytes.to_vec())
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Check `bytes` against a hex SHA-256 digest, ignoring case.
///
/// # Errors
///
/// Returns `LoadError::DigestMismatch` if the digests differ.
pub fn verify_digest(bytes: &[u8], expected: &str, origin: &str) -> Result<(), LoadError> {
    let actual = sha256_hex(bytes);
    let expected = expected.trim();
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }

    tracing::warn!(%origin, %expected, %actual, "digest mismatch");
    Err(LoadError::DigestMismatch {
        origin: origin.to_string(),
        expected: expected.to_string(),
        actual,
    })
}
