//! Catena Schema Validator
//!
//! Validates Catena device and parameter descriptions against the named
//! sub-schemas of a schema definition document, reporting every violation
//! with the lines of the input it came from.
//!
//! # Example
//!
//! ```
//! use catena_schema::{parse_document, validate, Format, SchemaRegistry};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::from_value(json!({
//!     "$defs": {
//!         "on_off": { "type": "string", "enum": ["on", "off"] }
//!     }
//! }))
//! .unwrap();
//!
//! let input = parse_document("\"maybe\"", Format::Json, "inline").unwrap();
//! let outcome = validate(&registry, "on_off", &input).unwrap();
//!
//! assert!(!outcome.is_valid());
//! assert_eq!(outcome.diagnostics()[0].path, "");
//! assert_eq!(outcome.diagnostics()[0].lines.unwrap().start, 1);
//! ```
//!
//! # Schema references
//!
//! | Reference | Validated against |
//! |-----------|-------------------|
//! | starts with `device` | the whole schema document |
//! | any other registered name | `$defs/<name>` |
//! | `$comment...` | never registered |
//!
//! # Input formats
//!
//! Documents are JSON unless the locator ends in `.yaml` or `.yml`. Both
//! formats produce the same structured value and the same JSON Pointer
//! paths in diagnostics.

mod error;
mod loader;
mod registry;
mod source_map;
mod types;
mod validator;

pub use error::{LoadError, LookupError, SchemaError, ValidateError};
pub use loader::{
    load, load_document, parse_document, read_bytes, sha256_hex, verify_digest, Locator,
    ParsedDocument,
};
pub use registry::SchemaRegistry;
pub use source_map::SourceMap;
pub use types::{
    escape_pointer_segment, Format, LineRange, LoaderOptions, RegistryOptions, COMMENT_PREFIX,
    DEFAULT_HTTP_TIMEOUT, DEFINITIONS_KEY, DEVICE_PREFIX,
};
pub use validator::{check, validate, violations, Diagnostic, Keyword, Outcome, Violation};
