//! Validation of parsed documents against registered schemas.

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ValidateError;
use crate::loader::ParsedDocument;
use crate::registry::SchemaRegistry;
use crate::source_map::SourceMap;
use crate::types::LineRange;

/// Category of the schema keyword a violation came from.
///
/// Numeric bounds carry the limit that was exceeded.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Maximum { limit: Value },
    ExclusiveMaximum { limit: Value },
    Minimum { limit: Value },
    ExclusiveMinimum { limit: Value },
    MaxLength { limit: Value },
    MinLength { limit: Value },
    MaxItems { limit: Value },
    MinItems { limit: Value },
    Enum,
    Const,
    Type,
    Required,
    AdditionalProperties,
    Pattern,
    Format,
    /// Any other keyword, by name.
    Other(String),
}

impl Keyword {
    fn from_error(error: &ValidationError<'_>) -> Self {
        match &error.kind {
            ValidationErrorKind::Maximum { limit } => Keyword::Maximum {
                limit: limit_value(limit),
            },
            ValidationErrorKind::ExclusiveMaximum { limit } => Keyword::ExclusiveMaximum {
                limit: limit_value(limit),
            },
            ValidationErrorKind::Minimum { limit } => Keyword::Minimum {
                limit: limit_value(limit),
            },
            ValidationErrorKind::ExclusiveMinimum { limit } => Keyword::ExclusiveMinimum {
                limit: limit_value(limit),
            },
            ValidationErrorKind::MaxLength { limit } => Keyword::MaxLength {
                limit: limit_value(limit),
            },
            ValidationErrorKind::MinLength { limit } => Keyword::MinLength {
                limit: limit_value(limit),
            },
            ValidationErrorKind::MaxItems { limit } => Keyword::MaxItems {
                limit: limit_value(limit),
            },
            ValidationErrorKind::MinItems { limit } => Keyword::MinItems {
                limit: limit_value(limit),
            },
            ValidationErrorKind::Enum { .. } => Keyword::Enum,
            ValidationErrorKind::Constant { .. } => Keyword::Const,
            ValidationErrorKind::Type { .. } => Keyword::Type,
            ValidationErrorKind::Required { .. } => Keyword::Required,
            ValidationErrorKind::AdditionalProperties { .. } => Keyword::AdditionalProperties,
            ValidationErrorKind::Pattern { .. } => Keyword::Pattern,
            ValidationErrorKind::Format { .. } => Keyword::Format,
            _ => {
                let schema_path = error.schema_path.to_string();
                let name = schema_path.rsplit('/').next().unwrap_or_default();
                Keyword::Other(name.to_string())
            }
        }
    }

    /// Schema keyword name, e.g. `maximum`.
    pub fn name(&self) -> &str {
        match self {
            Keyword::Maximum { .. } => "maximum",
            Keyword::ExclusiveMaximum { .. } => "exclusiveMaximum",
            Keyword::Minimum { .. } => "minimum",
            Keyword::ExclusiveMinimum { .. } => "exclusiveMinimum",
            Keyword::MaxLength { .. } => "maxLength",
            Keyword::MinLength { .. } => "minLength",
            Keyword::MaxItems { .. } => "maxItems",
            Keyword::MinItems { .. } => "minItems",
            Keyword::Enum => "enum",
            Keyword::Const => "const",
            Keyword::Type => "type",
            Keyword::Required => "required",
            Keyword::AdditionalProperties => "additionalProperties",
            Keyword::Pattern => "pattern",
            Keyword::Format => "format",
            Keyword::Other(name) => name,
        }
    }

    /// The bound a numeric-limit keyword was checked against.
    pub fn limit(&self) -> Option<&Value> {
        match self {
            Keyword::Maximum { limit }
            | Keyword::ExclusiveMaximum { limit }
            | Keyword::Minimum { limit }
            | Keyword::ExclusiveMinimum { limit }
            | Keyword::MaxLength { limit }
            | Keyword::MinLength { limit }
            | Keyword::MaxItems { limit }
            | Keyword::MinItems { limit } => Some(limit),
            _ => None,
        }
    }
}

fn limit_value<T: Serialize>(limit: &T) -> Value {
    serde_json::to_value(limit).unwrap_or(Value::Null)
}

/// One structural violation reported by a validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    pub keyword: Keyword,
    pub message: String,
}

/// A violation located in the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    pub keyword: String,
    #[serde(rename = "lineRange", skip_serializing_if = "Option::is_none")]
    pub lines: Option<LineRange>,
    /// Bound value for numeric-limit keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,
}

impl Diagnostic {
    /// Attach source lines to `violation`.
    pub fn locate(violation: Violation, source_map: &SourceMap) -> Self {
        Self {
            lines: source_map.get(&violation.path),
            limit: violation.keyword.limit().cloned(),
            keyword: violation.keyword.name().to_string(),
            message: violation.message,
            path: violation.path,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.path)?;
        if let Some(lines) = self.lines {
            write!(f, " on lines {}", lines)?;
        }
        Ok(())
    }
}

/// Result of validating a well-formed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The document satisfies the schema; `data` is the document unchanged.
    Valid { data: Value },
    /// The document violates the schema, in validator order.
    Invalid { diagnostics: Vec<Diagnostic> },
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Outcome::Valid { data } => Some(data),
            Outcome::Invalid { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Outcome::Valid { .. } => &[],
            Outcome::Invalid { diagnostics } => diagnostics,
        }
    }

    /// Returns the exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            1
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 2)?;
        state.serialize_field("valid", &self.is_valid())?;
        match self {
            Outcome::Valid { data } => state.serialize_field("data", data)?,
            Outcome::Invalid { diagnostics } => {
                state.serialize_field("diagnostics", diagnostics)?
            }
        }
        state.end()
    }
}

/// Validate `document` against the schema named by `reference`.
///
/// # Errors
///
/// Returns `ValidateError::Lookup` if `reference` names no schema and
/// `ValidateError::Schema` if the device schema cannot be compiled. A
/// document that fails validation is `Ok(Outcome::Invalid)`.
pub fn validate(
    registry: &SchemaRegistry,
    reference: &str,
    document: &ParsedDocument,
) -> Result<Outcome, ValidateError> {
    let validator = registry.resolve(reference)?;
    let outcome = check(validator, &document.value, &document.source_map);
    tracing::debug!(
        %reference,
        origin = %document.origin,
        valid = outcome.is_valid(),
        diagnostics = outcome.diagnostics().len(),
        "validated document"
    );
    Ok(outcome)
}

/// Run `validator` over `value` and locate each violation with `source_map`.
pub fn check(validator: &Validator, value: &Value, source_map: &SourceMap) -> Outcome {
    let diagnostics: Vec<Diagnostic> = violations(validator, value)
        .into_iter()
        .map(|v| Diagnostic::locate(v, source_map))
        .collect();

    if diagnostics.is_empty() {
        Outcome::Valid {
            data: value.clone(),
        }
    } else {
        Outcome::Invalid { diagnostics }
    }
}

/// Structural violations of `value`, in the order the validator reports them.
pub fn violations(validator: &Validator, value: &Value) -> Vec<Violation> {
    validator
        .iter_errors(value)
        .map(|e| Violation {
            path: e.instance_path.to_string(),
            keyword: Keyword::from_error(&e),
            message: e.to_string(),
        })
        .collect()
}
