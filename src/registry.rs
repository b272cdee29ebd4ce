//! Registry of compiled sub-schemas from one schema document.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::error::{LookupError, SchemaError, ValidateError};
use crate::loader::{load_document, Locator, ParsedDocument};
use crate::source_map::SourceMap;
use crate::types::{escape_pointer_segment, Format, LoaderOptions, RegistryOptions};

/// Compiled validators for every named definition of a schema document.
///
/// Built once; read-only afterwards, so it can be shared across threads.
/// The whole-document ("device") validator is compiled on first use and
/// then cached.
pub struct SchemaRegistry {
    document: Value,
    source_map: SourceMap,
    options: RegistryOptions,
    names: Vec<String>,
    fragments: HashMap<String, Validator>,
    device: OnceLock<Validator>,
}

impl SchemaRegistry {
    /// Register every definition of `document` with default options.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidFragment` for the first definition that
    /// fails to compile, carrying its line range in the schema document.
    pub fn new(document: ParsedDocument) -> Result<Self, SchemaError> {
        Self::with_options(document, RegistryOptions::default())
    }

    /// Register every definition of `document`.
    ///
    /// Definitions whose name starts with the comment prefix are skipped.
    /// Registration is all-or-nothing: the first failure aborts.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidDefinitions` if the definitions key does
    /// not hold a mapping and `SchemaError::InvalidFragment` if a
    /// definition fails to compile.
    pub fn with_options(
        document: ParsedDocument,
        options: RegistryOptions,
    ) -> Result<Self, SchemaError> {
        let ParsedDocument {
            value, source_map, ..
        } = document;

        let empty = Map::new();
        let definitions = match value.get(&options.definitions_key) {
            None => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(SchemaError::InvalidDefinitions {
                    key: options.definitions_key.clone(),
                })
            }
        };

        let entries: Vec<(&String, &Value, String)> = definitions
            .iter()
            .filter(|(name, _)| {
                let comment = options.is_comment(name);
                if comment {
                    tracing::trace!(%name, "skipping comment entry");
                }
                !comment
            })
            .map(|(name, fragment)| {
                let pointer = format!(
                    "/{}/{}",
                    escape_pointer_segment(&options.definitions_key),
                    escape_pointer_segment(name)
                );
                (name, fragment, pointer)
            })
            .collect();

        let fail = |name: &str, pointer: &str, message: String| SchemaError::InvalidFragment {
            name: name.to_string(),
            pointer: pointer.to_string(),
            message,
            lines: source_map.get(pointer),
        };

        // Every fragment is checked on its own before any is compiled, so a
        // broken definition is reported under its own name even when a
        // sibling refers to it.
        for (name, fragment, pointer) in &entries {
            jsonschema::meta::validate(fragment).map_err(|e| fail(name, pointer, e.to_string()))?;
        }

        let library = definition_library(&value, &options);
        let mut names = Vec::new();
        let mut fragments = HashMap::new();

        for (name, _, pointer) in &entries {
            let validator = compile_fragment(&library, &options, name)
                .map_err(|e| fail(name, pointer, e.to_string()))?;

            tracing::debug!(%name, "registered schema");
            names.push(name.to_string());
            fragments.insert(name.to_string(), validator);
        }

        tracing::info!(schemas = names.len(), "schema registry ready");

        Ok(Self {
            document: value,
            source_map,
            options,
            names,
            fragments,
            device: OnceLock::new(),
        })
    }

    /// Register the definitions of an in-memory schema document.
    ///
    /// Line ranges in errors refer to the document's pretty-printed JSON.
    pub fn from_value(document: Value) -> Result<Self, SchemaError> {
        let source_map = SourceMap::from_value(&document);
        Self::new(ParsedDocument {
            value: document,
            source_map,
            format: Format::Json,
            origin: "<inline>".to_string(),
        })
    }

    /// Load a schema document from a path or URL and register it.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Load` if the document cannot be loaded, or any
    /// registration error from [`SchemaRegistry::new`].
    pub fn load(source: &str, options: &LoaderOptions) -> Result<Self, SchemaError> {
        let locator = Locator::parse(source)?;
        let document = load_document(&locator, None, options)?;
        Self::new(document)
    }

    /// Look up the validator for `reference`.
    ///
    /// References starting with the device prefix select the whole schema
    /// document; anything else must name a registered definition.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Lookup` for unknown references and
    /// `ValidateError::Schema` if the whole document fails to compile.
    pub fn resolve(&self, reference: &str) -> Result<&Validator, ValidateError> {
        if self.options.is_device(reference) {
            return Ok(self.device()?);
        }

        self.fragments.get(reference).ok_or_else(|| {
            LookupError::UnknownReference {
                reference: reference.to_string(),
            }
            .into()
        })
    }

    fn device(&self) -> Result<&Validator, SchemaError> {
        if let Some(validator) = self.device.get() {
            return Ok(validator);
        }

        let schema = definition_library_with_body(&self.document, &self.options);
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::InvalidDocument {
                message: e.to_string(),
            })?;
        tracing::debug!("compiled device schema");
        Ok(self.device.get_or_init(|| validator))
    }

    /// Registered definition names, in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns true if `name` is a registered definition.
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The schema document the registry was built from.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Source map of the schema document.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("names", &self.names)
            .field("device_compiled", &self.device.get().is_some())
            .finish()
    }
}

/// Compile one definition so that its `#/$defs/...` references resolve
/// against the rest of the document.
fn compile_fragment(
    library: &Value,
    options: &RegistryOptions,
    name: &str,
) -> Result<Validator, jsonschema::ValidationError<'static>> {
    let mut wrapper = library.clone();
    if let Value::Object(map) = &mut wrapper {
        map.insert(
            "$ref".to_string(),
            Value::String(format!(
                "#/{}/{}",
                escape_pointer_segment(&options.definitions_key),
                escape_pointer_segment(name)
            )),
        );
    }
    jsonschema::validator_for(&wrapper)
}

/// `$schema`, `$id` and the definitions (comment entries removed) of a
/// schema document.
fn definition_library(document: &Value, options: &RegistryOptions) -> Value {
    let mut library = Map::new();
    for key in ["$schema", "$id"] {
        if let Some(value) = document.get(key) {
            library.insert(key.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(definitions)) = document.get(&options.definitions_key) {
        library.insert(
            options.definitions_key.clone(),
            Value::Object(strip_comments(definitions, options)),
        );
    }
    Value::Object(library)
}

/// The whole schema document with comment entries removed from its
/// definitions.
fn definition_library_with_body(document: &Value, options: &RegistryOptions) -> Value {
    let mut schema = document.clone();
    if let Some(Value::Object(definitions)) = schema.get_mut(&options.definitions_key) {
        *definitions = strip_comments(definitions, options);
    }
    schema
}

fn strip_comments(definitions: &Map<String, Value>, options: &RegistryOptions) -> Map<String, Value> {
    definitions
        .iter()
        .filter(|(name, _)| !options.is_comment(name))
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect()
}
