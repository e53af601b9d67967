//! Error types for each stage of template generation.
//!
//! Construction errors ([`SchemaError`]) are raised eagerly by the builder.
//! Validation errors ([`ValidationError`]) are collected and reported as a
//! batch. [`SerializationError`] only fires on values JSON cannot carry.

use serde_json::json;

/// A malformed parameter, mapping, resource or output, rejected while the
/// template is being built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("{kind} '{resource}' is missing required property '{property}'")]
    MissingProperty {
        kind: &'static str,
        resource: String,
        property: &'static str,
    },

    #[error(
        "{kind} '{resource}' property '{property}' has value '{value}', expected one of: {}",
        .allowed.join(", ")
    )]
    InvalidEnumValue {
        kind: &'static str,
        resource: String,
        property: &'static str,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("logical name '{name}' must be non-empty and alphanumeric")]
    InvalidLogicalName { name: String },

    #[error("logical name '{name}' is already declared as a {existing}")]
    DuplicateLogicalName { name: String, existing: &'static str },

    #[error("parameter '{parameter}' field '{field}' is invalid: {message}")]
    InvalidParameter {
        parameter: String,
        field: &'static str,
        message: String,
    },

    #[error("mapping '{mapping}' has no rows")]
    EmptyMapping { mapping: String },

    #[error(
        "mapping '{mapping}' row '{row}' has columns [{}], expected [{}]",
        .found.join(", "),
        .expected.join(", ")
    )]
    RaggedMapping {
        mapping: String,
        row: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl SchemaError {
    /// The field the error is about, for callers that want to point at it.
    pub fn field(&self) -> &str {
        match self {
            SchemaError::MissingProperty { property, .. } => property,
            SchemaError::InvalidEnumValue { property, .. } => property,
            SchemaError::InvalidLogicalName { .. } => "LogicalName",
            SchemaError::DuplicateLogicalName { .. } => "LogicalName",
            SchemaError::InvalidParameter { field, .. } => field,
            SchemaError::EmptyMapping { .. } => "Rows",
            SchemaError::RaggedMapping { row, .. } => row,
        }
    }
}

/// What a reference was expected to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Parameter,
    Mapping,
    Resource,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetKind::Parameter => "parameter",
            TargetKind::Mapping => "mapping",
            TargetKind::Resource => "resource",
        };
        f.write_str(s)
    }
}

/// A problem found by the validator. Every field named `at` is a dotted
/// location inside the template, e.g. `Resources.myLaunchConfig.Properties.KeyName`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{at}: {target} '{name}' is not declared")]
    ReferenceNotFound {
        at: String,
        target: TargetKind,
        name: String,
    },

    #[error("{at}: mapping '{mapping}' has no row '{key}'")]
    UnknownMapKey {
        at: String,
        mapping: String,
        key: String,
    },

    #[error("{at}: mapping '{mapping}' has no column '{column}'")]
    UnknownMapColumn {
        at: String,
        mapping: String,
        column: String,
    },

    #[error("{at}: {kind} '{resource}' has no attribute '{attribute}'")]
    UnknownAttribute {
        at: String,
        resource: String,
        kind: &'static str,
        attribute: String,
    },

    #[error(
        "{at}: '{function}' is not a supported intrinsic call or its arguments are malformed"
    )]
    UnsupportedIntrinsic { at: String, function: String },

    #[error("format version '{version}' is not supported")]
    UnsupportedFormatVersion { version: String },

    #[error("template declares no resources")]
    NoResources,

    #[error("description is {length} characters long; the limit is {max}")]
    DescriptionTooLong { length: usize, max: usize },

    #[error(
        "parameter '{parameter}' default '{default}' is not one of its allowed values"
    )]
    DefaultNotAllowed { parameter: String, default: String },

    #[error("cyclic reference detected: {}", .cycle.join(" \u{2192} "))]
    CyclicReference { cycle: Vec<String> },
}

impl ValidationError {
    /// The logical name the error is about.
    pub fn subject(&self) -> &str {
        match self {
            ValidationError::ReferenceNotFound { name, .. } => name,
            ValidationError::UnknownMapKey { mapping, .. } => mapping,
            ValidationError::UnknownMapColumn { mapping, .. } => mapping,
            ValidationError::UnknownAttribute { resource, .. } => resource,
            ValidationError::UnsupportedIntrinsic { function, .. } => function,
            ValidationError::UnsupportedFormatVersion { version } => version,
            ValidationError::NoResources => "Resources",
            ValidationError::DescriptionTooLong { .. } => "Description",
            ValidationError::DefaultNotAllowed { parameter, .. } => parameter,
            ValidationError::CyclicReference { cycle } => {
                cycle.first().map(String::as_str).unwrap_or("")
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ValidationError::ReferenceNotFound { .. } => "ReferenceNotFound",
            ValidationError::UnknownMapKey { .. } => "UnknownMapKey",
            ValidationError::UnknownMapColumn { .. } => "UnknownMapColumn",
            ValidationError::UnknownAttribute { .. } => "UnknownAttribute",
            ValidationError::UnsupportedIntrinsic { .. } => "UnsupportedIntrinsic",
            ValidationError::UnsupportedFormatVersion { .. } => "UnsupportedFormatVersion",
            ValidationError::NoResources => "NoResources",
            ValidationError::DescriptionTooLong { .. } => "DescriptionTooLong",
            ValidationError::DefaultNotAllowed { .. } => "DefaultNotAllowed",
            ValidationError::CyclicReference { .. } => "CyclicReference",
        }
    }
}

/// A value that has no JSON rendering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializationError {
    #[error("{at}: number {value} cannot be represented in JSON")]
    NonFiniteNumber { at: String, value: f64 },
}

/// Any failure of the full generation pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl From<Vec<ValidationError>> for GenerateError {
    fn from(errors: Vec<ValidationError>) -> Self {
        GenerateError::Validation(errors)
    }
}

impl GenerateError {
    /// Structured form for `--output json`.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            GenerateError::Schema(e) => json!({
                "stage":   "build",
                "field":   e.field(),
                "message": e.to_string(),
            }),
            GenerateError::Validation(errors) => json!({
                "stage": "validate",
                "errors": errors
                    .iter()
                    .map(|e| json!({
                        "kind":    e.kind(),
                        "subject": e.subject(),
                        "message": e.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            }),
            GenerateError::Serialization(e) => json!({
                "stage":   "serialize",
                "message": e.to_string(),
            }),
        }
    }

    /// Human-readable lines, one per underlying error.
    pub fn lines(&self) -> Vec<String> {
        match self {
            GenerateError::Validation(errors) => {
                errors.iter().map(|e| format!("error: {}", e)).collect()
            }
            other => vec![format!("error: {}", other)],
        }
    }
}
