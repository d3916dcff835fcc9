use crate::{
    meta,
    value::{Document, Value, ValueKind},
};
use derive_more::Display;

///
/// ShapeViolation
///

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ShapeViolation {
    #[display("required field {field:?} is missing")]
    MissingField { field: String },

    #[display("field {field:?} should be {expected}, found {found}")]
    WrongKind {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

///
/// FieldDef
///
/// One declared field of a versioned shape. A field with a default is
/// implicitly optional on input; `make` fills it before validation.
///

#[derive(Clone, Debug)]
pub struct FieldDef {
    name: String,
    kind: Option<ValueKind>,
    required: bool,
    default: Option<Value>,
}

impl FieldDef {
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            required: false,
            default: None,
        }
    }

    /// A required field whose absence on input is filled with `default`.
    #[must_use]
    pub fn with_default(name: impl Into<String>, kind: ValueKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            required: true,
            default: Some(default),
        }
    }

    /// Declare the field without constraining its kind.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

///
/// Shape
///
/// Declared fields of one schema version. Validation is open-world:
/// metadata attributes and undeclared fields pass through untouched, so a
/// migration may carry fields a later shape does not declare.
///

#[derive(Clone, Debug, Default)]
pub struct Shape {
    fields: Vec<FieldDef>,
}

impl Shape {
    #[must_use]
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn validate(&self, doc: &Document) -> Result<(), ShapeViolation> {
        for field in &self.fields {
            match doc.get(&field.name) {
                None => {
                    if field.required {
                        return Err(ShapeViolation::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    if let Some(expected) = field.kind
                        && value.kind() != expected
                        && !matches!(value, Value::Null)
                    {
                        return Err(ShapeViolation::WrongKind {
                            field: field.name.clone(),
                            expected,
                            found: value.kind(),
                        });
                    }
                }
            }
        }

        debug_assert!(
            self.fields.iter().all(|f| !meta::is_meta_attr(&f.name)),
            "shapes must not declare metadata attributes"
        );

        Ok(())
    }

    /// Fill declared defaults for absent fields, in place.
    pub fn apply_defaults(&self, doc: &mut Document) {
        for field in &self.fields {
            if let Some(default) = &field.default
                && !doc.contains_key(&field.name)
            {
                doc.insert(field.name.clone(), default.clone());
            }
        }
    }
}
