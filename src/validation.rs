//! Schema validation helpers.
//!
//! This module validates a `serde_json::Value` against a [`Schema`]: presence of
//! required attributes, value types, nested list sizes, and the declarative
//! [`Validator`]s attached to attributes.
//!
//! # Example
//!
//! ```
//! use opnsense_provider::schema::{Attribute, Schema, Validator};
//! use opnsense_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("hostname", Attribute::required_string())
//!     .with_attribute(
//!         "type",
//!         Attribute::optional_string().with_validator(Validator::one_of(["A", "AAAA", "MX"])),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"hostname": "www", "type": "A"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"hostname": "www", "type": "CNAME"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("type".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, NestedBlock, Schema, Validator,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes and nested lists are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Attribute validators run on non-null values
/// - Nested lists are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
        validate_also_requires(attr, name, obj, path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        if !is_null(value) {
            diagnostics.push(read_only_diagnostic(path));
        }
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            // Value checks only make sense once the type is right.
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    validate_value(validator, v, path, diagnostics);
                }
            }
        },
    }
}

fn validate_value(
    validator: &Validator,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match validator {
        Validator::OneOf(allowed) => {
            if let Some(s) = value.as_str() {
                if !allowed.iter().any(|a| a == s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Value must be one of: {}, got: \"{}\"",
                                quoted_list(allowed),
                                s
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::AtLeast(min) => {
            if let Some(n) = value.as_i64() {
                if n < *min {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!("Value must be at least {}, got: {}", min, n))
                            .with_attribute(path),
                    );
                }
            }
        },
        Validator::Between(min, max) => {
            if let Some(n) = value.as_i64() {
                if n < *min || n > *max {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Value must be between {} and {}, got: {}",
                                min, max, n
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
        // Needs sibling attributes; checked at block level.
        Validator::AlsoRequires(_) => {},
    }
}

fn validate_also_requires(
    attr: &Attribute,
    name: &str,
    obj: &Map<String, Value>,
    block_path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if is_null(obj.get(name)) {
        return;
    }
    let attr_path = join_path(block_path, name);

    for validator in &attr.validators {
        let Validator::AlsoRequires(names) = validator else {
            continue;
        };
        for required in names {
            if is_null(obj.get(required)) {
                let other = join_path(block_path, required);
                diagnostics.push(
                    Diagnostic::error("Invalid Attribute Combination")
                        .with_detail(format!(
                            "Attribute \"{}\" must be specified when \"{}\" is specified",
                            other, attr_path
                        ))
                        .with_attribute(&attr_path),
                );
            }
        }
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => {
            validate_elements(element_type, value, path, "list", diagnostics);
        },
        AttributeType::Set(element_type) => {
            validate_elements(element_type, value, path, "set", diagnostics);
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_elements(
    element_type: &AttributeType,
    value: &Value,
    path: &str,
    expected: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(arr) = value.as_array() else {
        diagnostics.push(type_error(path, expected, value));
        return;
    };
    for (i, elem) in arr.iter().enumerate() {
        let elem_path = format!("{}.{}", path, i);
        validate_attribute_type(element_type, elem, &elem_path, diagnostics);
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Object members carry no presence flags, so only types are checked.
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if nested.flags.is_computed_only() {
        if !is_null(value) {
            diagnostics.push(read_only_diagnostic(path));
        }
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

// Helper functions

/// Computed-only values belong to the provider; configuration may not set them.
fn read_only_diagnostic(path: &str) -> Diagnostic {
    Diagnostic::error("Invalid read-only attribute")
        .with_detail(format!(
            "Attribute '{}' is computed by the provider and cannot be set in configuration",
            path
        ))
        .with_attribute(path)
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.is_i64() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}
