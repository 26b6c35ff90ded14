//! # Field Schemas
//!
//! Static, declarative tables describing the fields a document type exposes,
//! plus the structural validation that turns raw model output into an
//! [`ExtractionResult`].

use regex::Regex;
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::{fmt, sync::LazyLock};
use thiserror::Error;

/// The value type of a declared field. Every field is a nullable string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
}

/// A single declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Used verbatim in model instructions.
    pub description: &'static str,
    pub value_type: ValueType,
}

/// An ordered table of field declarations for one document type.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

pub static RECEIPT_SCHEMA: FieldSchema = FieldSchema {
    name: "Receipt",
    fields: &[
        FieldSpec {
            name: "company",
            description: "The name of the company or the business that issued the receipt",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "date",
            description: "The date of issue on the receipt",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "address",
            description: "The address of the company or the business that issued the receipt",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "total",
            description: "The total bill amount on the receipt",
            value_type: ValueType::String,
        },
    ],
};

pub static CONTRACT_SCHEMA: FieldSchema = FieldSchema {
    name: "Contract",
    fields: &[
        FieldSpec {
            name: "licensor",
            description: "The party in a licensing agreement that grants another party (the licensee) the right to produce, use, sell, and/or display the licensor's protected material",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "licensee",
            description: "The party in a licensing agreement that receives from another party (the licensor) the right to produce, use, sell, and/or display the licensor's protected material",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "termination_clause",
            description: "The Termination clause is a crucial aspect of licensing agreements, as they outline the circumstances under which the agreement can be ended",
            value_type: ValueType::String,
        },
        FieldSpec {
            name: "signing_date",
            description: "The date of signing of the licensing contract between the two parties",
            value_type: ValueType::String,
        },
    ],
};

impl FieldSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Renders the schema as a JSON Schema object suitable for structured-output APIs.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let ty = match f.value_type {
                    ValueType::String => json!(["string", "null"]),
                };
                (
                    f.name.to_string(),
                    json!({ "type": ty, "description": f.description }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.names().collect::<Vec<_>>(),
            "additionalProperties": false,
        })
    }

    /// A bulleted description of every field, for prompt text.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("- `{}`: {}", f.name, f.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validates raw model output against this schema.
    ///
    /// The output may be wrapped in a Markdown code fence. It must be a JSON
    /// object that declares every field (as a string or `null`) and nothing
    /// else.
    pub fn validate_output(
        &'static self,
        raw: &str,
    ) -> Result<ExtractionResult, ValidationFailure> {
        let value = parse_json_output(raw)?;

        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ValidationFailure(format!(
                    "expected a JSON object with the fields {}, got {}",
                    self.names().collect::<Vec<_>>().join(", "),
                    json_type_name(&other)
                )))
            }
        };

        let mut problems = Vec::new();

        let undeclared: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|k| !self.contains(k))
            .collect();
        if !undeclared.is_empty() {
            problems.push(format!("undeclared field(s): {}", undeclared.join(", ")));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for spec in self.fields {
            match object.get(spec.name) {
                None => problems.push(format!("missing field '{}'", spec.name)),
                Some(Value::Null) => values.push(FieldValue::Absent),
                Some(Value::String(s)) => values.push(FieldValue::Present(s.clone())),
                Some(other) => problems.push(format!(
                    "field '{}' must be a string or null, got {}",
                    spec.name,
                    json_type_name(other)
                )),
            }
        }

        if !problems.is_empty() {
            return Err(ValidationFailure(problems.join("; ")));
        }

        Ok(ExtractionResult {
            schema: self,
            values,
        })
    }
}

/// The model output did not conform to the schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationFailure(pub String);

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
});

/// Parses the output as JSON. Output that is not JSON as a whole is
/// unwrapped from a code fence, or from prose around a single object, first.
pub(crate) fn parse_json_output(raw: &str) -> Result<Value, ValidationFailure> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationFailure("output is empty".to_string()));
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let candidate = unwrap_json_candidate(text);
    serde_json::from_str(candidate)
        .map_err(|e| ValidationFailure(format!("output is not valid JSON: {e}")))
}

fn unwrap_json_candidate(text: &str) -> &str {
    let text = JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str().trim());

    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return &text[start..=end];
            }
        }
    }
    text
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The value extracted for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Present(String),
    /// The model reported the field as not found.
    Absent,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Present(s) => Some(s),
            FieldValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Present(s) => write!(f, "{s}"),
            FieldValue::Absent => write!(f, "<absent>"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Present(s) => serializer.serialize_str(s),
            FieldValue::Absent => serializer.serialize_none(),
        }
    }
}

/// A fully populated record with one value per declared field, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    schema: &'static FieldSchema,
    values: Vec<FieldValue>,
}

impl ExtractionResult {
    pub fn schema(&self) -> &'static FieldSchema {
        self.schema
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema
            .fields
            .iter()
            .position(|f| f.name == field)
            .and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> + '_ {
        self.schema.names().zip(self.values.iter())
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, value)| match value {
                FieldValue::Present(s) => format!("{name}={s:?}"),
                FieldValue::Absent => format!("{name}=None"),
            })
            .collect();
        write!(f, "{}({})", self.schema.name, parts.join(", "))
    }
}
