//! Declarative task signatures: the typed output schema of a model call.
//!
//! A signature names the inputs a task consumes and the typed outputs it
//! must produce, e.g. `question -> sub_questions: list[str]`. Every stage
//! declares one, and raw model output is validated against it at the
//! [`LanguageModel`](crate::model::LanguageModel) boundary so a type
//! mismatch surfaces as a [`GenerationError`] instead of bad data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

use crate::error::GenerationError;

/// The declared type of one output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text (`str`)
    Text,
    /// Ordered list of strings (`list[str]`)
    TextList,
    /// Floating point number (`float`)
    Float,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "str",
            FieldType::TextList => "list[str]",
            FieldType::Float => "float",
        }
    }

    /// What a missing optional field reads as. Floats have no neutral value.
    fn empty_value(&self) -> Option<Value> {
        match self {
            FieldType::Text => Some(Value::String(String::new())),
            FieldType::TextList => Some(Value::Array(Vec::new())),
            FieldType::Float => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "str" | "string" | "text" => Some(FieldType::Text),
            "list[str]" | "list[string]" | "vec<string>" => Some(FieldType::TextList),
            "float" | "f64" | "number" => Some(FieldType::Float),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    pub ty: FieldType,
    /// May be omitted or `null`; text and list fields then read as empty.
    #[serde(default)]
    pub optional: bool,
}

/// Errors from parsing a textual signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature must contain '->' separating inputs from outputs")]
    MissingArrow,

    #[error("signature declares no outputs")]
    NoOutputs,

    #[error("empty field name in '{0}'")]
    EmptyFieldName(String),

    #[error("unknown type '{ty}' for field '{field}'")]
    UnknownType { field: String, ty: String },

    #[error("field '{0}' declared twice")]
    DuplicateField(String),
}

/// A task signature: instructions, named inputs, typed outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// What the model is asked to do.
    #[serde(default)]
    pub instructions: String,

    /// Input names, in rendering order.
    pub inputs: Vec<String>,

    /// Output fields, in declaration order.
    pub outputs: Vec<OutputField>,
}

impl Signature {
    /// Start an empty signature with the given instructions.
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare an input.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declare a typed output.
    pub fn output(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.outputs.push(OutputField {
            name: name.into(),
            ty,
            optional: false,
        });
        self
    }

    /// Declare a typed output the model may leave out.
    pub fn optional_output(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.outputs.push(OutputField {
            name: name.into(),
            ty,
            optional: true,
        });
        self
    }

    /// Parse a DSPy-style signature such as
    /// `"context, question -> reasoning, answer"` or
    /// `"question, answer -> confidence: float, issues: list[str]"`.
    ///
    /// Outputs without a type annotation default to `str`. A trailing `?`
    /// on an output name (`issues?: list[str]`) marks it optional.
    pub fn parse(spec: &str) -> Result<Self, SignatureError> {
        let (lhs, rhs) = spec.split_once("->").ok_or(SignatureError::MissingArrow)?;

        let mut seen = std::collections::HashSet::new();
        let mut signature = Signature::new(String::new());

        for raw in lhs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !seen.insert(raw.to_string()) {
                return Err(SignatureError::DuplicateField(raw.to_string()));
            }
            signature.inputs.push(raw.to_string());
        }

        for raw in rhs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, ty) = match raw.split_once(':') {
                Some((name, ty)) => {
                    let name = name.trim();
                    let parsed = FieldType::parse(ty).ok_or_else(|| SignatureError::UnknownType {
                        field: name.to_string(),
                        ty: ty.trim().to_string(),
                    })?;
                    (name, parsed)
                }
                None => (raw, FieldType::Text),
            };
            let (name, optional) = match name.strip_suffix('?') {
                Some(stripped) => (stripped.trim_end(), true),
                None => (name, false),
            };
            if name.is_empty() {
                return Err(SignatureError::EmptyFieldName(raw.to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(SignatureError::DuplicateField(name.to_string()));
            }
            signature.outputs.push(OutputField {
                name: name.to_string(),
                ty,
                optional,
            });
        }

        if signature.outputs.is_empty() {
            return Err(SignatureError::NoOutputs);
        }

        Ok(signature)
    }

    /// Validate raw model output against the declared outputs.
    ///
    /// Text fields accept strings and stringify numbers and booleans. Float
    /// fields accept numbers and numeric strings. List fields accept arrays
    /// of scalars. `null` counts as missing; a missing optional text or list
    /// field reads as empty. Undeclared keys are dropped.
    pub fn validate(&self, mut raw: Map<String, Value>) -> Result<Outputs, GenerationError> {
        let mut values = Map::new();

        for field in &self.outputs {
            let value = match raw.remove(&field.name) {
                None | Some(Value::Null) if field.optional => match field.ty.empty_value() {
                    Some(empty) => empty,
                    None => continue,
                },
                None | Some(Value::Null) => {
                    return Err(GenerationError::MissingField(field.name.clone()));
                }
                Some(v) => v,
            };
            let normalized = coerce(field, value)?;
            values.insert(field.name.clone(), normalized);
        }

        Ok(Outputs { values })
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::parse(s)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outputs: Vec<String> = self
            .outputs
            .iter()
            .map(|o| {
                let marker = if o.optional { "?" } else { "" };
                format!("{}{marker}: {}", o.name, o.ty)
            })
            .collect();
        write!(f, "{} -> {}", self.inputs.join(", "), outputs.join(", "))
    }
}

fn wrong_type(field: &OutputField, found: &Value) -> GenerationError {
    GenerationError::WrongType {
        field: field.name.clone(),
        expected: field.ty.as_str().to_string(),
        found: json_kind(found).to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce(field: &OutputField, value: Value) -> Result<Value, GenerationError> {
    match field.ty {
        FieldType::Text => scalar_text(&value)
            .map(Value::String)
            .ok_or_else(|| wrong_type(field, &value)),
        FieldType::TextList => {
            let Value::Array(items) = &value else {
                return Err(wrong_type(field, &value));
            };
            items
                .iter()
                .map(|item| scalar_text(item).map(Value::String))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
                .ok_or_else(|| wrong_type(field, &value))
        }
        FieldType::Float => {
            let parsed = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| wrong_type(field, &value))
        }
    }
}

/// Validated, typed outputs of one model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    values: Map<String, Value>,
}

impl Outputs {
    /// Fetch a text field.
    pub fn text(&self, name: &str) -> Result<String, GenerationError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(GenerationError::WrongType {
                field: name.to_string(),
                expected: FieldType::Text.as_str().into(),
                found: json_kind(other).into(),
            }),
            None => Err(GenerationError::MissingField(name.to_string())),
        }
    }

    /// Fetch a list-of-text field.
    pub fn text_list(&self, name: &str) -> Result<Vec<String>, GenerationError> {
        let not_list = |found: &Value| GenerationError::WrongType {
            field: name.to_string(),
            expected: FieldType::TextList.as_str().into(),
            found: json_kind(found).into(),
        };
        match self.values.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(String::from).ok_or_else(|| not_list(v)))
                .collect(),
            Some(other) => Err(not_list(other)),
            None => Err(GenerationError::MissingField(name.to_string())),
        }
    }

    /// Fetch a float field.
    pub fn float(&self, name: &str) -> Result<f64, GenerationError> {
        match self.values.get(name) {
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| GenerationError::WrongType {
                field: name.to_string(),
                expected: FieldType::Float.as_str().into(),
                found: "number".into(),
            }),
            Some(other) => Err(GenerationError::WrongType {
                field: name.to_string(),
                expected: FieldType::Float.as_str().into(),
                found: json_kind(other).into(),
            }),
            None => Err(GenerationError::MissingField(name.to_string())),
        }
    }

    /// Raw access to a validated value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
