use crate::error::{FeedError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Encoder,
    Decoder,
}

impl BlockKind {
    /// File stem used for `<stem>_params.json` / `<stem>_schema.json`.
    pub fn stem(self) -> &'static str {
        match self {
            BlockKind::Encoder => "encoder",
            BlockKind::Decoder => "decoder",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Encoder => write!(f, "Encoder"),
            BlockKind::Decoder => write!(f, "Decoder"),
        }
    }
}

/// A schema-valid encoder or decoder parameter tree.
///
/// The only way to obtain one is [`ParameterBlock::validate`], so holding a
/// value means validation passed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlock {
    kind: BlockKind,
    values: Map<String, Value>,
}

impl ParameterBlock {
    pub fn validate(kind: BlockKind, params: Value, schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema).map_err(|e| FeedError::Validation {
            block: kind.to_string(),
            message: format!("invalid schema: {e}"),
        })?;

        let errors: Vec<String> = validator.iter_errors(&params).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            return Err(FeedError::Validation {
                block: kind.to_string(),
                message: errors.join("; "),
            });
        }

        match params {
            Value::Object(values) => {
                tracing::info!(block = %kind, parameters = values.len(), "parameters validated");
                Ok(Self { kind, values })
            }
            other => Err(FeedError::Validation {
                block: kind.to_string(),
                message: format!("expected a JSON object, found {}", json_type(&other)),
            }),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
