use crate::store::{BlockKind, RecordStore};
use crate::tools::traits::{Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;

pub const ENCODER_GET_PARAMS: &str = "encoder_get_params";
pub const DECODER_GET_PARAMS: &str = "decoder_get_params";

/// Returns one whole parameter block. Takes no arguments.
pub struct ParamsTool {
    kind: BlockKind,
    store: Arc<RecordStore>,
}

impl ParamsTool {
    pub fn encoder(store: Arc<RecordStore>) -> Self {
        Self {
            kind: BlockKind::Encoder,
            store,
        }
    }

    pub fn decoder(store: Arc<RecordStore>) -> Self {
        Self {
            kind: BlockKind::Decoder,
            store,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ParamsTool {
    fn name(&self) -> &str {
        match self.kind {
            BlockKind::Encoder => ENCODER_GET_PARAMS,
            BlockKind::Decoder => DECODER_GET_PARAMS,
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            BlockKind::Encoder => "Get video encoder configuration parameters",
            BlockKind::Decoder => "Get video decoder configuration parameters",
        }
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value) -> ToolResult {
        let block = self.store.params(self.kind)?;
        let key = format!("{}_params", self.kind.stem());
        let description = match self.kind {
            BlockKind::Encoder => "Video encoder configuration parameters",
            BlockKind::Decoder => "Video decoder configuration parameters",
        };

        let mut result = serde_json::Map::new();
        result.insert(key, block.to_json());
        result.insert("description".to_string(), Value::from(description));
        Ok(Value::Object(result))
    }
}
