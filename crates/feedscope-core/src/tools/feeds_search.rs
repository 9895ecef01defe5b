use crate::error::FeedError;
use crate::query::{self, QuerySpec};
use crate::store::RecordStore;
use crate::tools::traits::{Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;

pub const FEEDS_SEARCH: &str = "feeds_search";

/// Filter, sort and project the camera feed table.
pub struct FeedsSearchTool {
    store: Arc<RecordStore>,
}

impl FeedsSearchTool {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for FeedsSearchTool {
    fn name(&self) -> &str {
        FEEDS_SEARCH
    }

    fn description(&self) -> &str {
        "Search and filter camera feeds data with various criteria"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filters": {
                    "type": "object",
                    "description": "Dictionary of column->value filters. Supports exact match, list of values, or range/comparison filters ({\"min\", \"max\", \"gt\", \"lt\"})",
                    "additionalProperties": true
                },
                "columns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of columns to return. Available: FEED_ID, THEATER, FRRATE, RES_W, RES_H, CODEC, ENCR, LAT_MS, MODL_TAG, CIV_OK"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "minimum": 1
                },
                "sort_by": {
                    "type": "string",
                    "description": "Column name to sort results by"
                },
                "desc": {
                    "type": "boolean",
                    "description": "Whether to sort in descending order (default: false for ascending)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let spec = QuerySpec::from_args(params)
            .map_err(|e| FeedError::invalid_arguments(FEEDS_SEARCH, e.to_string()))?;
        let table = self.store.feeds()?;
        let result = query::search(&table, &spec)?;
        Ok(serde_json::to_value(result)?)
    }
}
