mod traits;
mod feeds_search;
mod params;

pub use traits::*;
pub use feeds_search::{FeedsSearchTool, FEEDS_SEARCH};
pub use params::{ParamsTool, DECODER_GET_PARAMS, ENCODER_GET_PARAMS};

use crate::store::RecordStore;
use std::sync::Arc;

impl ToolRegistry {
    /// The three read-only query tools over a record store.
    pub fn for_store(store: Arc<RecordStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FeedsSearchTool::new(store.clone())));
        registry.register(Box::new(ParamsTool::encoder(store.clone())));
        registry.register(Box::new(ParamsTool::decoder(store)));
        registry
    }
}
