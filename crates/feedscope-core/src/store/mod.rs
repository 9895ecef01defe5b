//! Record store: feed records plus the encoder and decoder parameter blocks.
//!
//! The store is empty until [`RecordStore::load`] succeeds. A load builds the
//! whole dataset before publishing it, so readers either see nothing or a
//! complete, validated dataset.

mod params;
mod record;
mod source;

pub use params::{BlockKind, ParameterBlock};
pub use record::{CellValue, Column, ColumnKind, FeedTable, Record};
pub use source::{DataSource, DirectorySource, InMemorySource};

use crate::error::{FeedError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Everything a single successful load produced.
#[derive(Debug)]
pub struct Dataset {
    pub feeds: Arc<FeedTable>,
    pub encoder: Arc<ParameterBlock>,
    pub decoder: Arc<ParameterBlock>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStatus {
    pub ready: bool,
    pub feeds_loaded: usize,
    pub encoder_loaded: bool,
    pub decoder_loaded: bool,
    pub encoder_param_count: usize,
    pub decoder_param_count: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct RecordStore {
    dataset: RwLock<Option<Arc<Dataset>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and load it immediately.
    pub fn from_source(source: &dyn DataSource) -> Result<Self> {
        let store = Self::new();
        store.load(source)?;
        Ok(store)
    }

    /// Load feeds and both parameter blocks. On failure the previous state
    /// (usually "not loaded") is left untouched.
    pub fn load(&self, source: &dyn DataSource) -> Result<()> {
        tracing::info!(source = %source.describe(), "loading record store");

        let feeds = source.feeds()?;
        let encoder = source.parameter_block(BlockKind::Encoder)?;
        let decoder = source.parameter_block(BlockKind::Decoder)?;

        let dataset = Dataset {
            feeds: Arc::new(feeds),
            encoder: Arc::new(encoder),
            decoder: Arc::new(decoder),
            loaded_at: Utc::now(),
        };

        tracing::info!(
            feeds = dataset.feeds.len(),
            encoder_params = dataset.encoder.len(),
            decoder_params = dataset.decoder.len(),
            "record store ready"
        );

        let mut slot = self
            .dataset
            .write()
            .map_err(|_| FeedError::Other("record store lock poisoned".into()))?;
        *slot = Some(Arc::new(dataset));
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Arc<Dataset>> {
        let slot = self
            .dataset
            .read()
            .map_err(|_| FeedError::Other("record store lock poisoned".into()))?;
        slot.clone().ok_or(FeedError::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ok()
    }

    pub fn feeds(&self) -> Result<Arc<FeedTable>> {
        Ok(self.snapshot()?.feeds.clone())
    }

    pub fn encoder_params(&self) -> Result<Arc<ParameterBlock>> {
        Ok(self.snapshot()?.encoder.clone())
    }

    pub fn decoder_params(&self) -> Result<Arc<ParameterBlock>> {
        Ok(self.snapshot()?.decoder.clone())
    }

    pub fn params(&self, kind: BlockKind) -> Result<Arc<ParameterBlock>> {
        match kind {
            BlockKind::Encoder => self.encoder_params(),
            BlockKind::Decoder => self.decoder_params(),
        }
    }

    pub fn status(&self) -> StoreStatus {
        match self.snapshot() {
            Ok(dataset) => StoreStatus {
                ready: true,
                feeds_loaded: dataset.feeds.len(),
                encoder_loaded: true,
                decoder_loaded: true,
                encoder_param_count: dataset.encoder.len(),
                decoder_param_count: dataset.decoder.len(),
                loaded_at: Some(dataset.loaded_at),
            },
            Err(_) => StoreStatus {
                ready: false,
                feeds_loaded: 0,
                encoder_loaded: false,
                decoder_loaded: false,
                encoder_param_count: 0,
                decoder_param_count: 0,
                loaded_at: None,
            },
        }
    }
}
