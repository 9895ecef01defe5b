use crate::config::DataSettings;
use crate::error::{FeedError, Result};
use crate::store::params::{BlockKind, ParameterBlock};
use crate::store::record::FeedTable;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Where feed records and parameter blocks come from.
pub trait DataSource: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    fn feeds(&self) -> Result<FeedTable>;

    /// Load and validate one parameter block.
    fn parameter_block(&self, kind: BlockKind) -> Result<ParameterBlock>;
}

/// Reads the CSV table and the JSON parameter/schema pairs from a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    feeds_file: String,
    encoder_params_file: String,
    encoder_schema_file: String,
    decoder_params_file: String,
    decoder_schema_file: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(&DataSettings {
            dir: dir.into(),
            ..DataSettings::default()
        })
    }

    pub fn from_settings(settings: &DataSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            feeds_file: settings.feeds_file.clone(),
            encoder_params_file: settings.encoder_params_file.clone(),
            encoder_schema_file: settings.encoder_schema_file.clone(),
            decoder_params_file: settings.decoder_params_file.clone(),
            decoder_schema_file: settings.decoder_schema_file.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn existing(&self, file: &str) -> Result<PathBuf> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Err(FeedError::NotFound(path));
        }
        Ok(path)
    }

    fn read_json(&self, file: &str) -> Result<Value> {
        let path = self.existing(file)?;
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn block_files(&self, kind: BlockKind) -> (&str, &str) {
        match kind {
            BlockKind::Encoder => (
                self.encoder_params_file.as_str(),
                self.encoder_schema_file.as_str(),
            ),
            BlockKind::Decoder => (
                self.decoder_params_file.as_str(),
                self.decoder_schema_file.as_str(),
            ),
        }
    }
}

impl DataSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn feeds(&self) -> Result<FeedTable> {
        let path = self.existing(&self.feeds_file)?;
        let table = FeedTable::from_csv(BufReader::new(File::open(&path)?))?;
        tracing::info!(path = %path.display(), feeds = table.len(), "loaded camera feeds");
        Ok(table)
    }

    fn parameter_block(&self, kind: BlockKind) -> Result<ParameterBlock> {
        let (params_file, schema_file) = self.block_files(kind);
        // Both files must exist before either is parsed.
        self.existing(params_file)?;
        self.existing(schema_file)?;
        let params = self.read_json(params_file)?;
        let schema = self.read_json(schema_file)?;
        ParameterBlock::validate(kind, params, &schema)
    }
}

/// Fixture source holding everything in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    feeds: FeedTable,
    encoder: (Value, Value),
    decoder: (Value, Value),
}

impl InMemorySource {
    /// Parameter blocks are checked against a schema that only requires an object.
    pub fn new(feeds: FeedTable, encoder_params: Value, decoder_params: Value) -> Self {
        let object_schema = serde_json::json!({"type": "object"});
        Self {
            feeds,
            encoder: (encoder_params, object_schema.clone()),
            decoder: (decoder_params, object_schema),
        }
    }

    pub fn with_schemas(mut self, encoder_schema: Value, decoder_schema: Value) -> Self {
        self.encoder.1 = encoder_schema;
        self.decoder.1 = decoder_schema;
        self
    }
}

impl DataSource for InMemorySource {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    fn feeds(&self) -> Result<FeedTable> {
        Ok(self.feeds.clone())
    }

    fn parameter_block(&self, kind: BlockKind) -> Result<ParameterBlock> {
        let (params, schema) = match kind {
            BlockKind::Encoder => &self.encoder,
            BlockKind::Decoder => &self.decoder,
        };
        ParameterBlock::validate(kind, params.clone(), schema)
    }
}
