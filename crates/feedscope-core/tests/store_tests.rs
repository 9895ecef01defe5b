use feedscope_core::store::{BlockKind, DirectorySource, FeedTable, InMemorySource, RecordStore};
use feedscope_core::FeedError;
use serde_json::json;
use std::path::Path;

const FEEDS_CSV: &str = "\
FEED_ID,THEATER,FRRATE,RES_W,RES_H,CODEC
1,PAC,30,1920,1080,H264
2,EUR,25,1280,720,H265
3,PAC,60,3840,2160,AV1
";

fn encoder_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "bitrate_kbps": {"type": "integer", "minimum": 1},
            "gop": {"type": "integer"}
        },
        "required": ["bitrate_kbps"]
    })
}

fn write_dataset(dir: &Path) {
    std::fs::write(dir.join("Table_feeds_v2.csv"), FEEDS_CSV).unwrap();
    std::fs::write(
        dir.join("encoder_params.json"),
        json!({"bitrate_kbps": 4000, "gop": 30}).to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("encoder_schema.json"), encoder_schema().to_string()).unwrap();
    std::fs::write(
        dir.join("decoder_params.json"),
        json!({"threads": 4, "low_latency": true}).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("decoder_schema.json"),
        json!({"type": "object"}).to_string(),
    )
    .unwrap();
}

#[test]
fn test_store_unready_until_loaded() {
    let store = RecordStore::new();

    assert!(!store.is_ready());
    assert!(matches!(store.feeds(), Err(FeedError::NotReady)));
    assert!(matches!(store.encoder_params(), Err(FeedError::NotReady)));

    let status = store.status();
    assert!(!status.ready);
    assert_eq!(status.feeds_loaded, 0);
}

#[test]
fn test_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());

    let store = RecordStore::from_source(&DirectorySource::new(dir.path())).unwrap();

    let feeds = store.feeds().unwrap();
    assert_eq!(feeds.len(), 3);
    assert_eq!(feeds.record(2).unwrap().get("CODEC").unwrap().to_text(), "AV1");

    let encoder = store.params(BlockKind::Encoder).unwrap();
    assert_eq!(encoder.get("bitrate_kbps"), Some(&json!(4000)));

    let status = store.status();
    assert!(status.ready);
    assert_eq!(status.feeds_loaded, 3);
    assert_eq!(status.encoder_param_count, 2);
    assert_eq!(status.decoder_param_count, 2);
    assert!(status.loaded_at.is_some());
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    std::fs::remove_file(dir.path().join("decoder_schema.json")).unwrap();

    let store = RecordStore::new();
    let err = store.load(&DirectorySource::new(dir.path())).unwrap_err();

    match err {
        FeedError::NotFound(path) => assert!(path.ends_with("decoder_schema.json")),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(!store.is_ready());
}

#[test]
fn test_schema_violation_names_the_block() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    std::fs::write(
        dir.path().join("encoder_params.json"),
        json!({"gop": 30}).to_string(),
    )
    .unwrap();

    let err = RecordStore::from_source(&DirectorySource::new(dir.path())).unwrap_err();
    match &err {
        FeedError::Validation { block, message } => {
            assert_eq!(block, "Encoder");
            assert!(message.contains("bitrate_kbps"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Encoder parameters validation failed"));
}

#[test]
fn test_failed_reload_keeps_previous_dataset() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let source = DirectorySource::new(dir.path());
    let store = RecordStore::from_source(&source).unwrap();

    std::fs::write(dir.path().join("encoder_params.json"), "[1, 2, 3]").unwrap();
    assert!(store.load(&source).is_err());

    assert!(store.is_ready());
    assert_eq!(store.feeds().unwrap().len(), 3);
}

#[test]
fn test_in_memory_source() {
    let feeds = FeedTable::from_json_records(&[json!({"FEED_ID": 7, "THEATER": "AFR"})]).unwrap();
    let source = InMemorySource::new(feeds, json!({"preset": "fast"}), json!({}));
    let store = RecordStore::from_source(&source).unwrap();

    assert_eq!(store.feeds().unwrap().len(), 1);
    assert!(store.decoder_params().unwrap().is_empty());
}
