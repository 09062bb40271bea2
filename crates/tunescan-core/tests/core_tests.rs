use std::path::{Path, PathBuf};
use std::time::Duration;

use tunescan_core::{
    ScanConfig, ScanState, ScanSummary, SkipReason, SourceId, TrackRecord, mime_for_extension,
};

#[test]
fn test_config_deserialize_uses_defaults() {
    let config: ScanConfig =
        serde_json::from_str(r#"{ "roots": ["/music"], "batch_size": 10 }"#).unwrap();

    assert_eq!(config.batch_size, 10);
    assert_eq!(config.min_hash_size, 4096);
    assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    assert!(!config.include_hidden);
}

#[test]
fn test_track_record_paths() {
    let record = TrackRecord {
        url: TrackRecord::file_url(Path::new("/music/Album/01 Intro.mp3")),
        mtime: 0,
        size: 0,
        mimetype: mime_for_extension("mp3").unwrap().into(),
        duration: 0,
        bitrate: 0,
        artist: "Artist".into(),
        album: "".into(),
        title: "Intro".into(),
        album_pos: 0,
        year: 0,
        hash: String::new(),
    };

    assert_eq!(record.url, "file:///music/Album/01 Intro.mp3");
    assert_eq!(record.dir(), Some(PathBuf::from("/music/Album")));
    assert!(record.is_valid());
}

#[test]
fn test_state_names() {
    assert_eq!(ScanState::default(), ScanState::Idle);
    assert_eq!(ScanState::PersistingTail.to_string(), "persisting-tail");
    assert!(ScanState::Walking.is_busy());
    assert!(!ScanState::Idle.is_busy());
}

#[test]
fn test_summary_serializes() {
    let mut summary = ScanSummary::new(vec![PathBuf::from("/music")]);
    summary.scanned = 12;
    summary.baseline_saved = true;

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["scanned"], 12);
    assert!(summary.fully_persisted());
    assert_eq!(SkipReason::MissingRequiredTags.to_string(), "missing-required-tags");
    assert_eq!(SourceId::default().as_str(), "local");
}
