//! Shared fixtures for unit tests.

use std::path::PathBuf;
use std::sync::Arc;

use crate::store::JsonFileStore;

/// A valid record with updates allowed.
pub(crate) const SAMPLE_RECORD: &str = r#"{
  "eventDetails": {
    "targetInstant": "2025-09-01T00:00:00Z",
    "location": "Lakeside Pavilion",
    "timezone": "Europe/Berlin",
    "title": "Anna & Ben",
    "participants": { "primary": "Anna", "secondary": "Ben" }
  },
  "display": {
    "completedMessage": "Just married!",
    "unitLabels": { "days": "Days", "hours": "Hours", "minutes": "Minutes", "seconds": "Seconds" }
  },
  "settings": { "updatesAllowed": true, "lastUpdated": "2025-01-01T12:00:00.000Z" }
}"#;

/// The sample record with the update lock engaged.
pub(crate) fn locked_record() -> String {
    SAMPLE_RECORD.replace(r#""updatesAllowed": true"#, r#""updatesAllowed": false"#)
}

/// Write `contents` to `event.json` in `dir` and open a store over it.
pub(crate) fn store_with(dir: &tempfile::TempDir, contents: &str) -> (Arc<JsonFileStore>, PathBuf) {
    let path = dir.path().join("event.json");
    std::fs::write(&path, contents).unwrap();
    (Arc::new(JsonFileStore::new(path.clone())), path)
}
