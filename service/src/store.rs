//! Disk persistence for the single event record.
//!
//! The record lives in one pretty-printed JSON document. Reads parse and
//! schema-check the whole document; writes validate first, then replace the
//! document atomically through a `.tmp` sibling so a reader never observes a
//! half-written record.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::error::Category;

use crate::error::ConfigurationError;
use crate::model::EventConfig;

/// Load/save primitives for the record.
///
/// `save` is the only operation allowed to change durable state.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<EventConfig, ConfigurationError>;

    fn save(&self, config: &EventConfig) -> Result<(), ConfigurationError>;
}

/// JSON document store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Record path accessor.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record document exists at all.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Atomically write `data` to the record path via a `.tmp` sibling.
    fn atomic_write(&self, data: &[u8]) -> Result<(), ConfigurationError> {
        let write_err = |source: std::io::Error| ConfigurationError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.tmp_path();
        let result = std::fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|()| std::fs::rename(&tmp, &self.path));

        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<EventConfig, ConfigurationError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigurationError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(ConfigurationError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let config: EventConfig = serde_json::from_str(&data).map_err(|e| match e.classify() {
            Category::Data => ConfigurationError::Schema {
                reason: e.to_string(),
            },
            Category::Syntax | Category::Eof | Category::Io => {
                ConfigurationError::Parse { source: e }
            }
        })?;

        config
            .validate()
            .map_err(|reason| ConfigurationError::Schema { reason })?;
        Ok(config)
    }

    fn save(&self, config: &EventConfig) -> Result<(), ConfigurationError> {
        config
            .validate()
            .map_err(|reason| ConfigurationError::Schema { reason })?;

        let mut json = serde_json::to_string_pretty(config)
            .map_err(|source| ConfigurationError::Serialize { source })?;
        json.push('\n');
        self.atomic_write(json.as_bytes())?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SAMPLE_RECORD, store_with};
    use pretty_assertions::assert_eq;

    #[test]
    fn load_reads_valid_record() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (store, _) = store_with(&tmp, SAMPLE_RECORD);

        let config = store.load().unwrap();
        assert_eq!(config.event_details.title, "Anna & Ben");
        assert_eq!(config.event_details.timezone, "Europe/Berlin");
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("absent.json"));

        let err = store.load().unwrap_err();
        assert!(matches!(err, ConfigurationError::NotFound { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn load_malformed_json_is_parse_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (store, _) = store_with(&tmp, "{ \"eventDetails\": ");

        let err = store.load().unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn load_missing_field_is_schema_violation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broken = SAMPLE_RECORD.replace(r#""location": "Lakeside Pavilion","#, "");
        let (store, _) = store_with(&tmp, &broken);

        let err = store.load().unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn load_wrong_type_is_schema_violation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broken = SAMPLE_RECORD.replace(r#""updatesAllowed": true"#, r#""updatesAllowed": "yes""#);
        let (store, _) = store_with(&tmp, &broken);

        assert!(matches!(
            store.load().unwrap_err(),
            ConfigurationError::Schema { .. }
        ));
    }

    #[test]
    fn load_invalid_last_updated_is_schema_violation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broken = SAMPLE_RECORD.replace("2025-01-01T12:00:00.000Z", "yesterday");
        let (store, _) = store_with(&tmp, &broken);

        assert!(matches!(
            store.load().unwrap_err(),
            ConfigurationError::Schema { .. }
        ));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (store, path) = store_with(&tmp, SAMPLE_RECORD);

        let mut config = store.load().unwrap();
        config.event_details.location = "Old Town Hall".to_string();
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), config);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"eventDetails\": {"));
        assert!(!tmp.path().join("event.json.tmp").exists());
    }

    #[test]
    fn save_rejects_invalid_record_without_touching_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (store, path) = store_with(&tmp, SAMPLE_RECORD);
        let before = std::fs::read(&path).unwrap();

        let mut config = store.load().unwrap();
        config.event_details.timezone = String::new();

        let err = store.save(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn save_refuses_instants_load_would_reject() {
        use chrono::TimeZone;

        let tmp = tempfile::TempDir::new().unwrap();
        let (store, path) = store_with(&tmp, SAMPLE_RECORD);
        let before = std::fs::read(&path).unwrap();

        let mut config = store.load().unwrap();
        config.event_details.target_instant =
            chrono::Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();

        let err = store.save(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(store.load().is_ok());
    }

    #[test]
    fn load_truncates_sub_millisecond_instants() {
        let tmp = tempfile::TempDir::new().unwrap();
        let precise = SAMPLE_RECORD.replace(
            "2025-01-01T12:00:00.000Z",
            "2025-01-01T12:00:00.999999999Z",
        );
        let (store, path) = store_with(&tmp, &precise);

        let config = store.load().unwrap();
        store.save(&config).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""lastUpdated": "2025-01-01T12:00:00.999Z""#), "{raw}");
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (seed, _) = store_with(&tmp, SAMPLE_RECORD);
        let config = seed.load().unwrap();

        let nested = JsonFileStore::new(tmp.path().join("a/b/event.json"));
        assert!(!nested.exists());
        nested.save(&config).unwrap();
        assert!(nested.exists());
        assert_eq!(nested.load().unwrap(), config);
    }
}
