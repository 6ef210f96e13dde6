//! Service settings loading.
//!
//! Loads `service.toml` from `--config`, `COUNTDOWN_CONFIG`, or
//! `~/.config/countdown/service.toml`, then applies environment overrides.
//! A missing default file is not an error; defaults apply.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3001
//! workers = 4
//!
//! [store]
//! path = "/var/lib/countdown/event.json"
//!
//! [cors]
//! allowed_origins = ["http://localhost:5173"]
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors from settings resolution.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {name} override {value:?}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Root settings for the binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSettings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub cors: CorsSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    /// 0 binds an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Threads pulling requests off the listener.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_workers() -> usize {
    4
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Path of the record document.
    #[serde(default = "crate::default_record_path")]
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: crate::default_record_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Exact origins that receive CORS headers.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl ServiceSettings {
    /// Environment variable naming the settings file.
    pub const ENV_CONFIG_PATH: &'static str = "COUNTDOWN_CONFIG";
    /// Environment override for the listen port.
    pub const ENV_PORT: &'static str = "PORT";
    /// Environment override for the record path.
    pub const ENV_DATA_PATH: &'static str = "COUNTDOWN_DATA_PATH";
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "service.toml";

    /// Resolve settings: file (explicit path, env, or default location),
    /// then environment overrides, then validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        Self::resolve(
            explicit,
            |name| std::env::var_os(name),
            &Self::default_config_path(),
        )
    }

    /// [`Self::load`] against an arbitrary environment and default path.
    fn resolve<E>(
        explicit: Option<&Path>,
        env: E,
        default_path: &Path,
    ) -> Result<Self, SettingsError>
    where
        E: Fn(&str) -> Option<OsString>,
    {
        let mut settings = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match env(Self::ENV_CONFIG_PATH) {
                Some(path) => Self::load_from_path(Path::new(&path))?,
                None if default_path.exists() => Self::load_from_path(default_path)?,
                None => {
                    tracing::info!(
                        path = %default_path.display(),
                        "settings file not found, using defaults"
                    );
                    Self::default()
                }
            },
        };

        let port = env(Self::ENV_PORT).map(|raw| raw.to_string_lossy().into_owned());
        settings.apply_overrides(port.as_deref(), env(Self::ENV_DATA_PATH).map(PathBuf::from))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse settings from a TOML string.
    pub fn parse(contents: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply a port string and a data path on top of the file values.
    pub fn apply_overrides(
        &mut self,
        port: Option<&str>,
        data_path: Option<PathBuf>,
    ) -> Result<(), SettingsError> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|_| SettingsError::InvalidOverride {
                    name: Self::ENV_PORT,
                    value: raw.to_string(),
                })?;
        }
        if let Some(path) = data_path {
            self.store.path = path;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::Invalid("server.host must not be empty".into()));
        }
        if !(1..=64).contains(&self.server.workers) {
            return Err(SettingsError::Invalid(format!(
                "server.workers must be between 1 and 64, got {}",
                self.server.workers
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("store.path must not be empty".into()));
        }
        Ok(())
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("countdown").join(Self::DEFAULT_CONFIG_FILENAME))
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = ServiceSettings::parse("").unwrap();
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.server.workers, 4);
        assert_eq!(settings.server.bind_addr(), "127.0.0.1:3001");
        assert_eq!(settings.cors.allowed_origins.len(), 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn parses_all_sections() {
        let settings = ServiceSettings::parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            workers = 2

            [store]
            path = "/srv/countdown/event.json"

            [cors]
            allowed_origins = ["https://countdown.example"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(settings.server.workers, 2);
        assert_eq!(settings.store.path, PathBuf::from("/srv/countdown/event.json"));
        assert_eq!(
            settings.cors.allowed_origins,
            vec!["https://countdown.example".to_string()]
        );
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = ServiceSettings::parse("[server]\nport = 8080").unwrap();
        settings
            .apply_overrides(Some("9090"), Some(PathBuf::from("/tmp/event.json")))
            .unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.store.path, PathBuf::from("/tmp/event.json"));
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut settings = ServiceSettings::default();
        let err = settings.apply_overrides(Some("http"), None).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidOverride { name: "PORT", .. }));
    }

    #[test]
    fn zero_workers_fail_validation() {
        let settings = ServiceSettings::parse("[server]\nworkers = 0").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ServiceSettings::parse("[server\nport = 1").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> + use<> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn resolve_prefers_explicit_path_over_env_and_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let explicit = write(&tmp, "explicit.toml", "[server]\nport = 1111");
        let from_env = write(&tmp, "env.toml", "[server]\nport = 2222");
        let default = write(&tmp, "default.toml", "[server]\nport = 3333");
        let env = env_from(&[(
            ServiceSettings::ENV_CONFIG_PATH,
            from_env.to_str().unwrap(),
        )]);

        let settings = ServiceSettings::resolve(Some(&explicit), &env, &default).unwrap();
        assert_eq!(settings.server.port, 1111);

        let settings = ServiceSettings::resolve(None, &env, &default).unwrap();
        assert_eq!(settings.server.port, 2222);

        let settings = ServiceSettings::resolve(None, env_from(&[]), &default).unwrap();
        assert_eq!(settings.server.port, 3333);
    }

    #[test]
    fn resolve_without_any_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let absent = tmp.path().join("absent.toml");
        let settings = ServiceSettings::resolve(None, env_from(&[]), &absent).unwrap();
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.store.path, crate::default_record_path());
    }

    #[test]
    fn resolve_env_config_path_must_exist() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        let env = env_from(&[(ServiceSettings::ENV_CONFIG_PATH, missing.to_str().unwrap())]);

        let absent = tmp.path().join("absent.toml");
        let err = ServiceSettings::resolve(None, env, &absent).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn resolve_applies_env_overrides_over_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = write(
            &tmp,
            "service.toml",
            "[server]\nport = 8080\n\n[store]\npath = \"/srv/event.json\"",
        );
        let env = env_from(&[
            (ServiceSettings::ENV_PORT, "9090"),
            (ServiceSettings::ENV_DATA_PATH, "/tmp/override.json"),
        ]);

        let settings = ServiceSettings::resolve(Some(&file), env, &file).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.store.path, PathBuf::from("/tmp/override.json"));
    }

    #[test]
    fn resolve_rejects_bad_port_env() {
        let tmp = tempfile::TempDir::new().unwrap();
        let env = env_from(&[(ServiceSettings::ENV_PORT, "eighty")]);

        let absent = tmp.path().join("absent.toml");
        let err = ServiceSettings::resolve(None, env, &absent).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidOverride { name: "PORT", .. }));
    }

    #[test]
    fn load_from_missing_path_is_read_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ServiceSettings::load_from_path(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
