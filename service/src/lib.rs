//! `countdown-service` — single-record event countdown service.
//!
//! Stores one event configuration record (target instant, descriptive
//! metadata, display labels) as a JSON document and serves it over HTTP
//! together with a live countdown computed per request.
//!
//! ## Layers
//! - [`model`]: typed record schema and instant canonicalization
//! - [`store`]: load/validate/save of the on-disk document
//! - [`countdown`]: pure countdown computation
//! - [`service`]: read and update operations, update-lock enforcement
//! - [`http`]: tiny_http routing and worker pool
//! - [`settings`]: TOML/env configuration for the binary

pub mod countdown;
pub mod error;
pub mod http;
pub mod model;
pub mod protocol;
pub mod service;
pub mod settings;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

/// Human-readable service name used in banners and the index endpoint.
pub const SERVICE_NAME: &str = "Event Countdown API Server";

/// Service version reported by the index endpoint.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default record filename inside the data directory.
pub const RECORD_FILENAME: &str = "event.json";

/// Get the default record path using the XDG data directory.
///
/// Falls back to `./event.json` if no data directory can be determined.
pub fn default_record_path() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("countdown").join(RECORD_FILENAME))
        .unwrap_or_else(|| std::path::PathBuf::from(RECORD_FILENAME))
}
