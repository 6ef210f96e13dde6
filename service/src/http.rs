//! HTTP surface over tiny_http.
//!
//! A fixed pool of worker threads pulls requests off one listener and hands
//! them to [`route`], which maps method + path to a [`ConfigService`] call
//! and renders the result or error as JSON. Routing has no I/O of its own so
//! it can be exercised directly in tests.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::error::{ErrorKind, ServiceError, ValidationCode};
use crate::protocol::{
    DateUpdateRequest, ERR_METHOD_NOT_ALLOWED, ERR_NOT_FOUND, ErrorResponse, HealthResponse,
    IndexResponse, UpdateResponse,
};
use crate::service::{ConfigService, UpdateOutcome};
use crate::{SERVICE_NAME, SERVICE_VERSION};

/// Request bodies beyond this size are cut off (and then fail to parse).
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// A rendered response: status plus JSON body (`None` for 204).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self {
                status: 200,
                body: Some(body),
            },
            Err(e) => {
                tracing::error!("failed to serialize response: {e}");
                Self::error(500, "Internal server error", "INTERNAL_ERROR")
            }
        }
    }

    fn error(status: u16, message: impl Into<String>, code: &str) -> Self {
        let body = ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        };
        Self {
            status,
            body: serde_json::to_value(body).ok(),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    /// Map a service failure onto status + error body.
    pub fn from_service_error(err: &ServiceError) -> Self {
        match err.kind() {
            ErrorKind::Configuration => {
                tracing::error!("configuration error: {err}");
            }
            ErrorKind::Validation | ErrorKind::Forbidden | ErrorKind::InvalidDate => {
                tracing::debug!(code = err.code(), "request rejected: {err}");
            }
        }
        Self::error(err.kind().status(), err.public_message(), err.code())
    }
}

/// Which origins get CORS headers.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// The origin to echo back, if `origin` is allowed.
    pub fn allow<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        origin.filter(|o| self.allowed_origins.iter().any(|allowed| allowed == o))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

/// Dispatch one request. `url` may carry a query string; it is ignored.
pub fn route(service: &ConfigService, method: &Method, url: &str, body: &[u8]) -> ApiResponse {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    if *method == Method::Options {
        return ApiResponse::no_content();
    }

    match (method, path) {
        (Method::Get, "/") => ApiResponse::ok(&index()),
        (Method::Get, "/health") => ApiResponse::ok(&health()),

        (Method::Get, "/api/config") => respond(service.get_full_config()),
        (Method::Get, "/api/config/date") => respond(service.get_date_only()),
        (Method::Put, "/api/config/date") => {
            updated(service.update_full_from(decode_update_body(body)))
        }
        (Method::Patch, "/api/config/date") => {
            updated(service.update_partial_from(decode_update_body(body)))
        }

        (Method::Get, "/api/countdown") => respond(service.get_countdown_summary()),
        (Method::Get, "/api/countdown/config") => respond(service.get_config()),
        (Method::Post, "/api/countdown/update-date") => {
            updated(service.update_full_from(decode_update_body(body)))
        }

        (_, known) if is_known_path(known) => ApiResponse::error(
            405,
            format!("Method {} not allowed on {known}", method.as_str()),
            ERR_METHOD_NOT_ALLOWED,
        ),
        _ => ApiResponse::error(404, "Endpoint not found", ERR_NOT_FOUND),
    }
}

fn is_known_path(path: &str) -> bool {
    matches!(
        path,
        "/" | "/health"
            | "/api/config"
            | "/api/config/date"
            | "/api/countdown"
            | "/api/countdown/config"
            | "/api/countdown/update-date"
    )
}

fn respond<T: Serialize>(result: Result<T, ServiceError>) -> ApiResponse {
    match result {
        Ok(value) => ApiResponse::ok(&value),
        Err(e) => ApiResponse::from_service_error(&e),
    }
}

fn updated(result: Result<UpdateOutcome, ServiceError>) -> ApiResponse {
    respond(result.map(UpdateResponse::from))
}

/// Decode an update body; empty means `{}`. Errors are handed to the
/// service, which reports them only after the lock check.
fn decode_update_body(body: &[u8]) -> Result<DateUpdateRequest, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DateUpdateRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ServiceError::validation(
            ValidationCode::InvalidRequestBody,
            format!("Request body must be a JSON object with string fields: {e}"),
        )
    })
}

fn health() -> HealthResponse {
    HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        message: format!("{SERVICE_NAME} is running!"),
    }
}

fn index() -> IndexResponse {
    let endpoints = BTreeMap::from([
        ("GET /health", "Server health check"),
        ("GET /api/config", "Event record with live countdown"),
        ("GET /api/config/date", "Target date, timezone and countdown"),
        ("PUT /api/config/date", "Replace target date (and optionally timezone)"),
        ("PATCH /api/config/date", "Update target date and/or timezone"),
        ("GET /api/countdown", "Flat countdown summary"),
        ("GET /api/countdown/config", "Raw event record"),
        ("POST /api/countdown/update-date", "Replace target date"),
    ]);
    IndexResponse {
        message: SERVICE_NAME,
        version: SERVICE_VERSION,
        endpoints,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serving
// ─────────────────────────────────────────────────────────────────────────────

/// Run `workers` threads against `server` until it is unblocked once per
/// worker (see [`shutdown`]). Blocks until every worker has exited.
pub fn serve(
    server: Arc<Server>,
    service: Arc<ConfigService>,
    cors: Arc<CorsPolicy>,
    workers: usize,
) {
    std::thread::scope(|scope| {
        for worker in 0..workers.max(1) {
            let server = Arc::clone(&server);
            let service = Arc::clone(&service);
            let cors = Arc::clone(&cors);
            scope.spawn(move || {
                tracing::debug!(worker, "http worker started");
                for request in server.incoming_requests() {
                    if let Err(e) = handle_request(&service, &cors, request) {
                        tracing::warn!("Connection error: {e}");
                    }
                }
                tracing::debug!(worker, "http worker stopped");
            });
        }
    });
}

/// Wake every worker blocked in `serve` so it returns.
pub fn shutdown(server: &Server, workers: usize) {
    for _ in 0..workers.max(1) {
        server.unblock();
    }
}

fn handle_request(
    service: &ConfigService,
    cors: &CorsPolicy,
    mut request: Request,
) -> std::io::Result<()> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut body)?;

    let origin = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Origin"))
        .map(|h| h.value.as_str().to_string());

    let method = request.method().clone();
    let response = route(service, &method, request.url(), &body);
    tracing::debug!(
        method = method.as_str(),
        url = request.url(),
        status = response.status,
        "request handled"
    );

    let mut headers = Vec::new();
    if let Some(origin) = cors.allow(origin.as_deref()) {
        headers.push(header("Access-Control-Allow-Origin", origin));
        headers.push(header("Access-Control-Allow-Methods", ALLOWED_METHODS));
        headers.push(header("Access-Control-Allow-Headers", ALLOWED_HEADERS));
        headers.push(header("Vary", "Origin"));
    }

    match response.body {
        Some(body) => {
            headers.push(header("Content-Type", "application/json"));
            let payload = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
            let mut reply =
                Response::from_data(payload.into_bytes()).with_status_code(response.status);
            for h in headers.into_iter().flatten() {
                reply.add_header(h);
            }
            request.respond(reply)
        }
        None => {
            let mut reply = Response::empty(response.status);
            for h in headers.into_iter().flatten() {
                reply.add_header(h);
            }
            request.respond(reply)
        }
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}
