// Test helper functions

use std::sync::Arc;

use axum::{body::Body, http::Response, Router};
use mailgate::core::backend::MemoryBackend;
use mailgate::core::config::Config;
use mailgate::core::gateway::IndexGateway;
use mailgate::core::services::Services;
use serde_json::Value;

/// Create a gateway over `backend`
#[allow(dead_code)] // Used in integration tests
pub fn create_test_gateway(backend: &MemoryBackend) -> IndexGateway<MemoryBackend> {
    IndexGateway::new(backend.clone(), "/mail")
}

/// Create shared services over `backend`
#[allow(dead_code)] // Used in integration tests
pub fn create_test_services(backend: &MemoryBackend) -> Arc<Services<MemoryBackend>> {
    Arc::new(Services::new(Config::default(), backend.clone()))
}

/// Create the full router over `backend`
#[allow(dead_code)] // Used in integration tests
pub fn create_test_app(backend: &MemoryBackend) -> Router {
    mailgate::http::router(create_test_services(backend))
}

/// Collect a response body as JSON
#[allow(dead_code)] // Used in integration tests
pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1_000_000)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Body is not JSON")
}

/// Write an executable `notmuch` stand-in into `dir`
///
/// `@STATE@` in `script` is replaced with `dir`, so the script can keep
/// state between invocations.
#[cfg(unix)]
#[allow(dead_code)] // Used in integration tests
pub fn write_stub_notmuch(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("notmuch");
    std::fs::write(&path, script.replace("@STATE@", &dir.display().to_string()))
        .expect("Failed to write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make stub executable");
    path
}
