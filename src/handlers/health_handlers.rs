//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the catalog and disk I/O

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe: always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Confirms a catalog fetch has succeeded at least once.
/// 2. Performs a best-effort write/read/delete in the attachment directory.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) Catalog check
    let catalog_check = match state.catalog.loaded_at().await {
        Some(_) => (true, None::<String>),
        None => (false, Some("catalog has not been loaded".to_string())),
    };

    // 2) Disk write/read/delete check (use a temp file under the store dir)
    let base_path = &state.store.base_path;
    let tmp_path = base_path.join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::create_dir_all(base_path).await {
        Err(e) => (false, Some(format!("could not create data dir: {}", e))),
        Ok(_) => match fs::write(&tmp_path, b"readyz").await {
            Ok(_) => {
                let read_back = fs::read(&tmp_path).await;
                let _ = fs::remove_file(&tmp_path).await; // best-effort cleanup
                match read_back {
                    Ok(bytes) if bytes == b"readyz" => (true, None),
                    Ok(_) => (false, Some("file content mismatch".to_string())),
                    Err(e) => (false, Some(format!("could not read tmp file: {}", e))),
                }
            }
            Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
        },
    };

    // Build response JSON
    let overall_ok = catalog_check.0 && disk_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "catalog",
        CheckStatus {
            ok: catalog_check.0,
            error: catalog_check.1,
        },
    );
    checks.insert(
        "disk",
        CheckStatus {
            ok: disk_check.0,
            error: disk_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
