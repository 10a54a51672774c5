//! HTTP handlers for the catalog and per-fruit photo attachments.
//! Uploads are buffered whole: the store needs the complete image to decode
//! and re-encode it.

use crate::{
    errors::AppError,
    models::{attachment::AttachmentSummary, fruit::FruitRecord},
    state::AppState,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Request header carrying the capture time of an uploaded photo (RFC 3339).
pub const CAPTURED_AT_HEADER: &str = "x-captured-at";

/// A catalog entry plus its attachment, if one is stored.
#[derive(Debug, Serialize)]
pub struct FruitView {
    #[serde(flatten)]
    pub fruit: FruitRecord,
    pub image: Option<AttachmentSummary>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// GET `/fruits`: the catalog in upstream order.
pub async fn list_fruits(State(state): State<AppState>) -> Json<Vec<FruitView>> {
    let catalog = state.catalog.current().await;
    let mut images = state.store.list().await;

    let views = catalog
        .fruits()
        .iter()
        .map(|fruit| FruitView {
            fruit: fruit.clone(),
            image: images.remove(&fruit.name),
        })
        .collect();
    Json(views)
}

/// GET `/fruits/{name}`
pub async fn get_fruit(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FruitView>, AppError> {
    let catalog = state.catalog.current().await;
    let fruit = catalog
        .get(&name)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("fruit `{}` not found", name)))?;
    let image = state.store.get(&name).await.map(|a| a.summary());

    Ok(Json(FruitView { fruit, image }))
}

/// POST `/catalog/refresh`: fetch the catalog again.
pub async fn refresh_catalog(State(state): State<AppState>) -> Json<RefreshResponse> {
    let count = state.catalog.refresh().await;
    Json(RefreshResponse { count })
}

/// PUT `/fruits/{name}/image`: attach (or replace) a photo.
///
/// The capture time comes from `x-captured-at`, defaulting to now.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if state.catalog.current().await.get(&name).is_none() {
        return Err(AppError::not_found(format!("fruit `{}` not found", name)));
    }
    if body.is_empty() {
        return Err(AppError::bad_request("image body is empty"));
    }
    let timestamp = captured_at(&headers)?;

    let attachment = state.store.put(&name, &body, timestamp).await?;

    let mut response = Json(attachment.summary()).into_response();
    if let Ok(value) = HeaderValue::from_str(&etag(&attachment.bytes)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// GET `/fruits/{name}/image`: the stored JPEG.
pub async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let attachment = state
        .store
        .get(&name)
        .await
        .ok_or_else(|| AppError::not_found(format!("no image for `{}`", name)))?;

    let digest = md5::compute(&attachment.bytes);
    let mut response = Response::new(Body::from(attachment.bytes.clone()));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(attachment.bytes.len()));
    if let Ok(value) = HeaderValue::from_str(&format!("\"{:x}\"", digest)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&general_purpose::STANDARD.encode(digest.0)) {
        headers.insert(HeaderName::from_static("content-md5"), value);
    }
    if let Ok(value) = HeaderValue::from_str(&attachment.timestamp.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    Ok(response)
}

/// DELETE `/fruits/{name}/image`
pub async fn delete_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.store.remove(&name).await {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::not_found(format!("no image for `{}`", name))),
    }
}

fn captured_at(headers: &HeaderMap) -> Result<DateTime<Utc>, AppError> {
    let Some(raw) = headers.get(CAPTURED_AT_HEADER) else {
        return Ok(Utc::now());
    };
    raw.to_str()
        .ok()
        .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| AppError::bad_request(format!("{} must be an RFC 3339 timestamp", CAPTURED_AT_HEADER)))
}

fn etag(bytes: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capture_header_defaults_to_now() {
        let before = Utc::now();
        let ts = captured_at(&HeaderMap::new()).unwrap();
        assert!(ts >= before);
    }

    #[test]
    fn capture_header_must_be_rfc3339() {
        let mut headers = HeaderMap::new();
        headers.insert(CAPTURED_AT_HEADER, HeaderValue::from_static("2026-10-18T09:30:00+02:00"));
        assert_eq!(
            captured_at(&headers).unwrap().to_rfc3339(),
            "2026-10-18T07:30:00+00:00"
        );

        headers.insert(CAPTURED_AT_HEADER, HeaderValue::from_static("yesterday"));
        assert_eq!(captured_at(&headers).unwrap_err().status, StatusCode::BAD_REQUEST);
    }
}
