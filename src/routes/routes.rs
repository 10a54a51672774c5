//! Defines routes for the catalog, attachments, report export and events.
//!
//! ## Structure
//! - **Catalog endpoints**
//!   - `GET    /fruits`: catalog with attachment summaries
//!   - `GET    /fruits/{name}`: one fruit
//!   - `POST   /catalog/refresh`: re-fetch the catalog
//!
//! - **Attachment endpoints**
//!   - `PUT    /fruits/{name}/image`: attach or replace a photo
//!   - `GET    /fruits/{name}/image`: download the stored JPEG
//!   - `DELETE /fruits/{name}/image`: remove the photo
//!
//! - **Output**
//!   - `GET    /report`: export and download the PDF report
//!   - `GET    /events`: server-sent change notifications

use crate::{
    handlers::{
        event_handlers::stream_events,
        fruit_handlers::{
            delete_image, get_fruit, get_image, list_fruits, refresh_catalog, upload_image,
        },
        health_handlers::{healthz, readyz},
        report_handlers::export_report,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for every endpoint.
///
/// The router carries shared state (`AppState`) to all handlers; uploads
/// may be up to `max_upload_bytes` long.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Catalog routes
        .route("/fruits", get(list_fruits))
        .route("/fruits/{name}", get(get_fruit))
        .route("/catalog/refresh", post(refresh_catalog))
        // Attachment routes
        .route(
            "/fruits/{name}/image",
            get(get_image).put(upload_image).delete(delete_image),
        )
        // Output routes
        .route("/report", get(export_report))
        .route("/events", get(stream_events))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handlers::fruit_handlers::CAPTURED_AT_HEADER,
        services::catalog_service::CatalogService,
        test_support::{StaticCatalogSource, app_state, fruit, sample_png},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    const LIMIT: usize = 4 * 1024 * 1024;

    async fn app(dir: &std::path::Path) -> (Router, AppState) {
        let state = app_state(
            dir,
            vec![
                fruit("Apple", "Rosaceae", 52.0),
                fruit("Banana", "Musaceae", 96.0),
            ],
        )
        .await;
        (routes(LIMIT).with_state(state.clone()), state)
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), LIMIT).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn put_image(name: &str, body: Vec<u8>) -> Request<Body> {
        Request::put(format!("/fruits/{}/image", name))
            .header(CAPTURED_AT_HEADER, "2026-10-18T09:30:00Z")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_readiness() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, _) = app(tmp.path()).await;

        let health = send(&router, Request::get("/healthz").body(Body::empty()).unwrap()).await;
        assert_eq!(health.status(), StatusCode::OK);

        let ready = send(&router, Request::get("/readyz").body(Body::empty()).unwrap()).await;
        assert_eq!(ready.status(), StatusCode::OK);
        let body = json(ready).await;
        assert_eq!(body["checks"]["catalog"]["ok"], true);
        assert_eq!(body["checks"]["disk"]["ok"], true);
    }

    #[tokio::test]
    async fn readiness_fails_until_the_catalog_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = app_state(tmp.path(), vec![]).await;
        state.catalog = CatalogService::new(
            Arc::new(StaticCatalogSource(vec![fruit("Apple", "Rosaceae", 52.0)])),
            state.events.clone(),
        );
        let router = routes(LIMIT).with_state(state.clone());

        let ready = send(&router, Request::get("/readyz").body(Body::empty()).unwrap()).await;
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json(ready).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["checks"]["catalog"]["ok"], false);
        assert_eq!(body["checks"]["disk"]["ok"], true);

        state.catalog.refresh().await;
        let ready = send(&router, Request::get("/readyz").body(Body::empty()).unwrap()).await;
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn events_stream_attachment_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, state) = app(tmp.path()).await;

        let response = send(&router, Request::get("/events").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let taken = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        state.store.put("Apple", &sample_png(4, 4), taken).await.unwrap();

        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("event within timeout")
            .expect("stream still open")
            .unwrap();
        let frame = String::from_utf8(chunk.to_vec()).unwrap();

        assert!(frame.starts_with("event: attachment_changed\n"), "{frame}");
        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let payload: Value = serde_json::from_str(data).unwrap();
        assert_eq!(payload["type"], "attachment_changed");
        assert_eq!(payload["name"], "Apple");
        assert_eq!(payload["timestamp"], "2026-10-18T09:30:00Z");
    }

    #[tokio::test]
    async fn upload_list_download_delete_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, state) = app(tmp.path()).await;

        let uploaded = send(&router, put_image("Apple", sample_png(200, 100))).await;
        assert_eq!(uploaded.status(), StatusCode::OK);
        assert!(uploaded.headers().contains_key(header::ETAG));
        let summary = json(uploaded).await;
        assert_eq!(summary["width"], 200);
        assert_eq!(summary["timestamp"], "2026-10-18T09:30:00Z");

        let listed = json(send(&router, Request::get("/fruits").body(Body::empty()).unwrap()).await).await;
        assert_eq!(listed[0]["name"], "Apple");
        assert_eq!(listed[0]["image"]["height"], 100);
        assert!(listed[1]["image"].is_null());

        let image = send(&router, Request::get("/fruits/Apple/image").body(Body::empty()).unwrap()).await;
        assert_eq!(image.status(), StatusCode::OK);
        assert_eq!(image.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert!(image.headers().contains_key("content-md5"));
        let bytes = to_bytes(image.into_body(), LIMIT).await.unwrap();
        assert_eq!(bytes, state.store.get("Apple").await.unwrap().bytes);

        let deleted = send(
            &router,
            Request::delete("/fruits/Apple/image").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let gone = send(&router, Request::get("/fruits/Apple/image").body(Body::empty()).unwrap()).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        let again = send(
            &router,
            Request::delete("/fruits/Apple/image").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn uploads_are_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, state) = app(tmp.path()).await;

        let unknown = send(&router, put_image("Durian", sample_png(4, 4))).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let garbage = send(&router, put_image("Apple", b"not an image".to_vec())).await;
        assert_eq!(garbage.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(garbage).await["status"], 422);

        let bad_date = Request::put("/fruits/Apple/image")
            .header(CAPTURED_AT_HEADER, "last tuesday")
            .body(Body::from(sample_png(4, 4)))
            .unwrap();
        assert_eq!(send(&router, bad_date).await.status(), StatusCode::BAD_REQUEST);

        assert!(state.store.get("Apple").await.is_none());
    }

    #[tokio::test]
    async fn unknown_fruit_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, _) = app(tmp.path()).await;

        let response = send(&router, Request::get("/fruits/Durian").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let found = send(&router, Request::get("/fruits/Banana").body(Body::empty()).unwrap()).await;
        assert_eq!(json(found).await["family"], "Musaceae");
    }

    #[tokio::test]
    async fn report_contains_one_page_per_attachment() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, state) = app(tmp.path()).await;
        send(&router, put_image("Banana", sample_png(30, 90))).await;

        let response = send(&router, Request::get("/report").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(response.headers()["x-report-pages"], "1");
        let pdf = to_bytes(response.into_body(), LIMIT).await.unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(std::fs::read(state.reports.export_path()).unwrap(), pdf);
    }

    #[tokio::test]
    async fn refresh_reports_catalog_size() {
        let tmp = tempfile::tempdir().unwrap();
        let (router, _) = app(tmp.path()).await;

        let response = send(
            &router,
            Request::post("/catalog/refresh").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(json(response).await["count"], 2);
    }
}
