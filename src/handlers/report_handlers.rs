//! GET `/report`: export the PDF report and send it back.

use crate::{errors::AppError, services::report_service::REPORT_FILE_NAME, state::AppState};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};

pub async fn export_report(State(state): State<AppState>) -> Result<Response, AppError> {
    let catalog = state.catalog.current().await;
    let exported = state
        .reports
        .export(catalog, &state.store)
        .await
        .ok_or_else(|| AppError::internal("report export failed"))?;

    let pages = exported.report.page_count();
    let length = exported.report.pdf.len();
    let mut response = Response::new(Body::from(exported.report.pdf));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", REPORT_FILE_NAME))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(
        HeaderName::from_static("x-report-pages"),
        HeaderValue::from(pages),
    );

    Ok(response)
}
