//! Shared application state handed to every handler.

use crate::{
    events::EventBus,
    services::{
        attachment_store::AttachmentStore, catalog_service::CatalogService,
        report_service::ReportService,
    },
};

/// Cheap to clone: every member is a handle onto shared state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub store: AttachmentStore,
    pub reports: ReportService,
    pub events: EventBus,
}
