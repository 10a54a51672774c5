//! HTTP handlers. Each delegates to the services held in [`AppState`](crate::state::AppState).

pub mod event_handlers;
pub mod fruit_handlers;
pub mod health_handlers;
pub mod report_handlers;
