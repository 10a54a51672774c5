//! Domain services: catalog fetching, attachment storage, report export.

pub mod attachment_store;
pub mod catalog_service;
pub mod report_service;
