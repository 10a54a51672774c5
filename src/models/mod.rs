//! Core data models for the fruit catalog.
//!
//! Fruit records are decoded from the catalog API and never persisted.
//! Attachments are persisted as JPEG files indexed by a JSON manifest.

pub mod attachment;
pub mod fruit;
