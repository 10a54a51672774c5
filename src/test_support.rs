//! Shared fixtures for unit tests.

use crate::{
    events::EventBus,
    models::{
        attachment::Attachment,
        fruit::{FruitRecord, NutritionInfo},
    },
    report::layout::ReportField,
    services::{
        attachment_store::AttachmentStore,
        catalog_service::{CatalogResult, CatalogService, CatalogSource},
        report_service::{ReportGenerator, ReportService},
    },
    state::AppState,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{ImageBuffer, ImageFormat, Rgb};
use std::{io::Cursor, path::Path, sync::Arc};

pub fn fruit(name: &str, family: &str, calories: f64) -> FruitRecord {
    FruitRecord {
        name: name.to_string(),
        genus: format!("{} genus", name),
        family: family.to_string(),
        order: "Rosales".to_string(),
        nutritions: NutritionInfo {
            carbohydrates: 11.4,
            protein: 0.3,
            fat: 0.4,
            calories,
            sugar: 10.3,
        },
    }
}

/// A PNG gradient of the requested size.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("encoding a PNG in memory");
    out.into_inner()
}

/// An attachment carrying no real image; for text rendering only.
pub fn attachment_at(name: &str, timestamp: DateTime<Utc>) -> Attachment {
    Attachment {
        name: name.to_string(),
        file: format!("{}.jpg", name.to_lowercase()),
        bytes: Bytes::new(),
        timestamp,
        width: 1,
        height: 1,
    }
}

pub struct StaticCatalogSource(pub Vec<FruitRecord>);

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self) -> CatalogResult<Vec<FruitRecord>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "static".into()
    }
}

/// Application state over a scratch directory, with the catalog loaded.
pub async fn app_state(dir: &Path, fruits: Vec<FruitRecord>) -> AppState {
    let events = EventBus::default();
    let catalog = CatalogService::new(Arc::new(StaticCatalogSource(fruits)), events.clone());
    catalog.refresh().await;
    AppState {
        catalog,
        store: AttachmentStore::new(dir.join("attachments"), 80, events.clone()),
        reports: ReportService::new(
            ReportGenerator::new(ReportField::DEFAULT.to_vec()),
            dir.join("exports"),
            events.clone(),
        ),
        events,
    }
}
