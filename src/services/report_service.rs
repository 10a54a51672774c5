//! Report generation and export.
//!
//! [`ReportGenerator`] is pure: catalog + attachment snapshot in, PDF bytes
//! out. [`ReportService`] runs it off the async executor, writes the result
//! to the export directory, and publishes `ReportExported`.

use crate::{
    events::{AppEvent, EventBus},
    imaging,
    models::{attachment::Attachment, fruit::Catalog},
    report::{
        layout::{MARGIN, ReportField, layout_page},
        pdf::{self, DocumentInfo, PdfPage, TextLine},
    },
    services::attachment_store::AttachmentStore,
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{fs, sync::Mutex, task};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const REPORT_FILE_NAME: &str = "FruitReport.pdf";
const REPORT_TITLE: &str = "Fruit Report";
const REPORT_CREATOR: &str = "Fruit Catalog";
const REPORT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report generation task failed: {0}")]
    Join(#[from] task::JoinError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// A finished document plus the fruit behind each page, in page order.
#[derive(Clone, Debug)]
pub struct Report {
    pub pdf: Vec<u8>,
    pub pages: Vec<String>,
}

impl Report {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A report that has been written to disk.
#[derive(Clone, Debug)]
pub struct ExportedReport {
    pub path: PathBuf,
    pub report: Report,
}

pub struct ReportGenerator {
    fields: Vec<ReportField>,
}

impl ReportGenerator {
    pub fn new(fields: Vec<ReportField>) -> Self {
        Self { fields }
    }

    /// One page per catalog fruit that has an attachment, in catalog order.
    ///
    /// Attachments whose bytes no longer decode are skipped with a warning;
    /// they never abort the report.
    pub fn generate(
        &self,
        catalog: &Catalog,
        attachments: &HashMap<String, Attachment>,
        created_at: DateTime<Utc>,
    ) -> Report {
        let mut pages = Vec::new();
        let mut names = Vec::new();

        for fruit in catalog.fruits() {
            let Some(attachment) = attachments.get(&fruit.name) else {
                continue;
            };
            let image = match imaging::encode_jpeg(&attachment.bytes, REPORT_JPEG_QUALITY) {
                Ok(image) => image,
                Err(err) => {
                    warn!("skipping report page for `{}`: {}", fruit.name, err);
                    continue;
                }
            };

            let texts: Vec<String> = self
                .fields
                .iter()
                .map(|field| field.render(fruit, attachment))
                .collect();
            let layout = layout_page(texts.len(), f64::from(image.width), f64::from(image.height));
            let lines = texts
                .into_iter()
                .zip(layout.line_tops)
                .map(|(text, top)| TextLine { x: MARGIN, top, text })
                .collect();

            pages.push(PdfPage {
                lines,
                image,
                image_rect: layout.image,
            });
            names.push(fruit.name.clone());
        }

        let info = DocumentInfo {
            title: REPORT_TITLE.to_string(),
            creator: REPORT_CREATOR.to_string(),
            created_at,
        };
        debug!("rendering report with {} pages", pages.len());

        Report {
            pdf: pdf::render(&pages, &info),
            pages: names,
        }
    }
}

#[derive(Clone)]
pub struct ReportService {
    generator: Arc<ReportGenerator>,
    export_dir: PathBuf,
    export_lock: Arc<Mutex<()>>,
    events: EventBus,
}

impl ReportService {
    pub fn new(generator: ReportGenerator, export_dir: impl Into<PathBuf>, events: EventBus) -> Self {
        Self {
            generator: Arc::new(generator),
            export_dir: export_dir.into(),
            export_lock: Arc::new(Mutex::new(())),
            events,
        }
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir.join(REPORT_FILE_NAME)
    }

    /// Render on the blocking pool; image re-encoding dominates the cost.
    pub async fn build(
        &self,
        catalog: Arc<Catalog>,
        attachments: HashMap<String, Attachment>,
    ) -> ReportResult<Report> {
        let generator = self.generator.clone();
        let report =
            task::spawn_blocking(move || generator.generate(&catalog, &attachments, Utc::now()))
                .await?;
        Ok(report)
    }

    /// Generate a report from the current store contents and write it to
    /// [`export_path`](Self::export_path).
    ///
    /// Exports are serialized, so two concurrent calls never interleave
    /// writes to the same file. Any failure is logged and yields `None`.
    pub async fn export(
        &self,
        catalog: Arc<Catalog>,
        store: &AttachmentStore,
    ) -> Option<ExportedReport> {
        let _guard = self.export_lock.lock().await;

        let report = match self.build(catalog, store.snapshot().await).await {
            Ok(report) => report,
            Err(err) => {
                warn!("report generation failed: {}", err);
                return None;
            }
        };

        let path = self.export_path();
        if let Err(err) = write_report(&self.export_dir, &path, &report.pdf).await {
            warn!("could not write report to {}: {}", path.display(), err);
            return None;
        }

        info!(
            "exported report with {} pages to {}",
            report.page_count(),
            path.display()
        );
        self.events.publish(AppEvent::ReportExported {
            pages: report.page_count(),
            path: path.clone(),
        });

        Some(ExportedReport { path, report })
    }
}

async fn write_report(dir: &Path, path: &Path, pdf: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir).await?;
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    if let Err(err) = fs::write(&tmp_path, pdf).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    Ok(())
}
