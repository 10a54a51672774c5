//! src/services/attachment_store.rs
//!
//! AttachmentStore: one optional photo per fruit name. Payloads are JPEG
//! files beneath `base_path`; a single JSON manifest (`FruitImageInfo.json`)
//! maps each fruit name to its file and capture timestamp. The manifest is
//! rewritten after every mutation and is always replaced via temp + rename.

use crate::{
    events::{AppEvent, EventBus},
    imaging,
    models::attachment::{Attachment, AttachmentSummary, Manifest, ManifestEntry},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    ffi::OsStr,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::Mutex,
    task,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MANIFEST_FILE_NAME: &str = "FruitImageInfo.json";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const MAX_NAME_LEN: usize = 256;
const MAX_SLUG_LEN: usize = 64;
const IMAGE_EXTENSION: &str = "jpg";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid fruit name")]
    InvalidName,
    #[error("image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),
    #[error(transparent)]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("image task failed: {0}")]
    Join(#[from] task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// AttachmentStore provides the durable name → photo mapping:
/// - put: re-encode, write the JPEG, swap the entry, persist the manifest
/// - get: in-memory lookup
/// - remove: drop the entry and its file, persist the manifest
/// - load_all: rebuild memory from the manifest, skipping unreadable files
///
/// Clones share the same in-memory map. Mutations are serialized by the map
/// lock, which is held across the file writes they perform.
#[derive(Clone)]
pub struct AttachmentStore {
    /// Directory holding the manifest and every image file.
    pub base_path: PathBuf,

    jpeg_quality: u8,
    entries: Arc<Mutex<HashMap<String, Attachment>>>,
    events: EventBus,
}

impl AttachmentStore {
    pub fn new(base_path: impl Into<PathBuf>, jpeg_quality: u8, events: EventBus) -> Self {
        Self {
            base_path: base_path.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_path.join(MANIFEST_FILE_NAME)
    }

    /// Store `image_bytes` as the photo for `name`, replacing any previous one.
    ///
    /// The input may be any decodable format; it is always stored as JPEG at
    /// the configured quality, so the returned attachment (and later `get`s)
    /// carry the re-encoded bytes. Undecodable input leaves the store as is.
    /// A manifest write failure is logged; the attachment still counts as
    /// stored and the next successful persist picks it up.
    pub async fn put(
        &self,
        name: &str,
        image_bytes: &[u8],
        timestamp: DateTime<Utc>,
    ) -> StoreResult<Attachment> {
        ensure_name_valid(name)?;
        let source = image_bytes.to_vec();
        let quality = self.jpeg_quality;
        let encoded = run_blocking(move || imaging::encode_jpeg(&source, quality))
            .await?
            .map_err(StoreError::Decode)?;
        let file = attachment_file_name(name);

        let mut entries = self.entries.lock().await;
        fs::create_dir_all(&self.base_path).await?;
        write_atomic(&self.base_path.join(&file), &encoded.bytes).await?;

        let attachment = Attachment {
            name: name.to_string(),
            file,
            bytes: Bytes::from(encoded.bytes),
            timestamp,
            width: encoded.width,
            height: encoded.height,
        };

        let previous = entries.insert(name.to_string(), attachment.clone());

        // The old file stays until the manifest on disk no longer names it.
        match self.persist_locked(&entries).await {
            Ok(()) => {
                if let Some(previous) = previous.filter(|p| p.file != attachment.file) {
                    self.remove_file_best_effort(&previous.file).await;
                }
            }
            Err(err) => warn!("manifest not persisted after storing `{}`: {}", name, err),
        }
        drop(entries);

        debug!(
            "stored {}x{} image for `{}` ({} bytes)",
            attachment.width,
            attachment.height,
            name,
            attachment.bytes.len()
        );
        self.events.publish(AppEvent::AttachmentChanged {
            name: name.to_string(),
            timestamp: Some(timestamp),
        });

        Ok(attachment)
    }

    /// Remove the photo for `name` and delete its file.
    ///
    /// Returns the removed attachment, or `None` when there was nothing to
    /// remove (in which case nothing is written or published).
    pub async fn remove(&self, name: &str) -> Option<Attachment> {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(name)?;

        self.remove_file_best_effort(&removed.file).await;
        if let Err(err) = self.persist_locked(&entries).await {
            warn!("manifest not persisted after removing `{}`: {}", name, err);
        }
        drop(entries);

        self.events.publish(AppEvent::AttachmentChanged {
            name: name.to_string(),
            timestamp: None,
        });

        Some(removed)
    }

    pub async fn get(&self, name: &str) -> Option<Attachment> {
        self.entries.lock().await.get(name).cloned()
    }

    /// Copy of every live attachment, for report generation.
    pub async fn snapshot(&self) -> HashMap<String, Attachment> {
        self.entries.lock().await.clone()
    }

    /// Payload-free view of every live attachment, keyed by fruit name.
    pub async fn list(&self) -> BTreeMap<String, AttachmentSummary> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(name, attachment)| (name.clone(), attachment.summary()))
            .collect()
    }

    /// Rebuild the in-memory map from the manifest on disk.
    ///
    /// A missing manifest means an empty store. An unreadable or malformed
    /// manifest is logged and also yields an empty store. Entries whose file
    /// is missing, unreadable, or not a decodable image are dropped, and the
    /// manifest is rewritten without them.
    ///
    /// Returns the number of attachments that resolved.
    pub async fn load_all(&self) -> usize {
        let manifest = match self.read_manifest().await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    "ignoring unreadable manifest {}: {}",
                    self.manifest_path().display(),
                    err
                );
                Manifest::new()
            }
        };

        let listed = manifest.len();
        let mut loaded = HashMap::with_capacity(listed);
        for (name, entry) in manifest {
            if let Some(attachment) = self.load_entry(&name, entry).await {
                loaded.insert(name, attachment);
            }
        }

        let count = loaded.len();
        *self.entries.lock().await = loaded;
        if count < listed {
            let _ = self.persist().await;
        }
        info!(
            "loaded {} of {} attachments from {}",
            count,
            listed,
            self.base_path.display()
        );
        count
    }

    /// Write the current manifest, replacing whatever is on disk.
    pub async fn persist(&self) -> StoreResult<()> {
        let entries = self.entries.lock().await;
        self.persist_locked(&entries).await.inspect_err(|err| {
            warn!(
                "failed to persist manifest {}: {}",
                self.manifest_path().display(),
                err
            )
        })
    }

    async fn persist_locked(&self, entries: &HashMap<String, Attachment>) -> StoreResult<()> {
        let manifest: Manifest = entries
            .iter()
            .map(|(name, attachment)| {
                (
                    name.clone(),
                    ManifestEntry {
                        file: attachment.file.clone(),
                        timestamp: attachment.timestamp,
                    },
                )
            })
            .collect();

        let body = serde_json::to_vec_pretty(&manifest)?;
        fs::create_dir_all(&self.base_path).await?;
        write_atomic(&self.manifest_path(), &body).await?;
        debug!("persisted manifest with {} entries", manifest.len());
        Ok(())
    }

    async fn read_manifest(&self) -> StoreResult<Manifest> {
        match fs::read(self.manifest_path()).await {
            Ok(body) => Ok(serde_json::from_slice(&body)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Manifest::new()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn load_entry(&self, name: &str, entry: ManifestEntry) -> Option<Attachment> {
        if ensure_name_valid(name).is_err() || !is_plain_file_name(&entry.file) {
            debug!("skipping manifest entry `{}` with unsafe name or file", name);
            return None;
        }

        let path = self.base_path.join(&entry.file);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("skipping `{}`: cannot read {}: {}", name, path.display(), err);
                return None;
            }
        };
        let probed = run_blocking(move || {
            let dimensions = imaging::probe_dimensions(&bytes);
            (bytes, dimensions)
        })
        .await;
        let (bytes, width, height) = match probed {
            Ok((bytes, Ok((width, height)))) => (bytes, width, height),
            Ok((_, Err(err))) => {
                debug!("skipping `{}`: {} does not decode: {}", name, path.display(), err);
                return None;
            }
            Err(err) => {
                warn!("skipping `{}`: {}", name, err);
                return None;
            }
        };

        Some(Attachment {
            name: name.to_string(),
            file: entry.file,
            bytes: Bytes::from(bytes),
            timestamp: entry.timestamp,
            width,
            height,
        })
    }

    async fn remove_file_best_effort(&self, file: &str) {
        let path = self.base_path.join(file);
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed image file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("image file {} already missing", path.display());
            }
            Err(err) => warn!("failed to remove image file {}: {}", path.display(), err),
        }
    }
}

/// Run CPU-bound image work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> StoreResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(task::spawn_blocking(work).await?)
}

/// Reject names that cannot serve as a manifest key.
///
/// Names never reach the filesystem directly (see [`attachment_file_name`]),
/// so this only guards against empty, oversized, or control-character keys.
fn ensure_name_valid(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidName);
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::InvalidName);
    }
    Ok(())
}

/// Deterministic on-disk file name for a fruit's photo.
///
/// `{slug}-{hash}.jpg`, where the slug keeps lowercase ASCII alphanumerics
/// and collapses everything else to `-`, and the hash is the first 8 hex
/// digits of MD5(name). Two names sharing a slug still get distinct files.
pub fn attachment_file_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for c in name.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("fruit");
    }

    let digest = md5::compute(name.as_bytes());
    format!(
        "{}-{:02x}{:02x}{:02x}{:02x}.{}",
        slug, digest[0], digest[1], digest[2], digest[3], IMAGE_EXTENSION
    )
}

/// True if `file` is a single path component (no separators, no `..`).
fn is_plain_file_name(file: &str) -> bool {
    !file.starts_with('.') && Path::new(file).file_name() == Some(OsStr::new(file))
}

/// Write `bytes` to `target` through a sibling temp file.
///
/// The temp file is fsynced and renamed over `target`, so readers see either
/// the old content or the new content, never a partial write.
async fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(ErrorKind::Other, "target path missing parent directory"))?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    let written = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<_, io::Error>(())
    }
    .await;
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    if let Err(err) = fs::rename(&tmp_path, target).await {
        if err.kind() == ErrorKind::AlreadyExists {
            fs::remove_file(target).await?;
            fs::rename(&tmp_path, target).await?;
        } else {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    }
    Ok(())
}
