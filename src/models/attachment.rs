//! Photo attachments and the manifest that indexes them on disk.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;

/// A photo bound to one fruit name.
///
/// `bytes` always holds the encoded JPEG exactly as it sits on disk under
/// `file`; `width`/`height` are the decoded pixel dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub file: String,
    pub bytes: Bytes,
    pub timestamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

impl Attachment {
    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            file: self.file.clone(),
            timestamp: self.timestamp,
            width: self.width,
            height: self.height,
            size_bytes: self.bytes.len(),
        }
    }
}

/// Attachment metadata without the payload, as exposed by list endpoints.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AttachmentSummary {
    pub file: String,
    pub timestamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

/// One manifest record: where the image lives and when it was captured.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    pub file: String,

    /// Written as RFC 3339; read from either RFC 3339 or Unix seconds.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Fruit name → entry. Ordered so identical state serializes identically.
pub type Manifest = BTreeMap<String, ManifestEntry>;

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Rfc3339(DateTime<Utc>),
        Seconds(f64),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Rfc3339(ts) => Ok(ts),
        RawTimestamp::Seconds(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
                .ok_or_else(|| de::Error::custom(format!("timestamp {} out of range", secs)))
        }
    }
}
