use crate::error::FetchError;
use crate::store::PageMetadata;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Title written by clients while a preview is still being fetched.
///
/// A record carrying it is provisional and is never treated as a cache hit.
pub const PLACEHOLDER_TITLE: &str = "Loading preview...";

/// Where a preview record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewSource {
    Local,
    Remote,
    Fetch,
    Custom,
}

/// Cached display metadata for a URL.
///
/// Records are keyed by URL, so every link saved with the same URL shares one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRecord {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub site_name: String,
    pub timestamp: Timestamp,
    pub source: PreviewSource,
    #[serde(default)]
    pub is_custom: bool,
}

/// Fields a user may override on a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomPreview {
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}

impl PreviewRecord {
    /// Builds a record from a successful metadata fetch.
    ///
    /// Fails with [`FetchError::Malformed`] when the metadata has no usable title.
    pub fn from_metadata(url: &str, metadata: PageMetadata) -> Result<Self, FetchError> {
        let title = metadata
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::Malformed(format!("no title for {url}")))?;

        Ok(Self {
            url: url.to_string(),
            title,
            description: metadata.description.unwrap_or_default(),
            image: metadata.image.filter(|i| !i.is_empty()),
            site_name: metadata.site_name.unwrap_or_default(),
            timestamp: Timestamp::now(),
            source: PreviewSource::Fetch,
            is_custom: false,
        })
    }

    /// Builds a user-overridden record.
    pub fn custom(url: &str, fields: CustomPreview) -> Self {
        Self {
            url: url.to_string(),
            title: fields.title,
            description: fields.description.unwrap_or_default(),
            image: fields.image,
            site_name: fields.site_name.unwrap_or_default(),
            timestamp: Timestamp::now(),
            source: PreviewSource::Custom,
            is_custom: true,
        }
    }

    /// The provisional record stored while a fetch is outstanding.
    pub fn placeholder(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: PLACEHOLDER_TITLE.to_string(),
            description: String::new(),
            image: None,
            site_name: String::new(),
            timestamp: Timestamp::now(),
            source: PreviewSource::Remote,
            is_custom: false,
        }
    }

    /// Whether this record carries real metadata rather than a placeholder.
    pub fn is_authoritative(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && title != PLACEHOLDER_TITLE
    }

    /// Tags the record with the tier it was read from. Custom records keep
    /// their source.
    pub fn read_from(mut self, source: PreviewSource) -> Self {
        if !self.is_custom {
            self.source = source;
        }
        self
    }
}

/// Per-URL transient fetch state. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    /// Still loading after the slow threshold; purely informational.
    Slow,
    Failed,
    Done,
}

impl FetchState {
    pub fn is_pending(self) -> bool {
        matches!(self, FetchState::Loading | FetchState::Slow)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FetchState::Failed | FetchState::Done)
    }
}

/// What a caller gets back when asking for a preview.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Success(PreviewRecord),
    /// A fetch is outstanding. `slow` is set once it has been running past the
    /// slow threshold, so the caller can show a "may take a moment" hint.
    Pending { slow: bool },
    Failed(FetchError),
}

impl Preview {
    pub fn record(&self) -> Option<&PreviewRecord> {
        match self {
            Preview::Success(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Preview::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Preview::Failed(_))
    }
}

/// Read access to already-resolved preview titles, used for ordering and search.
pub trait PreviewTitles {
    /// Returns the authoritative preview title for `url`, if one is known.
    fn preview_title(&self, url: &str) -> Option<String>;
}

impl PreviewTitles for HashMap<String, PreviewRecord> {
    fn preview_title(&self, url: &str) -> Option<String> {
        self.get(url)
            .filter(|r| r.is_authoritative())
            .map(|r| r.title.clone())
    }
}

impl PreviewTitles for HashMap<String, String> {
    fn preview_title(&self, url: &str) -> Option<String> {
        self.get(url).cloned()
    }
}

impl PreviewTitles for () {
    fn preview_title(&self, _url: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: Option<&str>) -> PageMetadata {
        PageMetadata {
            title: title.map(str::to_string),
            description: Some("desc".to_string()),
            image: Some(String::new()),
            site_name: Some("Example".to_string()),
            success: true,
        }
    }

    #[test]
    fn from_metadata_builds_fetch_record() {
        let record = PreviewRecord::from_metadata("https://a.com", metadata(Some(" A "))).unwrap();
        assert_eq!(record.title, "A");
        assert_eq!(record.source, PreviewSource::Fetch);
        assert_eq!(record.image, None);
        assert!(!record.is_custom);
    }

    #[test]
    fn from_metadata_rejects_missing_title() {
        let err = PreviewRecord::from_metadata("https://a.com", metadata(Some("  "))).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(PreviewRecord::from_metadata("https://a.com", metadata(None)).is_err());
    }

    #[test]
    fn placeholder_is_not_authoritative() {
        assert!(!PreviewRecord::placeholder("https://a.com").is_authoritative());
    }

    #[test]
    fn read_from_keeps_custom_source() {
        let custom = PreviewRecord::custom(
            "https://a.com",
            CustomPreview {
                title: "Mine".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(custom.read_from(PreviewSource::Local).source, PreviewSource::Custom);
    }

    #[test]
    fn serializes_with_wire_names() {
        let record = PreviewRecord::custom(
            "https://a.com",
            CustomPreview {
                title: "Mine".to_string(),
                site_name: Some("A".to_string()),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "custom");
        assert_eq!(json["isCustom"], true);
        assert_eq!(json["siteName"], "A");
    }

    #[test]
    fn title_lookup_skips_placeholders() {
        let mut map = HashMap::new();
        map.insert(
            "https://a.com".to_string(),
            PreviewRecord::placeholder("https://a.com"),
        );
        assert_eq!(map.preview_title("https://a.com"), None);
    }
}
