use crate::error::MalformedUrl;
use crate::url::normalize_url;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One saved link in a user's collection.
///
/// The `id` is assigned by the document store and is unique within a
/// collection. The same `url` may appear on several records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub id: String,
    pub url: String,
    /// Title captured when the link was saved.
    #[serde(default)]
    pub title: Option<String>,
    /// User override for the displayed title.
    #[serde(default)]
    pub custom_title: Option<String>,
    pub platform: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub last_updated: Option<Timestamp>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub has_reminder: bool,
    #[serde(default)]
    pub reminder_context: Option<String>,
    #[serde(default)]
    pub reminder_scheduled_for: Option<Timestamp>,
}

impl LinkRecord {
    /// Creates a record for a newly added link.
    ///
    /// The URL is normalized and the platform tag derived from it; a URL that
    /// fails normalization is rejected here, before it can reach any cache.
    pub fn new(
        id: impl Into<String>,
        raw_url: &str,
        created_at: Timestamp,
    ) -> Result<Self, MalformedUrl> {
        let url = normalize_url(raw_url)?;
        let platform = detect_platform(&url).to_string();
        Ok(Self {
            id: id.into(),
            url,
            title: None,
            custom_title: None,
            platform,
            created_at,
            last_updated: None,
            is_favorite: false,
            has_reminder: false,
            reminder_context: None,
            reminder_scheduled_for: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_custom_title(mut self, title: impl Into<String>) -> Self {
        self.custom_title = Some(title.into());
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.is_favorite = favorite;
        self
    }

    pub fn with_last_updated(mut self, at: Timestamp) -> Self {
        self.last_updated = Some(at);
        self
    }

    /// Sets a reminder for this link.
    pub fn with_reminder(mut self, context: impl Into<String>, at: Timestamp) -> Self {
        self.has_reminder = true;
        self.reminder_context = Some(context.into());
        self.reminder_scheduled_for = Some(at);
        self
    }

    /// Timestamp used by the "recently modified" ordering.
    pub fn modified_at(&self) -> Timestamp {
        self.last_updated.unwrap_or(self.created_at)
    }
}

const PLATFORMS: &[(&[&str], &str)] = &[
    (&["youtube.com", "youtu.be"], "YouTube"),
    (&["instagram.com"], "Instagram"),
    (&["tiktok.com"], "TikTok"),
    (&["twitter.com", "x.com"], "Twitter"),
    (&["facebook.com", "fb.watch"], "Facebook"),
    (&["linkedin.com"], "LinkedIn"),
    (&["reddit.com", "redd.it"], "Reddit"),
    (&["pinterest.com", "pin.it"], "Pinterest"),
    (&["spotify.com"], "Spotify"),
    (&["github.com"], "GitHub"),
];

/// Derives the platform tag shown next to a link from its host.
pub fn detect_platform(url: &str) -> &'static str {
    let Ok(parsed) = ::url::Url::parse(url) else {
        return "Web";
    };
    let Some(host) = parsed.host_str() else {
        return "Web";
    };
    let host = host.to_ascii_lowercase();

    PLATFORMS
        .iter()
        .find(|(domains, _)| {
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
        .map(|(_, name)| *name)
        .unwrap_or("Web")
}
