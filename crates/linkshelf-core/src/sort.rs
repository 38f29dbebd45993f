use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::str::FromStr;

/// Sort key offered to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    DateAdded,
    Favorites,
    Alphabetical,
    Platform,
    RecentlyModified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::DateAdded => "dateAdded",
            SortBy::Favorites => "favorites",
            SortBy::Alphabetical => "alphabetical",
            SortBy::Platform => "platform",
            SortBy::RecentlyModified => "recentlyModified",
        }
    }
}

impl Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dateAdded" => Ok(SortBy::DateAdded),
            "favorites" => Ok(SortBy::Favorites),
            "alphabetical" => Ok(SortBy::Alphabetical),
            "platform" => Ok(SortBy::Platform),
            "recentlyModified" => Ok(SortBy::RecentlyModified),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// A user's chosen sort criteria, persisted per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortPreference {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub timestamp: Timestamp,
}

impl SortPreference {
    pub fn new(sort_by: SortBy, sort_order: SortOrder) -> Self {
        Self {
            sort_by,
            sort_order,
            timestamp: Timestamp::now(),
        }
    }
}

/// A memoized ordering of a collection.
///
/// Valid only while the collection's id-set fingerprint and the requested
/// sort criteria all match the ones recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortCacheEntry {
    #[serde(rename = "ids")]
    pub id_set_fingerprint: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    #[serde(rename = "sortedOrder")]
    pub ordered_ids: Vec<String>,
    pub timestamp: Timestamp,
}

impl SortCacheEntry {
    pub fn matches(&self, fingerprint: &str, sort_by: SortBy, sort_order: SortOrder) -> bool {
        self.id_set_fingerprint == fingerprint
            && self.sort_by == sort_by
            && self.sort_order == sort_order
    }
}

/// Stable hash over the *set* of ids: input order and duplicates do not matter.
pub fn fingerprint<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
