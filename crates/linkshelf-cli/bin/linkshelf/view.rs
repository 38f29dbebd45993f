use crate::cli::ViewArgs;
use anyhow::Context;
use linkshelf_cache::{FileKeyValueStore, LocalPreviewCache};
use linkshelf_core::{LinkRecord, PreviewTitles, SortPreference};
use linkshelf_view::{SortCacheStore, SortPreferenceStore, SortedViewCache};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Prints the collection in display order and persists the resulting sort
/// cache and preference.
pub async fn run(store: FileKeyValueStore, user: &str, args: ViewArgs) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&args.collection)
        .await
        .with_context(|| format!("failed to read {}", args.collection.display()))?;
    let links: Vec<LinkRecord> =
        serde_json::from_str(&raw).context("collection is not a JSON array of link records")?;

    let preferences = SortPreferenceStore::new(store.clone());
    let stored = preferences.load(user).await.unwrap_or_else(|e| {
        warn!(user, error = %e, "failed to load sort preference");
        None
    });
    let sort_by = args
        .sort_by
        .or(stored.as_ref().map(|p| p.sort_by))
        .unwrap_or_default();
    let sort_order = args
        .order
        .or(stored.as_ref().map(|p| p.sort_order))
        .unwrap_or_default();

    let sort_cache = SortCacheStore::new(store.clone());
    let cache = match sort_cache.load(user).await {
        Ok(Some(entry)) => SortedViewCache::with_entry(entry),
        Ok(None) => SortedViewCache::new(),
        Err(e) => {
            warn!(user, error = %e, "failed to load sort cache");
            SortedViewCache::new()
        }
    };

    let titles = LocalPreviewCache::new(store).snapshot().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to read local previews, ordering without them");
        HashMap::new()
    });

    let view = cache.view(&links, sort_by, sort_order, &args.query, &titles);
    for link in &view {
        println!("{}", format_row(link, &titles));
    }

    let stats = cache.stats();
    debug!(hits = stats.hits, misses = stats.misses, comparisons = stats.comparisons, "view computed");
    info!(shown = view.len(), total = links.len(), %sort_by, %sort_order, "printed collection");

    if let Some(entry) = cache.take_dirty() {
        if let Err(e) = sort_cache.save(user, &entry).await {
            warn!(user, error = %e, "failed to persist sort cache");
        }
    }

    let changed = stored
        .as_ref()
        .map(|p| p.sort_by != sort_by || p.sort_order != sort_order)
        .unwrap_or(true);
    if changed {
        if let Err(e) = preferences
            .save(user, &SortPreference::new(sort_by, sort_order))
            .await
        {
            warn!(user, error = %e, "failed to persist sort preference");
        }
    }

    Ok(())
}

/// The title shown for a link: custom title, preview title, saved title or URL.
fn display_title<T: PreviewTitles + ?Sized>(link: &LinkRecord, titles: &T) -> String {
    link.custom_title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| titles.preview_title(&link.url))
        .or_else(|| link.title.clone().filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| link.url.clone())
}

fn format_row<T: PreviewTitles + ?Sized>(link: &LinkRecord, titles: &T) -> String {
    let favorite = if link.is_favorite { "*" } else { " " };
    format!(
        "{favorite} {}\t{}\t{}\t{}",
        link.id,
        link.platform,
        display_title(link, titles),
        link.url
    )
}
