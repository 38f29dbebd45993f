use jiff::Timestamp;
use linkshelf_core::{LinkRecord, PreviewTitles, SortBy, SortOrder};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static LEADING_ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:the|a|an)\s+").expect("article pattern is valid"));

/// The text a link is ordered by alphabetically: the custom title, else the
/// resolved preview title, else the saved title, else the URL. Lowercased,
/// with a leading English article removed.
pub fn alphabetical_key<T: PreviewTitles + ?Sized>(link: &LinkRecord, titles: &T) -> String {
    let text = non_blank(link.custom_title.clone())
        .or_else(|| non_blank(titles.preview_title(&link.url)))
        .or_else(|| non_blank(link.title.clone()))
        .unwrap_or_else(|| link.url.clone());

    let folded = text.trim().to_lowercase();
    LEADING_ARTICLE.replace(&folded, "").into_owned()
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Precomputed per-record sort key.
#[derive(Debug)]
enum Key {
    Time(Timestamp),
    Favorite(bool, Timestamp),
    Text(String),
    Platform(String, Timestamp),
}

fn key_for<T: PreviewTitles + ?Sized>(link: &LinkRecord, sort_by: SortBy, titles: &T) -> Key {
    match sort_by {
        SortBy::DateAdded => Key::Time(link.created_at),
        SortBy::RecentlyModified => Key::Time(link.modified_at()),
        SortBy::Favorites => Key::Favorite(link.is_favorite, link.created_at),
        SortBy::Alphabetical => Key::Text(alphabetical_key(link, titles)),
        SortBy::Platform => Key::Platform(link.platform.clone(), link.created_at),
    }
}

fn directed(ordering: Ordering, sort_order: SortOrder) -> Ordering {
    match sort_order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare_keys(a: &Key, b: &Key, sort_order: SortOrder) -> Ordering {
    match (a, b) {
        (Key::Time(a), Key::Time(b)) => directed(a.cmp(b), sort_order),
        (Key::Text(a), Key::Text(b)) => directed(a.cmp(b), sort_order),
        // Descending puts favorites first. Within each group the newest come
        // first whatever the direction.
        (Key::Favorite(fa, ca), Key::Favorite(fb, cb)) => {
            directed(fa.cmp(fb), sort_order).then_with(|| cb.cmp(ca))
        }
        (Key::Platform(pa, ca), Key::Platform(pb, cb)) => {
            directed(pa.cmp(pb), sort_order).then_with(|| cb.cmp(ca))
        }
        _ => Ordering::Equal,
    }
}

/// Orders links by the given criteria and returns how many comparisons the
/// sort performed.
///
/// Ties are broken by id, so the result is a total order: equal inputs always
/// produce the same output, and sorting an already sorted slice changes
/// nothing.
pub fn sort_links<T: PreviewTitles + ?Sized>(
    links: &mut Vec<&LinkRecord>,
    sort_by: SortBy,
    sort_order: SortOrder,
    titles: &T,
) -> u64 {
    let mut keyed: Vec<(Key, &LinkRecord)> = links
        .iter()
        .map(|link| (key_for(link, sort_by, titles), *link))
        .collect();

    let mut comparisons = 0u64;
    keyed.sort_by(|(ka, a), (kb, b)| {
        comparisons += 1;
        compare_keys(ka, kb, sort_order).then_with(|| a.id.cmp(&b.id))
    });

    links.clear();
    links.extend(keyed.into_iter().map(|(_, link)| link));
    comparisons
}
