use linkshelf_core::{LinkRecord, PreviewTitles};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds text for matching: compatibility-decomposes it, drops diacritics,
/// lowercases and collapses runs of whitespace into single spaces.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A parsed search query.
///
/// A link matches when every token occurs, as an independent substring, in at
/// least one of its searchable fields. Tokens do not have to be adjacent or
/// appear in the same field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    tokens: Vec<String>,
}

impl SearchQuery {
    /// Returns `None` for a blank query, which filters nothing.
    pub fn parse(query: &str) -> Option<Self> {
        let tokens: Vec<String> = normalize(query)
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn matches<T: PreviewTitles + ?Sized>(&self, link: &LinkRecord, titles: &T) -> bool {
        let fields: Vec<String> = [
            link.custom_title.clone(),
            titles.preview_title(&link.url),
            link.title.clone(),
            Some(link.platform.clone()),
        ]
        .into_iter()
        .flatten()
        .map(|field| normalize(&field))
        .filter(|field| !field.is_empty())
        .collect();

        self.tokens
            .iter()
            .all(|token| fields.iter().any(|field| field.contains(token.as_str())))
    }
}

/// Keeps the links matching `query`, preserving their order.
pub fn filter_links<'a, T: PreviewTitles + ?Sized>(
    links: Vec<&'a LinkRecord>,
    query: &str,
    titles: &T,
) -> Vec<&'a LinkRecord> {
    match SearchQuery::parse(query) {
        Some(query) => links
            .into_iter()
            .filter(|link| query.matches(link, titles))
            .collect(),
        None => links,
    }
}
