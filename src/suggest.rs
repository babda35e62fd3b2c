//! Search-as-you-type suggestions over category names.

use crate::config;
use crate::models::Category;

/// Case-insensitive substring matcher over a fixed set of categories.
///
/// Results come back in the index's natural order: insertion order for
/// [`SuggestionIndex::new`], name order for [`SuggestionIndex::alphabetical`].
#[derive(Debug, Clone, Default)]
pub struct SuggestionIndex {
    categories: Vec<Category>,
    folded: Vec<String>,
}

impl SuggestionIndex {
    pub fn new(categories: Vec<Category>) -> Self {
        let folded = categories.iter().map(|c| c.name.to_lowercase()).collect();
        Self { categories, folded }
    }

    pub fn alphabetical(mut categories: Vec<Category>) -> Self {
        categories.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Self::new(categories)
    }

    /// Categories whose name contains `text`, ignoring case.
    ///
    /// Input is trimmed first; anything shorter than
    /// [`MIN_SUGGESTION_QUERY_LEN`](config::MIN_SUGGESTION_QUERY_LEN)
    /// characters yields no suggestions. The returned iterator is finite and
    /// can be cloned to restart it.
    pub fn query(&self, text: &str, limit: usize) -> Suggestions<'_> {
        let needle = text.trim().to_lowercase();
        let limit = if needle.chars().count() < config::MIN_SUGGESTION_QUERY_LEN {
            0
        } else {
            limit
        };
        Suggestions {
            index: self,
            needle,
            pos: 0,
            remaining: limit,
        }
    }

    /// Exact (case-insensitive) name lookup, used when a suggestion is picked.
    pub fn by_name(&self, name: &str) -> Option<&Category> {
        let name = name.trim().to_lowercase();
        self.folded
            .iter()
            .position(|n| *n == name)
            .map(|i| &self.categories[i])
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Iterator returned by [`SuggestionIndex::query`].
#[derive(Debug, Clone)]
pub struct Suggestions<'a> {
    index: &'a SuggestionIndex,
    needle: String,
    pos: usize,
    remaining: usize,
}

impl<'a> Iterator for Suggestions<'a> {
    type Item = &'a Category;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while self.pos < self.index.categories.len() {
            let i = self.pos;
            self.pos += 1;
            if self.index.folded[i].contains(&self.needle) {
                self.remaining -= 1;
                return Some(&self.index.categories[i]);
            }
        }
        self.remaining = 0;
        None
    }
}

impl std::iter::FusedIterator for Suggestions<'_> {}
