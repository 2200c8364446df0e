use crate::model::Article;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct DedupState {
    seen: HashSet<String>,
    articles: Vec<Article>,
}

/// Batch-scoped canonical-URL deduplication shared by concurrent source tasks
///
/// The first article offered for a URL wins; later ones are dropped. Because
/// tasks offer their articles as they complete, "first" is completion order.
#[derive(Default)]
pub struct BatchDeduplicator {
    state: Mutex<DedupState>,
}

impl BatchDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the articles whose URL has not been seen in this batch
    ///
    /// Returns how many were accepted.
    pub fn offer(&self, articles: Vec<Article>) -> usize {
        let mut state = self.lock();
        let mut accepted = 0;
        for article in articles {
            if state.seen.insert(article.url.clone()) {
                state.articles.push(article);
                accepted += 1;
            }
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.lock().articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the accepted articles out, leaving the seen set in place
    pub fn take_articles(&self) -> Vec<Article> {
        std::mem::take(&mut self.lock().articles)
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
