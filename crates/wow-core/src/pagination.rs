//! Incremental loading of one note tab (one mastery group).
//!
//! A [`TabPager`] keeps the sentences loaded so far plus the bookkeeping for
//! the next page. At most one page request is in flight per pager:
//! [`TabPager::load_more`] checks and sets `loading` under one lock, so calls
//! made while a page is loading are dropped rather than queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::SENTENCES_PER_PAGE;
use crate::models::{MasteryGroup, RecordId, Sentence};
use crate::store::SentenceStore;

/// A slice of a group's sentences and the group's total size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentencePage {
    pub items: Vec<Sentence>,
    pub total: usize,
}

/// What a tab has loaded so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabState {
    /// Most recently updated first
    pub sentences: Vec<Sentence>,
    /// Zero-based index of the last page loaded
    pub page: usize,
    pub has_more: bool,
    pub loading: bool,
}

impl Default for TabState {
    fn default() -> Self {
        Self {
            sentences: Vec::new(),
            page: 0,
            has_more: true,
            loading: false,
        }
    }
}

impl TabState {
    /// The first page came back with nothing in it.
    #[must_use]
    pub fn is_empty_first_page(&self) -> bool {
        self.page == 0 && self.sentences.is_empty() && !self.loading
    }
}

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page arrived; `added` sentences were loaded
    Loaded { added: usize },
    /// Nothing to do: already loading or no more pages
    Skipped,
    /// The store failed; the error was logged and `has_more` cleared
    Failed,
}

struct Inner {
    state: TabState,
    /// Bumped by `reset` so replies to earlier requests are ignored
    generation: u64,
}

/// Pager for one (note, mastery group) pair.
pub struct TabPager {
    store: Arc<dyn SentenceStore>,
    note_id: RecordId,
    group: MasteryGroup,
    page_size: usize,
    inner: Mutex<Inner>,
}

impl TabPager {
    pub fn new(store: Arc<dyn SentenceStore>, note_id: RecordId, group: MasteryGroup) -> Self {
        Self::with_page_size(store, note_id, group, SENTENCES_PER_PAGE)
    }

    pub fn with_page_size(
        store: Arc<dyn SentenceStore>,
        note_id: RecordId,
        group: MasteryGroup,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            note_id,
            group,
            page_size: page_size.max(1),
            inner: Mutex::new(Inner {
                state: TabState::default(),
                generation: 0,
            }),
        }
    }

    #[must_use]
    pub const fn group(&self) -> MasteryGroup {
        self.group
    }

    #[must_use]
    pub const fn note_id(&self) -> &RecordId {
        &self.note_id
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> TabState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.lock().state.has_more
    }

    /// Back to the initial state: empty, page 0, more to load, idle.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = TabState::default();
        inner.generation += 1;
    }

    /// Fetch page `page` and replace (or, with `append`, extend) the loaded
    /// sentences.
    ///
    /// Always leaves `loading` cleared. On failure the error is logged,
    /// `has_more` is cleared, and the loaded sentences and page index stay
    /// as they were.
    pub async fn load_page(&self, page: usize, append: bool) -> LoadOutcome {
        let generation = {
            let mut inner = self.lock();
            inner.state.loading = true;
            inner.generation
        };
        self.fetch_into(page, append, generation).await
    }

    /// Load the page after the last one loaded, unless a load is already
    /// running or there is nothing left.
    pub async fn load_more(&self) -> LoadOutcome {
        let (page, generation) = {
            let mut inner = self.lock();
            if !inner.state.has_more || inner.state.loading {
                return LoadOutcome::Skipped;
            }
            inner.state.loading = true;
            (inner.state.page + 1, inner.generation)
        };
        self.fetch_into(page, true, generation).await
    }

    async fn fetch_into(&self, page: usize, append: bool, generation: u64) -> LoadOutcome {
        let result = self
            .store
            .fetch_page(&self.note_id, self.group, page, self.page_size)
            .await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(
                "Discarding stale {} page {} for note {}",
                self.group,
                page,
                self.note_id
            );
            return LoadOutcome::Skipped;
        }

        let state = &mut inner.state;
        state.loading = false;
        match result {
            Ok(fetched) => {
                let added = fetched.items.len();
                if append {
                    state.sentences.extend(fetched.items);
                } else {
                    state.sentences = fetched.items;
                }
                state.page = page;
                state.has_more = page * self.page_size + added < fetched.total;
                LoadOutcome::Loaded { added }
            }
            Err(error) => {
                tracing::error!(
                    "Failed to load {} sentences (page {}) for note {}: {}",
                    self.group,
                    page,
                    self.note_id,
                    error
                );
                state.has_more = false;
                LoadOutcome::Failed
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
