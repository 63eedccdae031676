//! Detail session for one note: both tabs, their counts, and the active tab.

use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{MasteryGroup, NewSentence, RecordId, Sentence, SentencePatch};
use crate::pagination::{LoadOutcome, TabPager, TabState};
use crate::store::SentenceStore;
use crate::util::{normalize_text_option, require_text};
use crate::Result;

/// Sentence totals per tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteCounts {
    pub learning: usize,
    pub mastered: usize,
}

impl NoteCounts {
    #[must_use]
    pub const fn get(self, group: MasteryGroup) -> usize {
        match group {
            MasteryGroup::Learning => self.learning,
            MasteryGroup::Mastered => self.mastered,
        }
    }

    #[must_use]
    pub const fn total(self) -> usize {
        self.learning + self.mastered
    }
}

pub struct NoteView {
    store: Arc<dyn SentenceStore>,
    note_id: RecordId,
    learning: Arc<TabPager>,
    mastered: Arc<TabPager>,
    active: Mutex<MasteryGroup>,
    counts: Mutex<NoteCounts>,
}

impl NoteView {
    /// Open a view on `note_id`. Nothing is loaded until [`Self::load_initial`].
    pub fn open(store: Arc<dyn SentenceStore>, note_id: RecordId) -> Self {
        let learning = Arc::new(TabPager::new(
            store.clone(),
            note_id.clone(),
            MasteryGroup::Learning,
        ));
        let mastered = Arc::new(TabPager::new(
            store.clone(),
            note_id.clone(),
            MasteryGroup::Mastered,
        ));
        Self {
            store,
            note_id,
            learning,
            mastered,
            active: Mutex::new(MasteryGroup::Learning),
            counts: Mutex::new(NoteCounts::default()),
        }
    }

    #[must_use]
    pub const fn note_id(&self) -> &RecordId {
        &self.note_id
    }

    #[must_use]
    pub fn pager(&self, group: MasteryGroup) -> &Arc<TabPager> {
        match group {
            MasteryGroup::Learning => &self.learning,
            MasteryGroup::Mastered => &self.mastered,
        }
    }

    #[must_use]
    pub fn active(&self) -> MasteryGroup {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn switch_tab(&self, group: MasteryGroup) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = group;
    }

    /// State of the active tab.
    #[must_use]
    pub fn active_state(&self) -> TabState {
        self.pager(self.active()).snapshot()
    }

    #[must_use]
    pub fn counts(&self) -> NoteCounts {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether infinite scroll should be armed for the active tab: not while
    /// a page is loading, not after the last page, and not when the first
    /// page was empty.
    #[must_use]
    pub fn scroll_enabled(&self) -> bool {
        let state = self.active_state();
        !state.loading && state.has_more && !state.is_empty_first_page()
    }

    /// Reset both tabs, load their first pages side by side, then the counts.
    pub async fn load_initial(&self) {
        self.learning.reset();
        self.mastered.reset();
        tokio::join!(
            self.learning.load_page(0, false),
            self.mastered.load_page(0, false)
        );
        self.refresh_counts().await;
    }

    /// Reload after a mutation.
    pub async fn reload(&self) {
        self.load_initial().await;
    }

    /// Next page of the active tab.
    pub async fn load_more(&self) -> LoadOutcome {
        self.pager(self.active()).load_more().await
    }

    /// Fetch both counts; on failure the previous counts stay.
    pub async fn refresh_counts(&self) {
        let (learning, mastered) = tokio::join!(
            self.store.count(&self.note_id, MasteryGroup::Learning),
            self.store.count(&self.note_id, MasteryGroup::Mastered)
        );
        match (learning, mastered) {
            (Ok(learning), Ok(mastered)) => {
                *self.counts.lock().unwrap_or_else(PoisonError::into_inner) =
                    NoteCounts { learning, mastered };
            }
            (Err(error), _) | (_, Err(error)) => {
                tracing::warn!("Failed to count sentences for note {}: {}", self.note_id, error);
            }
        }
    }

    pub async fn add_sentence(&self, title: &str, description: Option<String>) -> Result<Sentence> {
        let title = require_text(title, "Sentence title")?;
        let input = NewSentence::fresh(
            self.note_id.clone(),
            title,
            normalize_text_option(description),
        );
        let sentence = self.store.add_sentence(input).await?;
        self.reload().await;
        Ok(sentence)
    }

    pub async fn edit_sentence(
        &self,
        id: &RecordId,
        title: &str,
        description: Option<String>,
    ) -> Result<Sentence> {
        let title = require_text(title, "Sentence title")?;
        let patch = SentencePatch::text(title, normalize_text_option(description));
        let sentence = self.store.update_sentence(id, &patch).await?;
        self.reload().await;
        Ok(sentence)
    }

    pub async fn level_up(&self, id: &RecordId) -> Result<Sentence> {
        let sentence = self.store.level_up(id).await?;
        self.reload().await;
        Ok(sentence)
    }

    pub async fn reset_level(&self, id: &RecordId) -> Result<Sentence> {
        let sentence = self.store.reset_level(id).await?;
        self.reload().await;
        Ok(sentence)
    }

    pub async fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        self.store.delete_sentence(id).await?;
        self.reload().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalRecordStore;
    use crate::models::MasteryLevel;
    use crate::remote::{MemoryBackend, Operation, RemoteRecordGateway, Table};
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn guest_view(sentences: usize) -> (LocalRecordStore, NoteView) {
        let local = LocalRecordStore::in_memory();
        let note = local.create_note("Proverbs").unwrap();
        for i in 0..sentences {
            local
                .add_sentence(NewSentence::fresh(note.id.clone(), format!("p{i}"), None))
                .unwrap();
        }
        let view = NoteView::open(Arc::new(local.clone()), note.id);
        (local, view)
    }

    #[tokio::test]
    async fn initial_load_fills_both_tabs_and_counts() {
        let (_, view) = guest_view(25);
        view.load_initial().await;

        assert_eq!(view.pager(MasteryGroup::Learning).snapshot().sentences.len(), 20);
        assert!(view.pager(MasteryGroup::Mastered).snapshot().sentences.is_empty());
        assert_eq!(
            view.counts(),
            NoteCounts {
                learning: 25,
                mastered: 0
            }
        );
        assert!(view.scroll_enabled());

        view.switch_tab(MasteryGroup::Mastered);
        assert!(!view.scroll_enabled());
    }

    #[tokio::test]
    async fn scroll_disabled_after_last_page() {
        let (_, view) = guest_view(25);
        view.load_initial().await;
        assert_eq!(view.load_more().await, LoadOutcome::Loaded { added: 5 });
        assert!(!view.scroll_enabled());
    }

    #[tokio::test]
    async fn level_up_moves_sentence_between_tabs() {
        let (_, view) = guest_view(1);
        view.load_initial().await;
        let id = view.active_state().sentences[0].id.clone();

        view.level_up(&id).await.unwrap();
        let sentence = view.level_up(&id).await.unwrap();
        assert_eq!(sentence.mastery_level, MasteryLevel::Mastered);

        assert_eq!(view.counts().learning, 0);
        assert_eq!(view.counts().mastered, 1);
        assert_eq!(view.pager(MasteryGroup::Mastered).snapshot().sentences[0].id, id);

        view.reset_level(&id).await.unwrap();
        assert_eq!(view.counts().learning, 1);
    }

    #[tokio::test]
    async fn blank_sentence_title_is_rejected_before_io() {
        let (local, view) = guest_view(0);
        let error = view.add_sentence("   ", None).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(local.list_sentences(None).is_empty());
    }

    #[tokio::test]
    async fn count_failure_keeps_previous_counts() {
        let backend = Arc::new(MemoryBackend::signed_in("alice"));
        let remote = RemoteRecordGateway::new(backend.clone());
        let note = remote.create_note("Note", false).await.unwrap();
        remote
            .add_sentence(NewSentence::fresh(note.id.clone(), "s", None))
            .await
            .unwrap();

        let view = NoteView::open(Arc::new(remote), note.id);
        view.load_initial().await;
        assert_eq!(view.counts().learning, 1);

        // Both page loads succeed, then the first count fails.
        backend.fail_on(Operation::Select, Table::Sentences, 3, "count failed");
        view.reload().await;
        assert_eq!(view.counts().learning, 1);
    }
}
