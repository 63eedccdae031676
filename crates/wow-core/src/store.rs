//! One sentence-store capability over both record stores.
//!
//! Pagination, the note view and the notebook service only talk to
//! [`SentenceStore`]; which implementation they get is decided by the note's
//! id namespace.

use std::sync::Arc;

use async_trait::async_trait;

use crate::local::LocalRecordStore;
use crate::models::{
    MasteryGroup, MasteryLevel, NewSentence, RecordId, Sentence, SentencePatch,
};
use crate::pagination::SentencePage;
use crate::remote::RemoteRecordGateway;
use crate::{Error, Result};

#[async_trait]
pub trait SentenceStore: Send + Sync {
    /// Page `page` (zero-based) of a note's sentences in `group`, most
    /// recently updated first, with the group's total.
    async fn fetch_page(
        &self,
        note_id: &RecordId,
        group: MasteryGroup,
        page: usize,
        page_size: usize,
    ) -> Result<SentencePage>;

    async fn count(&self, note_id: &RecordId, group: MasteryGroup) -> Result<usize>;

    async fn get_sentence(&self, id: &RecordId) -> Result<Option<Sentence>>;

    async fn add_sentence(&self, input: NewSentence) -> Result<Sentence>;

    async fn update_sentence(&self, id: &RecordId, patch: &SentencePatch) -> Result<Sentence>;

    async fn delete_sentence(&self, id: &RecordId) -> Result<()>;

    /// Raise the level by one, staying at mastered.
    async fn level_up(&self, id: &RecordId) -> Result<Sentence> {
        let sentence = self
            .get_sentence(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sentence {id}")))?;
        let patch = SentencePatch::level(sentence.mastery_level.level_up());
        self.update_sentence(id, &patch).await
    }

    /// Send the sentence back to the first level.
    async fn reset_level(&self, id: &RecordId) -> Result<Sentence> {
        self.update_sentence(id, &SentencePatch::level(MasteryLevel::Fresh))
            .await
    }
}

#[async_trait]
impl SentenceStore for LocalRecordStore {
    async fn fetch_page(
        &self,
        note_id: &RecordId,
        group: MasteryGroup,
        page: usize,
        page_size: usize,
    ) -> Result<SentencePage> {
        Ok(self.sentence_page(note_id, group, page, page_size))
    }

    async fn count(&self, note_id: &RecordId, group: MasteryGroup) -> Result<usize> {
        Ok(self.count_sentences(note_id, group))
    }

    async fn get_sentence(&self, id: &RecordId) -> Result<Option<Sentence>> {
        Ok(Self::get_sentence(self, id))
    }

    async fn add_sentence(&self, input: NewSentence) -> Result<Sentence> {
        Self::add_sentence(self, input)
    }

    async fn update_sentence(&self, id: &RecordId, patch: &SentencePatch) -> Result<Sentence> {
        Self::update_sentence(self, id, patch)?
            .ok_or_else(|| Error::NotFound(format!("sentence {id}")))
    }

    async fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        Self::delete_sentence(self, id)
    }
}

#[async_trait]
impl SentenceStore for RemoteRecordGateway {
    async fn fetch_page(
        &self,
        note_id: &RecordId,
        group: MasteryGroup,
        page: usize,
        page_size: usize,
    ) -> Result<SentencePage> {
        self.fetch_sentence_page(note_id, group, page, page_size)
            .await
    }

    async fn count(&self, note_id: &RecordId, group: MasteryGroup) -> Result<usize> {
        self.count_sentences(note_id, Some(group)).await
    }

    async fn get_sentence(&self, id: &RecordId) -> Result<Option<Sentence>> {
        Self::get_sentence(self, id).await
    }

    async fn add_sentence(&self, input: NewSentence) -> Result<Sentence> {
        Self::add_sentence(self, input).await
    }

    async fn update_sentence(&self, id: &RecordId, patch: &SentencePatch) -> Result<Sentence> {
        Self::update_sentence(self, id, patch).await
    }

    async fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        Self::delete_sentence(self, id).await
    }
}

/// Pick the store that owns `id`: guest storage for `guest-` ids, the remote
/// gateway otherwise.
pub fn store_for(
    id: &RecordId,
    local: &LocalRecordStore,
    remote: Option<&RemoteRecordGateway>,
) -> Result<Arc<dyn SentenceStore>> {
    if id.is_local() {
        return Ok(Arc::new(local.clone()));
    }
    match remote {
        Some(remote) => Ok(Arc::new(remote.clone())),
        None => Err(Error::NotAuthenticated(format!(
            "{id} is stored online; configure the backend and sign in"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;

    #[tokio::test]
    async fn level_up_saturates_through_the_trait() {
        let local = LocalRecordStore::in_memory();
        let note = local.create_note("Note").unwrap();
        let store: Arc<dyn SentenceStore> = Arc::new(local.clone());
        let sentence = store
            .add_sentence(NewSentence::fresh(note.id.clone(), "Festina lente", None))
            .await
            .unwrap();

        let mut levels = Vec::new();
        for _ in 0..3 {
            levels.push(store.level_up(&sentence.id).await.unwrap().mastery_level);
        }
        assert_eq!(
            levels,
            vec![
                MasteryLevel::Growing,
                MasteryLevel::Mastered,
                MasteryLevel::Mastered
            ]
        );
        let reset = store.reset_level(&sentence.id).await.unwrap();
        assert_eq!(reset.mastery_level, MasteryLevel::Fresh);
    }

    #[tokio::test]
    async fn missing_local_sentence_is_not_found() {
        let store: Arc<dyn SentenceStore> = Arc::new(LocalRecordStore::in_memory());
        let error = store.level_up(&RecordId::new_local()).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn dispatch_follows_id_namespace() {
        let local = LocalRecordStore::in_memory();
        assert!(store_for(&RecordId::new_local(), &local, None).is_ok());
        assert!(matches!(
            store_for(&RecordId::remote("n1"), &local, None),
            Err(Error::NotAuthenticated(_))
        ));
        let remote = RemoteRecordGateway::new(Arc::new(MemoryBackend::new()));
        assert!(store_for(&RecordId::remote("n1"), &local, Some(&remote)).is_ok());
    }
}
