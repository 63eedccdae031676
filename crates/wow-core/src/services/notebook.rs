//! Notebook service used by every front end.
//!
//! Routes each note and sentence operation to guest storage or the remote
//! gateway by id namespace, and validates input before touching either.

use std::sync::Arc;

use chrono::Utc;

use crate::local::LocalRecordStore;
use crate::migration::{migrate_guest_data, MigrationReport};
use crate::models::{NewSentence, Note, NotePatch, NoteSummary, RecordId, Sentence, SentencePatch};
use crate::remote::{Principal, RemoteRecordGateway};
use crate::store::{store_for, SentenceStore};
use crate::transfer::{export_document, import_json, ImportSummary, SentenceDocument};
use crate::util::{normalize_text_option, require_text};
use crate::view::NoteView;
use crate::{Error, Result};

/// Notes shown on the listing screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListing {
    pub guest: Vec<NoteSummary>,
    pub remote: Vec<NoteSummary>,
    /// Remote notes visible across all pages
    pub remote_total: usize,
    pub page: usize,
}

impl NoteListing {
    pub fn iter(&self) -> impl Iterator<Item = &NoteSummary> {
        self.guest.iter().chain(self.remote.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guest.is_empty() && self.remote.is_empty()
    }
}

#[derive(Clone)]
pub struct NotebookService {
    local: LocalRecordStore,
    remote: Option<RemoteRecordGateway>,
}

impl NotebookService {
    pub fn new(local: LocalRecordStore, remote: Option<RemoteRecordGateway>) -> Self {
        Self { local, remote }
    }

    /// A service with no backend configured.
    pub fn guest_only(local: LocalRecordStore) -> Self {
        Self::new(local, None)
    }

    #[must_use]
    pub const fn local(&self) -> &LocalRecordStore {
        &self.local
    }

    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteRecordGateway> {
        self.remote.as_ref()
    }

    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.remote.as_ref().and_then(RemoteRecordGateway::principal)
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.principal().is_some()
    }

    fn require_remote(&self) -> Result<&RemoteRecordGateway> {
        self.remote.as_ref().ok_or_else(|| {
            Error::NotAuthenticated("no backend configured for online notes".to_string())
        })
    }

    /// Guest notes first, then page `page` of the remote listing.
    pub async fn list_notes(&self, page: usize) -> Result<NoteListing> {
        let guest_sentences = self.local.list_sentences(None);
        let guest = self
            .local
            .list_notes()
            .into_iter()
            .map(|note| {
                let sentence_count = guest_sentences
                    .iter()
                    .filter(|sentence| sentence.note_id == note.id)
                    .count();
                NoteSummary {
                    note,
                    sentence_count,
                }
            })
            .collect();

        let mut listing = NoteListing {
            guest,
            page,
            ..NoteListing::default()
        };
        if let Some(remote) = &self.remote {
            let fetched = remote.list_notes(page).await?;
            listing.remote_total = fetched.total;
            listing.remote = fetched.notes;
        }
        Ok(listing)
    }

    pub async fn get_note(&self, id: &RecordId) -> Result<Note> {
        let note = if id.is_local() {
            self.local.get_note(id)
        } else {
            self.require_remote()?.get_note(id).await?
        };
        note.ok_or_else(|| Error::NotFound(format!("note {id}")))
    }

    /// Create an online note when signed in, a guest note otherwise.
    pub async fn create_note(&self, title: &str, is_public: bool) -> Result<Note> {
        let title = require_text(title, "Note title")?;
        match &self.remote {
            Some(remote) if remote.principal().is_some() => {
                remote.create_note(&title, is_public).await
            }
            _ => {
                if is_public {
                    tracing::debug!("Guest notes are private; ignoring visibility");
                }
                self.local.create_note(&title)
            }
        }
    }

    pub async fn rename_note(&self, id: &RecordId, title: &str) -> Result<Note> {
        let title = require_text(title, "Note title")?;
        let patch = NotePatch::title(title);
        if id.is_local() {
            return self
                .local
                .update_note(id, &patch)?
                .ok_or_else(|| Error::NotFound(format!("note {id}")));
        }
        let remote = self.require_owned_remote(id).await?;
        remote.update_note(id, &patch).await
    }

    /// Change an online note's visibility. Guest notes stay private and are
    /// returned unchanged.
    pub async fn set_visibility(&self, id: &RecordId, is_public: bool) -> Result<Note> {
        if id.is_local() {
            tracing::debug!("Ignoring visibility change for guest note {}", id);
            return self
                .local
                .get_note(id)
                .ok_or_else(|| Error::NotFound(format!("note {id}")));
        }
        let remote = self.require_owned_remote(id).await?;
        remote.update_note(id, &NotePatch::visibility(is_public)).await
    }

    /// Delete a note and its sentences.
    pub async fn delete_note(&self, id: &RecordId) -> Result<()> {
        if id.is_local() {
            if self.local.get_note(id).is_none() {
                return Err(Error::NotFound(format!("note {id}")));
            }
            return self.local.delete_note(id);
        }
        let remote = self.require_owned_remote(id).await?;
        remote.delete_note(id).await
    }

    /// Gateway for editing `id`, after checking the principal owns it when
    /// the owner is known.
    async fn require_owned_remote(&self, id: &RecordId) -> Result<&RemoteRecordGateway> {
        let remote = self.require_remote()?;
        let principal = remote
            .principal()
            .ok_or_else(|| Error::NotAuthenticated("sign in to edit online notes".to_string()))?;
        if let Some(note) = remote.get_note(id).await? {
            if note.created_by.is_some() && !note.is_editable_by(Some(&principal.id)) {
                return Err(Error::PermissionDenied(format!(
                    "note {id} belongs to another user"
                )));
            }
        }
        Ok(remote)
    }

    pub fn store_for(&self, id: &RecordId) -> Result<Arc<dyn SentenceStore>> {
        store_for(id, &self.local, self.remote.as_ref())
    }

    /// Detail view on a note's sentences. Nothing is loaded yet.
    pub fn open_view(&self, note_id: &RecordId) -> Result<NoteView> {
        Ok(NoteView::open(self.store_for(note_id)?, note_id.clone()))
    }

    pub async fn add_sentence(
        &self,
        note_id: &RecordId,
        title: &str,
        description: Option<String>,
    ) -> Result<Sentence> {
        let title = require_text(title, "Sentence title")?;
        let input = NewSentence::fresh(note_id.clone(), title, normalize_text_option(description));
        self.store_for(note_id)?.add_sentence(input).await
    }

    pub async fn edit_sentence(
        &self,
        id: &RecordId,
        title: &str,
        description: Option<String>,
    ) -> Result<Sentence> {
        let title = require_text(title, "Sentence title")?;
        let patch = SentencePatch::text(title, normalize_text_option(description));
        self.store_for(id)?.update_sentence(id, &patch).await
    }

    pub async fn level_up(&self, id: &RecordId) -> Result<Sentence> {
        self.store_for(id)?.level_up(id).await
    }

    pub async fn reset_level(&self, id: &RecordId) -> Result<Sentence> {
        self.store_for(id)?.reset_level(id).await
    }

    pub async fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        self.store_for(id)?.delete_sentence(id).await
    }

    /// Import a JSON document as a new guest note. Signed-out only.
    pub fn import(&self, raw: &str) -> Result<ImportSummary> {
        if self.is_signed_in() {
            return Err(Error::InvalidInput(
                "import is only available when signed out".to_string(),
            ));
        }
        import_json(&self.local, raw)
    }

    /// Every sentence of a guest note as an export document.
    pub fn export(&self, note_id: &RecordId) -> Result<SentenceDocument> {
        if !note_id.is_local() {
            return Err(Error::InvalidInput(
                "only guest notes can be exported".to_string(),
            ));
        }
        let note = self
            .local
            .get_note(note_id)
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;
        let sentences = self.local.list_sentences(Some(note_id));
        Ok(export_document(&note.title, &sentences, Utc::now()))
    }

    /// Upload guest data to the signed-in account.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        migrate_guest_data(&self.local, self.require_remote()?).await
    }
}
