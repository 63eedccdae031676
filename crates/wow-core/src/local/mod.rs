//! Guest record store.
//!
//! Notes and sentences created without signing in live in two collections,
//! each persisted as a whole JSON snapshot under its own key. Every write
//! re-reads the snapshot, applies the change, and stores the full collection
//! again.
//!
//! Storage that cannot be written to (detected by a probe at open time) or a
//! snapshot that cannot be parsed degrades to "no guest data": reads return
//! empty collections and never fail.

mod storage;

pub use storage::{probe, FileStorage, KeyValueStorage, MemoryStorage};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    MasteryGroup, NewSentence, Note, NotePatch, RecordId, Sentence, SentencePatch,
};
use crate::pagination::SentencePage;
use crate::{Error, Result};

const NOTES_KEY: &str = "guest_notes";
const SENTENCES_KEY: &str = "guest_sentences";

/// Synchronous store for guest-namespace notes and sentences.
///
/// Cloning is cheap; clones share the same storage and write lock.
#[derive(Clone)]
pub struct LocalRecordStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Option<Box<dyn KeyValueStorage>>,
    write_lock: Mutex<()>,
}

impl LocalRecordStore {
    /// Wrap a storage backend, probing it first.
    pub fn open(storage: impl KeyValueStorage + 'static) -> Self {
        let storage: Box<dyn KeyValueStorage> = Box::new(storage);
        let storage = if probe(storage.as_ref()) {
            Some(storage)
        } else {
            tracing::warn!("Guest storage is unavailable; guest data is disabled");
            None
        };
        Self::from_parts(storage)
    }

    /// Open guest storage in a directory. Failure to create it disables guest data.
    pub fn open_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match FileStorage::open(&dir) {
            Ok(storage) => Self::open(storage),
            Err(error) => {
                tracing::warn!(
                    "Failed to open guest storage at {}: {}",
                    dir.display(),
                    error
                );
                Self::unavailable()
            }
        }
    }

    /// Fresh in-memory store (primarily for tests).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    /// A store with no backing storage at all.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::from_parts(None)
    }

    fn from_parts(storage: Option<Box<dyn KeyValueStorage>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Whether guest data can be persisted.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.storage.is_some()
    }

    /// All guest notes, most recently created first.
    pub fn list_notes(&self) -> Vec<Note> {
        self.read(NOTES_KEY)
    }

    pub fn get_note(&self, id: &RecordId) -> Option<Note> {
        self.list_notes().into_iter().find(|note| &note.id == id)
    }

    /// Create a guest note and put it at the front of the collection.
    pub fn create_note(&self, title: &str) -> Result<Note> {
        let _guard = self.lock();
        let note = Note::new_local(title);
        let mut notes: Vec<Note> = self.read(NOTES_KEY);
        notes.insert(0, note.clone());
        self.write(NOTES_KEY, &notes)?;
        tracing::debug!("Created guest note {}", note.id);
        Ok(note)
    }

    /// Merge `patch` into a guest note. Returns `None` when the id is unknown.
    ///
    /// Visibility changes are ignored; guest notes stay private.
    pub fn update_note(&self, id: &RecordId, patch: &NotePatch) -> Result<Option<Note>> {
        let _guard = self.lock();
        let mut notes: Vec<Note> = self.read(NOTES_KEY);
        let Some(note) = notes.iter_mut().find(|note| &note.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            note.title.clone_from(title);
        }
        note.updated_at = Utc::now();
        let updated = note.clone();
        self.write(NOTES_KEY, &notes)?;
        Ok(Some(updated))
    }

    /// Delete a guest note together with every sentence that belongs to it.
    pub fn delete_note(&self, id: &RecordId) -> Result<()> {
        let _guard = self.lock();
        // Sentences go first so a failed second write never leaves orphans.
        let sentences: Vec<Sentence> = self.read(SENTENCES_KEY);
        let sentences = sentences
            .into_iter()
            .filter(|sentence| &sentence.note_id != id)
            .collect::<Vec<_>>();
        self.write(SENTENCES_KEY, &sentences)?;

        let notes: Vec<Note> = self.read(NOTES_KEY);
        let notes = notes
            .into_iter()
            .filter(|note| &note.id != id)
            .collect::<Vec<_>>();
        self.write(NOTES_KEY, &notes)
    }

    /// Guest sentences in insertion order (newest first), optionally for one note.
    pub fn list_sentences(&self, note_id: Option<&RecordId>) -> Vec<Sentence> {
        let sentences: Vec<Sentence> = self.read(SENTENCES_KEY);
        match note_id {
            Some(note_id) => sentences
                .into_iter()
                .filter(|sentence| &sentence.note_id == note_id)
                .collect(),
            None => sentences,
        }
    }

    pub fn get_sentence(&self, id: &RecordId) -> Option<Sentence> {
        self.list_sentences(None)
            .into_iter()
            .find(|sentence| &sentence.id == id)
    }

    /// Store a new guest sentence at the front of the collection.
    pub fn add_sentence(&self, input: NewSentence) -> Result<Sentence> {
        let _guard = self.lock();
        let sentence = Sentence::new_local(input);
        let mut sentences: Vec<Sentence> = self.read(SENTENCES_KEY);
        sentences.insert(0, sentence.clone());
        self.write(SENTENCES_KEY, &sentences)?;
        Ok(sentence)
    }

    /// Merge `patch` into a guest sentence. Returns `None` when the id is unknown.
    pub fn update_sentence(
        &self,
        id: &RecordId,
        patch: &SentencePatch,
    ) -> Result<Option<Sentence>> {
        let _guard = self.lock();
        let mut sentences: Vec<Sentence> = self.read(SENTENCES_KEY);
        let Some(sentence) = sentences.iter_mut().find(|sentence| &sentence.id == id) else {
            return Ok(None);
        };
        patch.apply(sentence);
        sentence.updated_at = Utc::now();
        let updated = sentence.clone();
        self.write(SENTENCES_KEY, &sentences)?;
        Ok(Some(updated))
    }

    pub fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        let _guard = self.lock();
        let sentences: Vec<Sentence> = self.read(SENTENCES_KEY);
        let sentences = sentences
            .into_iter()
            .filter(|sentence| &sentence.id != id)
            .collect::<Vec<_>>();
        self.write(SENTENCES_KEY, &sentences)
    }

    /// Drop both collections. Only the migration workflow calls this.
    pub fn clear_all(&self) -> Result<()> {
        let _guard = self.lock();
        let storage = self.storage()?;
        storage.remove(NOTES_KEY)?;
        storage.remove(SENTENCES_KEY)?;
        tracing::info!("Cleared all guest data");
        Ok(())
    }

    /// One page of a note's sentences in `group`, newest update first.
    ///
    /// The sort is stable, so equal timestamps keep collection order.
    pub fn sentence_page(
        &self,
        note_id: &RecordId,
        group: MasteryGroup,
        page: usize,
        page_size: usize,
    ) -> SentencePage {
        let mut matching = self
            .list_sentences(Some(note_id))
            .into_iter()
            .filter(|sentence| group.contains(sentence.mastery_level))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = matching.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        SentencePage {
            items: matching.drain(start..end).collect(),
            total,
        }
    }

    /// Number of a note's sentences in `group`.
    pub fn count_sentences(&self, note_id: &RecordId, group: MasteryGroup) -> usize {
        self.list_sentences(Some(note_id))
            .iter()
            .filter(|sentence| group.contains(sentence.mastery_level))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn storage(&self) -> Result<&dyn KeyValueStorage> {
        self.inner
            .storage
            .as_deref()
            .ok_or(Error::StorageUnavailable)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(storage) = self.inner.storage.as_deref() else {
            return Vec::new();
        };
        let raw = match storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!("Failed to read guest collection '{}': {}", key, error);
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!("Ignoring unreadable guest collection '{}': {}", key, error);
            Vec::new()
        })
    }

    fn write<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let storage = self.storage()?;
        let raw = serde_json::to_string(items)?;
        storage.set(key, &raw)
    }
}
