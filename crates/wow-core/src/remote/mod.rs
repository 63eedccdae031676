//! Typed access to notes and sentences stored in the hosted backend.

mod backend;
#[cfg(test)]
mod memory;
mod rest;

pub use backend::{
    BackendError, BackendResult, Filter, Order, Principal, RemoteBackend, RowRange, SelectQuery,
    SelectResult, Table,
};
#[cfg(test)]
pub use memory::{MemoryBackend, Operation};
pub use rest::PostgrestBackend;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::NOTES_PER_PAGE;
use crate::models::{
    MasteryGroup, NewSentence, Note, NotePatch, NoteSummary, RecordId, Sentence, SentencePatch,
};
use crate::pagination::SentencePage;
use crate::{Error, Result};

/// One page of the signed-in user's note listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePage {
    pub notes: Vec<NoteSummary>,
    /// All notes visible to the principal, across pages
    pub total: usize,
}

/// Gateway over a [`RemoteBackend`].
///
/// Updates and deletes that affect no rows are reported as
/// [`Error::PermissionDenied`]: row-level security hides rows the principal
/// does not own, so "not yours" and "gone" look the same.
#[derive(Clone)]
pub struct RemoteRecordGateway {
    backend: Arc<dyn RemoteBackend>,
}

impl RemoteRecordGateway {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.backend.principal()
    }

    fn require_principal(&self) -> Result<Principal> {
        self.backend
            .principal()
            .ok_or_else(|| Error::NotAuthenticated("sign in to save notes online".to_string()))
    }

    /// Zero-based page of notes, most recently updated first.
    ///
    /// Sentence counts come back embedded in the same request.
    pub async fn list_notes(&self, page: usize) -> Result<NotePage> {
        let query = SelectQuery::new()
            .order_desc("updated_at")
            .range(page.saturating_mul(NOTES_PER_PAGE), NOTES_PER_PAGE)
            .with_count()
            .count_related(Table::Sentences);
        let result = self.backend.select_rows(Table::Notes, &query).await?;
        Ok(NotePage {
            notes: result
                .rows
                .into_iter()
                .map(decode_summary)
                .collect::<Result<_>>()?,
            total: result.total.unwrap_or_default(),
        })
    }

    pub async fn get_note(&self, id: &RecordId) -> Result<Option<Note>> {
        let query = SelectQuery::new().filter(id_filter(id)).range(0, 1);
        let result = self.backend.select_rows(Table::Notes, &query).await?;
        result.rows.into_iter().next().map(decode_row).transpose()
    }

    /// Create a note owned by the principal.
    pub async fn create_note(&self, title: &str, is_public: bool) -> Result<Note> {
        let principal = self.require_principal()?;
        let row = serde_json::json!({
            "title": title,
            "is_public": is_public,
            "created_by": principal.id,
        });
        let note: Note = single_row(self.backend.insert_rows(Table::Notes, vec![row]).await?)
            .ok_or_else(|| Error::Remote("insert returned no row".to_string()))
            .and_then(decode_row)?;
        tracing::debug!("Created note {}", note.id);
        Ok(note)
    }

    pub async fn update_note(&self, id: &RecordId, patch: &NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        let rows = self
            .backend
            .update_rows(Table::Notes, &[id_filter(id)], serde_json::to_value(patch)?)
            .await?;
        single_row(rows)
            .ok_or_else(|| denied("note", id))
            .and_then(decode_row)
    }

    /// Delete a note; its sentences go with it.
    pub async fn delete_note(&self, id: &RecordId) -> Result<()> {
        let rows = self
            .backend
            .delete_rows(Table::Notes, &[id_filter(id)])
            .await?;
        if rows.is_empty() {
            return Err(denied("note", id));
        }
        Ok(())
    }

    /// One ranged, filtered, ordered and counted query for a tab page.
    pub async fn fetch_sentence_page(
        &self,
        note_id: &RecordId,
        group: MasteryGroup,
        page: usize,
        page_size: usize,
    ) -> Result<SentencePage> {
        let query = SelectQuery::new()
            .filter(Filter::eq("note_id", note_id.as_str()))
            .filter(level_filter(group))
            .order_desc("updated_at")
            .range(page.saturating_mul(page_size), page_size)
            .with_count();
        let result = self.backend.select_rows(Table::Sentences, &query).await?;
        Ok(SentencePage {
            items: decode_rows(result.rows)?,
            total: result.total.unwrap_or_default(),
        })
    }

    /// Head-only count of a note's sentences, optionally limited to one group.
    pub async fn count_sentences(
        &self,
        note_id: &RecordId,
        group: Option<MasteryGroup>,
    ) -> Result<usize> {
        let mut query = SelectQuery::new()
            .filter(Filter::eq("note_id", note_id.as_str()))
            .head_only();
        if let Some(group) = group {
            query = query.filter(level_filter(group));
        }
        let result = self.backend.select_rows(Table::Sentences, &query).await?;
        Ok(result.total.unwrap_or_default())
    }

    pub async fn get_sentence(&self, id: &RecordId) -> Result<Option<Sentence>> {
        let query = SelectQuery::new().filter(id_filter(id)).range(0, 1);
        let result = self.backend.select_rows(Table::Sentences, &query).await?;
        result.rows.into_iter().next().map(decode_row).transpose()
    }

    pub async fn add_sentence(&self, input: NewSentence) -> Result<Sentence> {
        self.insert_sentences(vec![input])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Remote("insert returned no row".to_string()))
    }

    /// Insert several sentences in one request, all owned by the principal.
    pub async fn insert_sentences(&self, inputs: Vec<NewSentence>) -> Result<Vec<Sentence>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let principal = self.require_principal()?;
        let rows = inputs
            .into_iter()
            .map(|mut input| {
                input.created_by = Some(principal.id.clone());
                serde_json::to_value(input)
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        let stored = self.backend.insert_rows(Table::Sentences, rows).await?;
        decode_rows(stored)
    }

    pub async fn update_sentence(&self, id: &RecordId, patch: &SentencePatch) -> Result<Sentence> {
        let rows = self
            .backend
            .update_rows(Table::Sentences, &[id_filter(id)], serde_json::to_value(patch)?)
            .await?;
        single_row(rows)
            .ok_or_else(|| denied("sentence", id))
            .and_then(decode_row)
    }

    pub async fn delete_sentence(&self, id: &RecordId) -> Result<()> {
        let rows = self
            .backend
            .delete_rows(Table::Sentences, &[id_filter(id)])
            .await?;
        if rows.is_empty() {
            return Err(denied("sentence", id));
        }
        Ok(())
    }
}

fn id_filter(id: &RecordId) -> Filter {
    Filter::eq("id", id.as_str())
}

fn level_filter(group: MasteryGroup) -> Filter {
    Filter::is_in("mastery_level", group.levels().iter().map(|level| level.as_u8()))
}

fn denied(kind: &str, id: &RecordId) -> Error {
    Error::PermissionDenied(format!("{kind} {id}"))
}

fn single_row(rows: Vec<Value>) -> Option<Value> {
    rows.into_iter().next()
}

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// A note row carrying `sentences: [{"count": n}]`.
fn decode_summary(mut row: Value) -> Result<NoteSummary> {
    let sentence_count = row
        .as_object_mut()
        .and_then(|fields| fields.remove(Table::Sentences.name()))
        .and_then(|embedded| embedded.get(0)?.get("count")?.as_u64())
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or_default();
    Ok(NoteSummary {
        note: decode_row(row)?,
        sentence_count,
    })
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}
