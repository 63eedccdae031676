//! Upload guest notes and sentences after sign-in.
//!
//! Notes are migrated one at a time, in guest listing order. The first
//! failure stops the run: notes migrated before it stay online and nothing
//! is rolled back, and guest data is only cleared once every note made it.
//! Running the migration again re-uploads every guest note still present.

use crate::error::MigrationStage;
use crate::local::LocalRecordStore;
use crate::models::{NewSentence, Note, RecordId};
use crate::remote::{NotePage, RemoteRecordGateway};
use crate::{Error, Result};

/// One guest note and the online note it became.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedNote {
    pub local_id: RecordId,
    pub remote: Note,
    pub sentences: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub notes: Vec<MigratedNote>,
    /// First page of the refreshed online listing, when it could be loaded
    pub listing: Option<NotePage>,
}

impl MigrationReport {
    #[must_use]
    pub fn sentence_count(&self) -> usize {
        self.notes.iter().map(|note| note.sentences).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Move every guest note and its sentences into the remote store.
///
/// Returns an empty report when there is nothing to migrate.
pub async fn migrate_guest_data(
    local: &LocalRecordStore,
    remote: &RemoteRecordGateway,
) -> Result<MigrationReport> {
    let principal = remote
        .principal()
        .ok_or_else(|| Error::NotAuthenticated("sign in to migrate guest notes".to_string()))?;

    let guest_notes = local.list_notes();
    if guest_notes.is_empty() {
        return Ok(MigrationReport::default());
    }
    let guest_sentences = local.list_sentences(None);
    tracing::info!(
        "Migrating {} guest note(s) for {}",
        guest_notes.len(),
        principal.id
    );

    let mut report = MigrationReport::default();
    for guest_note in guest_notes {
        let created = remote
            .create_note(&guest_note.title, false)
            .await
            .map_err(|error| migration_error(&guest_note.title, MigrationStage::Note, &error))?;

        let sentences = guest_sentences
            .iter()
            .filter(|sentence| sentence.note_id == guest_note.id)
            .map(|sentence| NewSentence {
                note_id: created.id.clone(),
                title: sentence.title.clone(),
                description: sentence.description.clone(),
                mastery_level: sentence.mastery_level,
                created_by: Some(principal.id.clone()),
            })
            .collect::<Vec<_>>();
        let count = sentences.len();
        remote
            .insert_sentences(sentences)
            .await
            .map_err(|error| {
                migration_error(&guest_note.title, MigrationStage::Sentences, &error)
            })?;

        tracing::debug!(
            "Migrated guest note {} as {} with {} sentence(s)",
            guest_note.id,
            created.id,
            count
        );
        report.notes.push(MigratedNote {
            local_id: guest_note.id,
            remote: created,
            sentences: count,
        });
    }

    local.clear_all()?;

    match remote.list_notes(0).await {
        Ok(page) => report.listing = Some(page),
        Err(error) => tracing::warn!("Failed to refresh notes after migration: {}", error),
    }
    tracing::info!(
        "Migrated {} note(s) and {} sentence(s)",
        report.notes.len(),
        report.sentence_count()
    );
    Ok(report)
}

fn migration_error(title: &str, stage: MigrationStage, error: &Error) -> Error {
    let message = match error {
        Error::Remote(message)
        | Error::PermissionDenied(message)
        | Error::NotAuthenticated(message) => message.clone(),
        other => other.to_string(),
    };
    tracing::error!("Migration stopped at \"{}\": {}", title, message);
    Error::Migration {
        title: title.to_string(),
        stage,
        message,
    }
}
