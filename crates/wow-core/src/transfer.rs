//! Sentence import/export in a small JSON document format.
//!
//! ```json
//! { "version": 1, "exportedAt": "...", "title": "Idioms",
//!   "sentences": [{ "title": "...", "description": null, "mastery_level": 1 }] }
//! ```
//!
//! Imports are lenient: a missing version means 1, a blank title gets a dated
//! default, entries without a title are skipped, and any mastery level other
//! than 2 or 3 becomes 1.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::local::LocalRecordStore;
use crate::models::{MasteryLevel, NewSentence, Note, Sentence};
use crate::{Error, Result};

pub const DOCUMENT_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceDocument {
    pub version: u64,
    #[serde(
        rename = "exportedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exported_at: Option<DateTime<Utc>>,
    pub title: String,
    pub sentences: Vec<DocumentSentence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSentence {
    pub title: String,
    pub description: Option<String>,
    pub mastery_level: MasteryLevel,
}

impl From<&Sentence> for DocumentSentence {
    fn from(sentence: &Sentence) -> Self {
        Self {
            title: sentence.title.clone(),
            description: sentence.description.clone(),
            mastery_level: sentence.mastery_level,
        }
    }
}

/// What an import created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub note: Note,
    pub sentences: usize,
}

#[must_use]
pub fn default_import_title(date: NaiveDate) -> String {
    format!("Imported Sentences - {}", date.format("%Y-%m-%d"))
}

#[must_use]
pub fn suggested_export_file_name(date: NaiveDate) -> String {
    format!("sentences-export-{}.json", date.format("%Y-%m-%d"))
}

/// Parse an import file, normalizing it as described in the module docs.
pub fn parse_document(raw: &str, today: NaiveDate) -> Result<SentenceDocument> {
    let json: Value = serde_json::from_str(raw)?;

    let version = json
        .get("version")
        .and_then(Value::as_f64)
        .unwrap_or(1.0);
    let Some(entries) = json.get("sentences").and_then(Value::as_array) else {
        return Err(invalid_file());
    };
    if version < 1.0 {
        return Err(invalid_file());
    }

    let title = json
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map_or_else(|| default_import_title(today), str::to_string);

    let sentences = entries
        .iter()
        .filter_map(|entry| {
            let title = entry.get("title").and_then(Value::as_str)?.trim();
            if title.is_empty() {
                return None;
            }
            let description = match entry.get("description") {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some(text.clone()),
                Some(other) => Some(other.to_string()),
            };
            Some(DocumentSentence {
                title: title.to_string(),
                description,
                mastery_level: MasteryLevel::from_lenient(entry.get("mastery_level")),
            })
        })
        .collect();

    let exported_at = json
        .get("exportedAt")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));

    Ok(SentenceDocument {
        version: json
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(DOCUMENT_VERSION),
        exported_at,
        title,
        sentences,
    })
}

/// Create one guest note holding every sentence in `document`.
pub fn import_document(
    local: &LocalRecordStore,
    document: &SentenceDocument,
) -> Result<ImportSummary> {
    let note = local.create_note(&document.title)?;
    for entry in &document.sentences {
        local.add_sentence(NewSentence {
            note_id: note.id.clone(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            mastery_level: entry.mastery_level,
            created_by: None,
        })?;
    }
    tracing::info!(
        "Imported {} sentence(s) into \"{}\"",
        document.sentences.len(),
        note.title
    );
    Ok(ImportSummary {
        note,
        sentences: document.sentences.len(),
    })
}

/// Parse `raw` and import it as a guest note.
pub fn import_json(local: &LocalRecordStore, raw: &str) -> Result<ImportSummary> {
    let document = parse_document(raw, Utc::now().date_naive())?;
    import_document(local, &document)
}

#[must_use]
pub fn export_document(title: &str, sentences: &[Sentence], now: DateTime<Utc>) -> SentenceDocument {
    SentenceDocument {
        version: DOCUMENT_VERSION,
        exported_at: Some(now),
        title: title.to_string(),
        sentences: sentences.iter().map(DocumentSentence::from).collect(),
    }
}

/// Pretty-printed JSON for an export document.
pub fn render_document(document: &SentenceDocument) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

fn invalid_file() -> Error {
    Error::InvalidInput("Invalid import file: missing sentences".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn lenient_parse_normalizes_entries() {
        let raw = r#"{
            "title": "   ",
            "sentences": [
                { "title": " Carpe diem ", "description": "seize the day", "mastery_level": 3 },
                { "title": "", "mastery_level": 2 },
                { "description": "no title" },
                { "title": "Veni vidi vici", "mastery_level": 9 },
                { "title": "Alea iacta est", "description": 42, "mastery_level": "2" }
            ]
        }"#;
        let document = parse_document(raw, day()).unwrap();
        assert_eq!(document.version, 1);
        assert_eq!(document.title, "Imported Sentences - 2026-03-14");
        assert_eq!(document.sentences.len(), 3);
        assert_eq!(document.sentences[0].title, "Carpe diem");
        assert_eq!(document.sentences[0].mastery_level, MasteryLevel::Mastered);
        assert_eq!(document.sentences[1].mastery_level, MasteryLevel::Fresh);
        assert_eq!(document.sentences[2].description.as_deref(), Some("42"));
        assert_eq!(document.sentences[2].mastery_level, MasteryLevel::Growing);
    }

    #[test]
    fn rejects_files_without_sentences_or_bad_version() {
        assert!(parse_document(r#"{"title":"x"}"#, day()).is_err());
        assert!(parse_document(r#"{"version":0,"sentences":[]}"#, day()).is_err());
        assert!(parse_document("not json", day()).is_err());
    }

    #[test]
    fn export_file_name_uses_date() {
        assert_eq!(
            suggested_export_file_name(day()),
            "sentences-export-2026-03-14.json"
        );
    }

    #[test]
    fn export_then_import_preserves_sentences() {
        let local = LocalRecordStore::in_memory();
        let note = local.create_note("Latin").unwrap();
        for (title, level) in [("a", MasteryLevel::Fresh), ("b", MasteryLevel::Mastered)] {
            let mut input = NewSentence::fresh(note.id.clone(), title, Some(format!("{title}!")));
            input.mastery_level = level;
            local.add_sentence(input).unwrap();
        }

        let sentences = local.list_sentences(Some(&note.id));
        let rendered = render_document(&export_document(&note.title, &sentences, Utc::now())).unwrap();
        assert!(rendered.contains("\"exportedAt\""));

        let summary = import_json(&local, &rendered).unwrap();
        assert_eq!(summary.sentences, 2);
        assert_eq!(summary.note.title, "Latin");
        assert_ne!(summary.note.id, note.id);

        let mut imported = local
            .list_sentences(Some(&summary.note.id))
            .into_iter()
            .map(|s| (s.title, s.description, s.mastery_level))
            .collect::<Vec<_>>();
        imported.sort();
        assert_eq!(
            imported,
            vec![
                ("a".to_string(), Some("a!".to_string()), MasteryLevel::Fresh),
                ("b".to_string(), Some("b!".to_string()), MasteryLevel::Mastered),
            ]
        );
    }
}
