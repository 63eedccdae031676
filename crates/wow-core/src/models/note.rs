//! Note model and record identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix reserved for records that only exist in guest storage.
pub const LOCAL_ID_PREFIX: &str = "guest-";

/// Identifier shared by notes and sentences.
///
/// Remote rows carry backend-generated ids; guest rows use the
/// [`LOCAL_ID_PREFIX`] namespace so the owning store is known without I/O.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a fresh guest-namespace id (UUID v7, time-sortable)
    #[must_use]
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap an id returned by the backend
    pub fn remote(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether the record lives in guest storage
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput("Record id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A note: a titled collection of sentences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: RecordId,
    pub title: String,
    /// Guest notes are always private
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owner id; absent for guest notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Note {
    /// Create a new guest note with the given title
    #[must_use]
    pub fn new_local(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new_local(),
            title: title.into(),
            is_public: false,
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.id.is_local()
    }

    /// Whether `user_id` may edit this note.
    ///
    /// Guest notes are editable by whoever holds the device; remote notes only
    /// by their owner.
    #[must_use]
    pub fn is_editable_by(&self, user_id: Option<&str>) -> bool {
        if self.is_local() {
            return true;
        }
        matches!((user_id, self.created_by.as_deref()), (Some(user), Some(owner)) if user == owner)
    }
}

/// Partial update for a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl NotePatch {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_public: None,
        }
    }

    #[must_use]
    pub const fn visibility(is_public: bool) -> Self {
        Self {
            title: None,
            is_public: Some(is_public),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_public.is_none()
    }
}

/// Note plus its sentence count, as shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    #[serde(flatten)]
    pub note: Note,
    pub sentence_count: usize,
}
