//! Sentence model and mastery levels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RecordId;

/// Memorization progress of a sentence.
///
/// Serialized as the integers 1, 2 and 3.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum MasteryLevel {
    #[default]
    Fresh = 1,
    Growing = 2,
    Mastered = 3,
}

impl MasteryLevel {
    /// Next level up, saturating at [`MasteryLevel::Mastered`]
    #[must_use]
    pub const fn level_up(self) -> Self {
        match self {
            Self::Fresh => Self::Growing,
            Self::Growing | Self::Mastered => Self::Mastered,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lenient conversion used by imports: anything but exactly 2 or 3 is fresh
    #[must_use]
    pub fn from_lenient(value: Option<&serde_json::Value>) -> Self {
        let number = value.and_then(|value| match value {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        });
        match number {
            Some(n) if (n - 2.0).abs() < f64::EPSILON => Self::Growing,
            Some(n) if (n - 3.0).abs() < f64::EPSILON => Self::Mastered,
            _ => Self::Fresh,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fresh => "Fresh",
            Self::Growing => "Growing",
            Self::Mastered => "Mastered",
        }
    }

    #[must_use]
    pub const fn group(self) -> MasteryGroup {
        match self {
            Self::Fresh | Self::Growing => MasteryGroup::Learning,
            Self::Mastered => MasteryGroup::Mastered,
        }
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Fresh),
            2 => Ok(Self::Growing),
            3 => Ok(Self::Mastered),
            other => Err(format!("mastery level must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<MasteryLevel> for u8 {
    fn from(value: MasteryLevel) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two tabs of a note: still learning, or mastered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryGroup {
    Learning,
    Mastered,
}

impl MasteryGroup {
    pub const ALL: [Self; 2] = [Self::Learning, Self::Mastered];

    #[must_use]
    pub const fn levels(self) -> &'static [MasteryLevel] {
        match self {
            Self::Learning => &[MasteryLevel::Fresh, MasteryLevel::Growing],
            Self::Mastered => &[MasteryLevel::Mastered],
        }
    }

    #[must_use]
    pub fn contains(self, level: MasteryLevel) -> bool {
        level.group() == self
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Mastered => "mastered",
        }
    }
}

impl fmt::Display for MasteryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentence being memorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: RecordId,
    pub note_id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mastery_level: MasteryLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Sentence {
    /// Materialize a guest sentence from its input fields
    #[must_use]
    pub fn new_local(input: NewSentence) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new_local(),
            note_id: input.note_id,
            title: input.title,
            description: input.description,
            mastery_level: input.mastery_level,
            created_at: now,
            updated_at: now,
            created_by: input.created_by,
        }
    }
}

/// Fields for a sentence that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSentence {
    pub note_id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub mastery_level: MasteryLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl NewSentence {
    /// A fresh sentence for `note_id`
    pub fn fresh(note_id: RecordId, title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            note_id,
            title: title.into(),
            description,
            mastery_level: MasteryLevel::Fresh,
            created_by: None,
        }
    }
}

/// Partial update for a sentence.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mastery_level: Option<MasteryLevel>,
}

impl SentencePatch {
    #[must_use]
    pub const fn level(level: MasteryLevel) -> Self {
        Self {
            title: None,
            description: None,
            mastery_level: Some(level),
        }
    }

    #[must_use]
    pub fn text(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description),
            mastery_level: None,
        }
    }

    pub(crate) fn apply(&self, sentence: &mut Sentence) {
        if let Some(title) = &self.title {
            sentence.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            sentence.description.clone_from(description);
        }
        if let Some(level) = self.mastery_level {
            sentence.mastery_level = level;
        }
    }
}
