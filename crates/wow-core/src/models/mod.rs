//! Data models for Words of Wisdom

mod note;
mod sentence;

pub use note::{Note, NotePatch, NoteSummary, RecordId, LOCAL_ID_PREFIX};
pub use sentence::{MasteryGroup, MasteryLevel, NewSentence, Sentence, SentencePatch};
