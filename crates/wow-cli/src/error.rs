use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] wow_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note title cannot be empty")]
    EmptyTitle,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Failed to load {0} sentences; rerun with RUST_LOG=wow=debug for details")]
    LoadFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "No backend is configured. Run `wow config init --supabase-url URL --supabase-anon-key KEY`, or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    BackendNotConfigured,
    #[error("Not signed in. Run `wow auth login --email you@example.com` first.")]
    NotSignedIn,
}
