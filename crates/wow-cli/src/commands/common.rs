use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use wow_core::auth::AuthState;
use wow_core::config::BackendConfig;
use wow_core::local::LocalRecordStore;
use wow_core::models::NoteSummary;
use wow_core::remote::{PostgrestBackend, RemoteRecordGateway};
use wow_core::services::NotebookService;
use wow_core::{Note, Sentence};

use crate::auth::{auth_client, CliAuthClient};
use crate::config_profiles::{resolve_guest_dir, CliProfile, CliProfilesConfig, GUEST_DIR_ENV};
use crate::error::CliError;

/// Everything a command needs for one invocation.
pub struct AppContext {
    pub profile_name: String,
    pub profile: CliProfile,
    pub guest_dir: PathBuf,
    pub notebook: NotebookService,
    pub auth: Option<CliAuthClient>,
    pub state: AuthState,
}

impl AppContext {
    /// Guest-only context over `guest_dir`, with no backend.
    pub fn guest(profile_name: &str, guest_dir: PathBuf) -> Self {
        let local = LocalRecordStore::open_dir(guest_dir.clone());
        Self {
            profile_name: profile_name.to_string(),
            profile: CliProfile::default(),
            guest_dir,
            notebook: NotebookService::guest_only(local),
            auth: None,
            state: AuthState::signed_out(),
        }
    }

    pub fn require_auth(&self) -> Result<&CliAuthClient, CliError> {
        self.auth.as_ref().ok_or(CliError::BackendNotConfigured)
    }
}

/// Resolve the profile, open guest storage, and restore any stored session.
pub async fn open_context(
    guest_dir: Option<PathBuf>,
    profile: Option<&str>,
) -> Result<AppContext, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let guest_dir = resolve_guest_dir(
        guest_dir,
        env::var_os(GUEST_DIR_ENV).map(PathBuf::from),
        Some(&profile),
        &profile_name,
    );

    let Some(backend) = resolve_backend_config(&profile)? else {
        tracing::debug!("No backend configured; running in guest mode");
        let mut context = AppContext::guest(&profile_name, guest_dir);
        context.profile = profile;
        return Ok(context);
    };

    let state = AuthState::signed_out();
    let auth = auth_client(&profile_name, &backend, state.clone())
        .map_err(|error| CliError::Auth(error.to_string()))?;
    if let Err(error) = auth.restore_session().await {
        tracing::warn!("Could not restore session for '{}': {}", profile_name, error);
    }

    let rest = PostgrestBackend::new(&backend, state.clone()).map_err(wow_core::Error::from)?;
    let remote = RemoteRecordGateway::new(Arc::new(rest));
    let local = LocalRecordStore::open_dir(guest_dir.clone());

    Ok(AppContext {
        profile_name,
        profile,
        guest_dir,
        notebook: NotebookService::new(local, Some(remote)),
        auth: Some(auth),
        state,
    })
}

/// Backend endpoints from the profile, falling back to the environment.
pub fn resolve_backend_config(profile: &CliProfile) -> Result<Option<BackendConfig>, CliError> {
    if let Some(config) = profile.backend_config()? {
        return Ok(Some(config));
    }
    Ok(BackendConfig::from_env()?)
}

/// Every note the user can see, guest notes first.
pub async fn all_notes(notebook: &NotebookService) -> Result<Vec<Note>, CliError> {
    let mut page = 0;
    let mut notes = Vec::new();
    let mut remote_seen = 0;
    loop {
        let listing = notebook.list_notes(page).await?;
        if page == 0 {
            notes.extend(listing.guest.into_iter().map(|summary| summary.note));
        }
        let fetched = listing.remote.len();
        remote_seen += fetched;
        notes.extend(listing.remote.into_iter().map(|summary| summary.note));
        if fetched == 0 || remote_seen >= listing.remote_total {
            break;
        }
        page += 1;
    }
    Ok(notes)
}

pub async fn resolve_note(notebook: &NotebookService, query: &str) -> Result<Note, CliError> {
    let query = normalize_note_identifier(query)?;
    match_note(all_notes(notebook).await?, &query)
}

/// Pick the note whose id equals `query`, or the only one it prefixes.
pub fn match_note(notes: Vec<Note>, query: &str) -> Result<Note, CliError> {
    let mut matching = Vec::new();
    for note in notes {
        if note.id.as_str() == query {
            return Ok(note);
        }
        if note.id.as_str().starts_with(query) {
            matching.push(note);
        }
    }

    match matching.len() {
        0 => Err(CliError::NoteNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| note.id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Join free-form words into a title, rejecting blank input.
pub fn join_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ");
    let title = title.trim();
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title.to_string())
    }
}

pub fn format_note_lines(notes: &[NoteSummary], now: DateTime<Utc>) -> Vec<String> {
    notes
        .iter()
        .map(|summary| {
            let note = &summary.note;
            let title = preview(&note.title, 40);
            let visibility = note_visibility_label(note);
            let count = format!("{} sentence(s)", summary.sentence_count);
            let relative_time = format_relative_time(note.updated_at, now);
            format!(
                "{}  {title:<40}  {count:<14}  {visibility:<7}  {relative_time}",
                note.id
            )
        })
        .collect()
}

pub fn format_sentence_lines(sentences: &[Sentence]) -> Vec<String> {
    let mut lines = Vec::new();
    for sentence in sentences {
        lines.push(format!(
            "{}  [{:<8}]  {}",
            sentence.id,
            sentence.mastery_level.label(),
            sentence.title
        ));
        if let Some(description) = &sentence.description {
            lines.push(format!("    {}", preview(description, 100)));
        }
    }
    lines
}

pub fn note_visibility_label(note: &Note) -> &'static str {
    if note.id.is_local() {
        "guest"
    } else if note.is_public {
        "public"
    } else {
        "private"
    }
}

/// First line of `text`, whitespace-collapsed and cut to `max_chars`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - then).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
