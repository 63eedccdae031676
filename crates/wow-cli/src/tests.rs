use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use wow_core::models::NewSentence;
use wow_core::{MasteryGroup, MasteryLevel, Note, RecordId};

use crate::cli::{Cli, Commands, NoteCommands, SentenceCommands, Tab};
use crate::commands::auth_cmd::code_from_callback_input;
use crate::commands::common::{
    format_relative_time, format_sentence_lines, join_title, match_note,
    normalize_note_identifier, preview, resolve_note, AppContext,
};
use crate::commands::config::{merge_profile, missing_backend_fields, ProfileUpdate};
use crate::commands::migrate::run_migrate;
use crate::commands::notes::run_notes;
use crate::commands::sentences::{load_through, run_sentences};
use crate::commands::transfer::{run_export, run_import};
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn guest_context() -> (tempfile::TempDir, AppContext) {
    let dir = tempfile::tempdir().unwrap();
    let context = AppContext::guest("default", dir.path().join("guest"));
    (dir, context)
}

fn note_with_id(id: &str) -> Note {
    let mut note = Note::new_local("title");
    note.id = RecordId::from(id);
    note
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_sentence_list_flags() {
    let cli = Cli::try_parse_from(["wow", "sentences", "list", "abc", "--tab", "mastered", "--all"])
        .unwrap();
    match cli.command {
        Some(Commands::Sentences {
            command: SentenceCommands::List { note, tab, all, .. },
        }) => {
            assert_eq!(note, "abc");
            assert_eq!(tab, Tab::Mastered);
            assert!(all);
        }
        _ => panic!("expected sentences list"),
    }

    assert!(
        Cli::try_parse_from(["wow", "sentences", "list", "abc", "--all", "--page", "2"]).is_err()
    );
}

#[test]
fn global_flags_work_after_subcommand() {
    let cli = Cli::try_parse_from([
        "wow",
        "notes",
        "list",
        "--guest-dir",
        "/tmp/guest",
        "--profile",
        "work",
    ])
    .unwrap();
    assert_eq!(cli.guest_dir, Some(PathBuf::from("/tmp/guest")));
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert!(matches!(
        cli.command,
        Some(Commands::Notes {
            command: NoteCommands::List { page: 0, .. }
        })
    ));
}

#[test]
fn tab_maps_to_mastery_group() {
    assert_eq!(MasteryGroup::from(Tab::Learning), MasteryGroup::Learning);
    assert_eq!(MasteryGroup::from(Tab::Mastered), MasteryGroup::Mastered);
}

#[test]
fn join_title_rejects_blank_words() {
    assert!(matches!(
        join_title(&[" ".to_string()]),
        Err(CliError::EmptyTitle)
    ));
    assert_eq!(
        join_title(&["Latin".to_string(), "proverbs".to_string()]).unwrap(),
        "Latin proverbs"
    );
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier(" \n "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn match_note_supports_exact_and_prefix_id() {
    let notes = vec![note_with_id("abc-1"), note_with_id("abc-12"), note_with_id("xyz")];

    assert_eq!(match_note(notes.clone(), "abc-1").unwrap().id.as_str(), "abc-1");
    assert_eq!(match_note(notes.clone(), "xy").unwrap().id.as_str(), "xyz");
    assert!(matches!(
        match_note(notes.clone(), "abc"),
        Err(CliError::AmbiguousNoteId(_))
    ));
    assert!(matches!(
        match_note(notes, "nope"),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = Utc::now();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[test]
fn preview_truncates_with_ellipsis() {
    assert_eq!(
        preview("This is a very long sentence that should be shortened", 20),
        "This is a very lo..."
    );
    assert_eq!(preview("first\nsecond", 20), "first");
}

#[test]
fn sentence_lines_show_level_and_description() {
    let note = Note::new_local("n");
    let mut input = NewSentence::fresh(note.id, "Carpe diem", Some("Seize the day".to_string()));
    input.mastery_level = MasteryLevel::Growing;
    let sentence = wow_core::Sentence::new_local(input);

    let lines = format_sentence_lines(&[sentence]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("[Growing ]"));
    assert!(lines[0].ends_with("Carpe diem"));
    assert_eq!(lines[1], "    Seize the day");
}

#[test]
fn callback_input_accepts_url_or_bare_code() {
    assert_eq!(code_from_callback_input(" abc123 ").unwrap(), "abc123");
    assert_eq!(
        code_from_callback_input("https://wow.example.com/auth/callback?code=xyz&next=%2Fnotes")
            .unwrap(),
        "xyz"
    );

    let denied = code_from_callback_input(
        "https://wow.example.com/auth/callback?error=access_denied&error_description=Link+expired",
    )
    .unwrap_err();
    assert_eq!(denied.to_string(), "Authentication error: Link expired");

    assert!(code_from_callback_input("   ").is_err());
    assert!(code_from_callback_input("https://wow.example.com/?next=/").is_err());
}

#[test]
fn merge_profile_prefers_explicit_then_env_then_existing() {
    let mut profile = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        ..CliProfile::default()
    };
    merge_profile(
        &mut profile,
        ProfileUpdate {
            supabase_url: Some(" https://new.supabase.co ".to_string()),
            ..ProfileUpdate::default()
        },
        ProfileUpdate {
            supabase_url: Some("https://env.supabase.co".to_string()),
            supabase_anon_key: Some("env-key".to_string()),
            ..ProfileUpdate::default()
        },
    )
    .unwrap();

    assert_eq!(profile.supabase_url.as_deref(), Some("https://new.supabase.co"));
    assert_eq!(profile.supabase_anon_key.as_deref(), Some("env-key"));
    assert!(missing_backend_fields(&profile).is_empty());
}

#[test]
fn merge_profile_rejects_non_http_urls() {
    let mut profile = CliProfile::default();
    let result = merge_profile(
        &mut profile,
        ProfileUpdate {
            redirect_url: Some("wow.example.com/callback".to_string()),
            ..ProfileUpdate::default()
        },
        ProfileUpdate::default(),
    );
    assert!(matches!(result, Err(CliError::Config(_))));
    assert_eq!(
        missing_backend_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key"]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn guest_notes_persist_in_the_guest_dir() {
    let (dir, context) = guest_context();
    run_notes(
        &context.notebook,
        NoteCommands::Add {
            title: vec!["Latin".to_string(), "proverbs".to_string()],
            public: true,
        },
    )
    .await
    .unwrap();

    let reopened = AppContext::guest("default", dir.path().join("guest"));
    let notes = reopened.notebook.local().list_notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Latin proverbs");
    assert!(!notes[0].is_public);
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_note_uses_unique_prefix() {
    let (_dir, context) = guest_context();
    let first = context.notebook.create_note("First", false).await.unwrap();
    context.notebook.create_note("Second", false).await.unwrap();

    let found = resolve_note(&context.notebook, first.id.as_str()).await.unwrap();
    assert_eq!(found.title, "First");
    assert!(matches!(
        resolve_note(&context.notebook, "guest-").await,
        Err(CliError::AmbiguousNoteId(_))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn sentence_commands_move_sentences_between_tabs() {
    let (_dir, context) = guest_context();
    let notebook = &context.notebook;
    let note = notebook.create_note("Proverbs", false).await.unwrap();

    run_sentences(
        notebook,
        SentenceCommands::Add {
            note: note.id.to_string(),
            title: vec!["Carpe".to_string(), "diem".to_string()],
            description: None,
        },
    )
    .await
    .unwrap();
    let sentence = notebook.local().list_sentences(Some(&note.id)).remove(0);
    assert_eq!(sentence.title, "Carpe diem");

    for _ in 0..2 {
        run_sentences(
            notebook,
            SentenceCommands::LevelUp {
                id: sentence.id.to_string(),
            },
        )
        .await
        .unwrap();
    }
    let view = notebook.open_view(&note.id).unwrap();
    view.load_initial().await;
    assert_eq!(view.counts().mastered, 1);

    run_sentences(
        notebook,
        SentenceCommands::Reset {
            id: sentence.id.to_string(),
        },
    )
    .await
    .unwrap();
    view.reload().await;
    assert_eq!(view.counts().learning, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn load_through_stops_at_requested_page() {
    let (_dir, context) = guest_context();
    let notebook = &context.notebook;
    let note = notebook.create_note("Many", false).await.unwrap();
    for i in 0..45 {
        notebook
            .local()
            .add_sentence(NewSentence::fresh(note.id.clone(), format!("s{i}"), None))
            .unwrap();
    }

    let view = notebook.open_view(&note.id).unwrap();
    let pager = view.pager(MasteryGroup::Learning);

    load_through(pager, Some(0)).await.unwrap();
    assert_eq!(pager.snapshot().sentences.len(), 20);
    load_through(pager, Some(1)).await.unwrap();
    assert_eq!(pager.snapshot().sentences.len(), 40);
    load_through(pager, None).await.unwrap();
    let state = pager.snapshot();
    assert_eq!(state.sentences.len(), 45);
    assert!(!state.has_more);
}

#[tokio::test(flavor = "current_thread")]
async fn export_then_import_creates_a_new_guest_note() {
    let (dir, context) = guest_context();
    let notebook = &context.notebook;
    let note = notebook.create_note("Idioms", false).await.unwrap();
    notebook
        .add_sentence(&note.id, "Break a leg", Some("good luck".to_string()))
        .await
        .unwrap();

    let path = dir.path().join("export.json");
    run_export(notebook, note.id.as_str(), Some(&path), false)
        .await
        .unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"Break a leg\""));

    run_import(notebook, &path).unwrap();
    let notes = notebook.local().list_notes();
    assert_eq!(notes.len(), 2);
    let imported = notes.iter().find(|n| n.id != note.id).unwrap();
    assert_eq!(imported.title, "Idioms");
    assert_eq!(notebook.local().list_sentences(Some(&imported.id)).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn migrate_requires_a_backend() {
    let (_dir, context) = guest_context();
    assert!(matches!(
        run_migrate(&context.notebook).await,
        Err(CliError::BackendNotConfigured)
    ));
}
