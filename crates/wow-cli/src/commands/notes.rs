use chrono::Utc;
use serde::Serialize;
use wow_core::models::NoteSummary;
use wow_core::services::NotebookService;

use crate::cli::NoteCommands;
use crate::commands::common::{format_note_lines, join_title, note_visibility_label, resolve_note};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListOutput<'a> {
    pub guest: &'a [NoteSummary],
    pub remote: &'a [NoteSummary],
    pub remote_total: usize,
    pub page: usize,
}

pub async fn run_notes(notebook: &NotebookService, command: NoteCommands) -> Result<(), CliError> {
    match command {
        NoteCommands::List { page, json } => run_list(notebook, page, json).await,
        NoteCommands::Show { note } => run_show(notebook, &note).await,
        NoteCommands::Add { title, public } => {
            let title = join_title(&title)?;
            let note = notebook.create_note(&title, public).await?;
            println!("{}", note.id);
            if note.is_local() && notebook.remote().is_some() && !notebook.is_signed_in() {
                eprintln!("Saved on this device. Sign in and run `wow migrate` to keep it online.");
            }
            Ok(())
        }
        NoteCommands::Rename { note, title } => {
            let title = join_title(&title)?;
            let note = resolve_note(notebook, &note).await?;
            let note = notebook.rename_note(&note.id, &title).await?;
            println!("Renamed {} to \"{}\"", note.id, note.title);
            Ok(())
        }
        NoteCommands::Visibility { note, visibility } => {
            let note = resolve_note(notebook, &note).await?;
            if note.is_local() {
                println!("Guest notes are always private; {} unchanged", note.id);
                return Ok(());
            }
            let note = notebook
                .set_visibility(&note.id, visibility.is_public())
                .await?;
            println!("{} is now {}", note.id, note_visibility_label(&note));
            Ok(())
        }
        NoteCommands::Delete { note } => {
            let note = resolve_note(notebook, &note).await?;
            notebook.delete_note(&note.id).await?;
            println!("Deleted {}", note.id);
            Ok(())
        }
    }
}

async fn run_list(notebook: &NotebookService, page: usize, as_json: bool) -> Result<(), CliError> {
    let listing = notebook.list_notes(page).await?;

    if as_json {
        let output = NoteListOutput {
            guest: &listing.guest,
            remote: &listing.remote,
            remote_total: listing.remote_total,
            page: listing.page,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if listing.is_empty() {
        println!("No notes yet. Create one with `wow notes add <title>`.");
        return Ok(());
    }

    let now = Utc::now();
    let summaries = listing.iter().cloned().collect::<Vec<_>>();
    for line in format_note_lines(&summaries, now) {
        println!("{line}");
    }
    let shown = page * wow_core::config::NOTES_PER_PAGE + listing.remote.len();
    if shown < listing.remote_total {
        println!(
            "({} of {} online notes; next: `wow notes list --page {}`)",
            shown,
            listing.remote_total,
            page + 1
        );
    }
    Ok(())
}

async fn run_show(notebook: &NotebookService, query: &str) -> Result<(), CliError> {
    let note = resolve_note(notebook, query).await?;
    let view = notebook.open_view(&note.id)?;
    view.refresh_counts().await;
    let counts = view.counts();

    println!("{}", note.title);
    println!("  id:         {}", note.id);
    println!("  visibility: {}", note_visibility_label(&note));
    if let Some(owner) = &note.created_by {
        println!("  owner:      {owner}");
    }
    println!(
        "  sentences:  {} learning, {} mastered",
        counts.learning, counts.mastered
    );
    println!("  updated:    {}", note.updated_at.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}
