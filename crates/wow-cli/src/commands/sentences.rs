use std::io::{self, BufRead, Write};

use wow_core::pagination::{LoadOutcome, TabPager};
use wow_core::scroll::{InfiniteScrollTrigger, ScrollOptions};
use wow_core::services::NotebookService;
use wow_core::view::NoteView;
use wow_core::{MasteryGroup, RecordId};

use crate::cli::{SentenceCommands, Tab};
use crate::commands::common::{
    format_sentence_lines, join_title, normalize_note_identifier, resolve_note,
};
use crate::error::CliError;

pub async fn run_sentences(
    notebook: &NotebookService,
    command: SentenceCommands,
) -> Result<(), CliError> {
    match command {
        SentenceCommands::List {
            note,
            tab,
            page,
            all,
            json,
        } => run_list(notebook, &note, tab, if all { None } else { Some(page) }, json).await,
        SentenceCommands::Browse { note, tab } => run_browse(notebook, &note, tab).await,
        SentenceCommands::Add {
            note,
            title,
            description,
        } => {
            let title = join_title(&title)?;
            let note = resolve_note(notebook, &note).await?;
            let sentence = notebook.add_sentence(&note.id, &title, description).await?;
            println!("{}", sentence.id);
            Ok(())
        }
        SentenceCommands::Edit {
            id,
            title,
            description,
        } => {
            let sentence = notebook
                .edit_sentence(&sentence_id(&id)?, &title, description)
                .await?;
            println!("Updated {}", sentence.id);
            Ok(())
        }
        SentenceCommands::LevelUp { id } => {
            let sentence = notebook.level_up(&sentence_id(&id)?).await?;
            println!("{} is now {}", sentence.id, sentence.mastery_level.label());
            Ok(())
        }
        SentenceCommands::Reset { id } => {
            let sentence = notebook.reset_level(&sentence_id(&id)?).await?;
            println!("{} is now {}", sentence.id, sentence.mastery_level.label());
            Ok(())
        }
        SentenceCommands::Delete { id } => {
            let id = sentence_id(&id)?;
            notebook.delete_sentence(&id).await?;
            println!("Deleted {id}");
            Ok(())
        }
    }
}

fn sentence_id(raw: &str) -> Result<RecordId, CliError> {
    Ok(RecordId::from(normalize_note_identifier(raw)?.as_str()))
}

/// Turn a pager failure into an error; the pager already logged the cause.
pub fn ensure_loaded(outcome: LoadOutcome, group: MasteryGroup) -> Result<(), CliError> {
    if outcome == LoadOutcome::Failed {
        return Err(CliError::LoadFailed(group.to_string()));
    }
    Ok(())
}

/// Load pages `0..=last_page` of one tab, or every page when `last_page` is `None`.
pub async fn load_through(pager: &TabPager, last_page: Option<usize>) -> Result<(), CliError> {
    let group = pager.group();
    ensure_loaded(pager.load_page(0, false).await, group)?;
    let mut loaded = 0;
    while pager.has_more() && !matches!(last_page, Some(last) if loaded >= last) {
        ensure_loaded(pager.load_more().await, group)?;
        loaded += 1;
    }
    Ok(())
}

async fn run_list(
    notebook: &NotebookService,
    note: &str,
    tab: Tab,
    last_page: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    let note = resolve_note(notebook, note).await?;
    let group = MasteryGroup::from(tab);
    let view = notebook.open_view(&note.id)?;
    let pager = view.pager(group);
    load_through(pager, last_page).await?;
    let state = pager.snapshot();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&state.sentences)?);
        return Ok(());
    }

    view.refresh_counts().await;
    let total = view.counts().get(group);
    if state.sentences.is_empty() {
        println!("No {group} sentences in \"{}\".", note.title);
        return Ok(());
    }
    for line in format_sentence_lines(&state.sentences) {
        println!("{line}");
    }
    println!("Showing {} of {} {group} sentence(s)", state.sentences.len(), total);
    if state.has_more {
        println!("(more: `wow sentences list {} --tab {group} --page {}`)", note.id, state.page + 1);
    }
    Ok(())
}

/// Interactive reading: Enter scrolls the end of the list into view, which
/// loads the next page the same way an infinite-scroll sentinel would.
async fn run_browse(notebook: &NotebookService, note: &str, tab: Tab) -> Result<(), CliError> {
    let note = resolve_note(notebook, note).await?;
    let view = notebook.open_view(&note.id)?;
    view.switch_tab(tab.into());
    view.load_initial().await;

    let learning = InfiniteScrollTrigger::new(
        view.pager(MasteryGroup::Learning).clone(),
        ScrollOptions::default(),
    );
    let mastered = InfiniteScrollTrigger::new(
        view.pager(MasteryGroup::Mastered).clone(),
        ScrollOptions::default(),
    );

    let counts = view.counts();
    println!(
        "{}: {} learning, {} mastered",
        note.title, counts.learning, counts.mastered
    );
    println!("[Enter] more  [t] switch tab  [q] quit");
    print_tab(&view, 0);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        match line?.trim() {
            "q" | "quit" => break,
            "t" | "tab" => {
                let next = match view.active() {
                    MasteryGroup::Learning => MasteryGroup::Mastered,
                    MasteryGroup::Mastered => MasteryGroup::Learning,
                };
                view.switch_tab(next);
                print_tab(&view, 0);
            }
            _ => {
                let trigger = match view.active() {
                    MasteryGroup::Learning => &learning,
                    MasteryGroup::Mastered => &mastered,
                };
                let shown = view.active_state().sentences.len();
                trigger.set_enabled(view.scroll_enabled());
                trigger.observe(1.0).await;
                trigger.observe(0.0).await;
                print_tab(&view, shown);
            }
        }
    }
    Ok(())
}

fn print_tab(view: &NoteView, from: usize) {
    let group = view.active();
    let state = view.active_state();
    if state.is_empty_first_page() {
        println!("-- no {group} sentences --");
        return;
    }
    if from == 0 {
        println!("-- {group} ({}) --", view.counts().get(group));
    }
    for line in format_sentence_lines(state.sentences.get(from..).unwrap_or_default()) {
        println!("{line}");
    }
    if !state.has_more {
        println!("-- end of {group} --");
    }
}
