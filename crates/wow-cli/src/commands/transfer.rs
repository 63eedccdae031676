use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use wow_core::services::NotebookService;
use wow_core::transfer::{render_document, suggested_export_file_name};

use crate::commands::common::resolve_note;
use crate::error::CliError;

pub fn run_import(notebook: &NotebookService, path: &Path) -> Result<(), CliError> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().lock().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };

    let summary = notebook.import(&raw)?;
    println!(
        "Imported {} sentence(s) into guest note \"{}\" ({})",
        summary.sentences, summary.note.title, summary.note.id
    );
    Ok(())
}

/// Write a guest note's sentences to `output`, the dated default file, or stdout.
pub async fn run_export(
    notebook: &NotebookService,
    note: &str,
    output: Option<&Path>,
    to_stdout: bool,
) -> Result<(), CliError> {
    let note = resolve_note(notebook, note).await?;
    let document = notebook.export(&note.id)?;
    let rendered = render_document(&document)?;

    if to_stdout {
        println!("{rendered}");
        return Ok(());
    }

    let path = output.map_or_else(
        || PathBuf::from(suggested_export_file_name(Utc::now().date_naive())),
        Path::to_path_buf,
    );
    std::fs::write(&path, rendered)?;
    println!(
        "Exported {} sentence(s) to {}",
        document.sentences.len(),
        path.display()
    );
    Ok(())
}
