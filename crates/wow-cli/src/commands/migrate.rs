use wow_core::services::NotebookService;

use crate::error::CliError;

pub async fn run_migrate(notebook: &NotebookService) -> Result<(), CliError> {
    if notebook.remote().is_none() {
        return Err(CliError::BackendNotConfigured);
    }
    if !notebook.is_signed_in() {
        return Err(CliError::NotSignedIn);
    }

    let report = notebook.migrate().await?;
    if report.is_empty() {
        println!("No guest notes to migrate.");
        return Ok(());
    }

    for migrated in &report.notes {
        println!(
            "{} -> {}  \"{}\" ({} sentence(s))",
            migrated.local_id, migrated.remote.id, migrated.remote.title, migrated.sentences
        );
    }
    println!(
        "Migrated {} note(s) and {} sentence(s); guest data cleared.",
        report.notes.len(),
        report.sentence_count()
    );
    if let Some(listing) = &report.listing {
        println!("You now have {} note(s) online.", listing.total);
    }
    Ok(())
}
