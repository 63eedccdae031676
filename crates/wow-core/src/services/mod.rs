//! Shared service layer used by front ends.

mod notebook;

pub use notebook::{NoteListing, NotebookService};
