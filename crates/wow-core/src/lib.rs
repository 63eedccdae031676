//! wow-core - Core library for Words of Wisdom
//!
//! This crate contains the shared models, guest and online record stores,
//! tab pagination, guest migration, and auth used by the `wow` CLI.

pub mod auth;
pub mod config;
pub mod error;
pub mod local;
pub mod migration;
pub mod models;
pub mod pagination;
pub mod remote;
pub mod scroll;
pub mod services;
pub mod store;
pub mod transfer;
pub mod util;
pub mod view;

pub use error::{Error, Result};
pub use models::{MasteryGroup, MasteryLevel, Note, RecordId, Sentence};
