pub mod auth_cmd;
pub mod common;
pub mod config;
pub mod migrate;
pub mod notes;
pub mod sentences;
pub mod transfer;
