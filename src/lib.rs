//! Configuration core for tracker enrollment layouts and form-field plugins.
//!
//! Layouts and form-field records live as JSON documents in the platform's
//! key-value data store. Every edit reconciles the stored record against
//! fresh metadata and the installed plugin catalog, and every save is a
//! read-merge-write that touches only the edited context's entry.

pub(crate) mod app_logger;
pub mod cli;
pub mod config;
pub mod datastore;
pub mod dhis2;
pub mod editor;
pub mod edits;
pub mod error;
pub mod error_classification;
pub mod form_fields;
pub mod layout;
pub mod metadata;
pub mod moves;
pub mod overview;
pub mod provisioning;
pub mod registry;
pub mod repository;
pub mod session;

pub use error::{ConfigError, Result};

/// Parse the command line and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    cli::execute(cli).await
}
