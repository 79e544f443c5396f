//! Briefing output: Markdown files and the static site

pub mod markdown;
pub mod site;

pub use markdown::save_briefing_markdown;
pub use site::build_site;

use crate::database::DatabaseError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing briefings or the site
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk static assets: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SiteResult<T> = Result<T, SiteError>;

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SiteError + '_ {
    move |source| SiteError::Io {
        path: path.to_path_buf(),
        source,
    }
}
