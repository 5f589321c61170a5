//! Local persistence.
//!
//! The only persisted state is the meeting mapping: a single JSON document
//! tying Zoom meetings to their Discourse topic, source issue and uploaded
//! recording. It is read and written wholesale.

mod mapping;

pub use mapping::{MeetingMapping, MeetingRecord};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
