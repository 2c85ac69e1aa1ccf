//! Error types for pare.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::filter::FilterError;
use crate::output::OutputError;
use crate::walker::WalkError;

/// Top-level error type for pare operations.
#[derive(Debug, thiserror::Error)]
pub enum PareError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("no files to pack in {0}")]
    NoFilesFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Map an error to its exit code.
pub fn exit_code(error: &PareError) -> i32 {
    match error {
        PareError::PathNotFound(_) => 3,
        PareError::PermissionDenied(_) => 4,
        PareError::NoFilesFound(_) => 5,
        PareError::Io(_) => 1,
        PareError::Config(_) => 2,
        PareError::Walk(_) => 2,
        PareError::Filter(_) => 2,
        PareError::Output(_) => 1,
    }
}
