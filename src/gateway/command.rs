use crate::options::ConversionOptions;
use crate::protocol::JobId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("FFmpeg not found or not accessible")]
    BackendUnavailable,
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },
    #[error("invalid conversion options: {message}")]
    InvalidOptions { message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed request/response boundary to the media backend.
///
/// Implementations are stateless and re-entrant-safe; each method is a
/// single round-trip that suspends until the backend answers. Picker
/// methods return `Ok(None)` when the user cancels, which is not an error.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn pick_input_file(&self) -> Result<Option<PathBuf>, CommandError>;

    async fn pick_output_directory(&self) -> Result<Option<PathBuf>, CommandError>;

    /// Probes for the encoder. Absence of the backend surfaces as `false`,
    /// never as an error.
    async fn check_backend_available(&self) -> bool;

    /// Asks the backend to accept a job. Returns once the job is accepted;
    /// completion is observed later through the event gateway. An accepted
    /// job emits zero or more progress events tagged with `job`, then
    /// exactly one terminal event.
    async fn start_conversion(
        &self,
        job: JobId,
        input: &Path,
        output_dir: &Path,
        options: &ConversionOptions,
    ) -> Result<(), CommandError>;
}
