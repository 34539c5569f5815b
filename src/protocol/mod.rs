//! Typed wire contract shared by the UI-facing gateways and the backend.
//!
//! Command and event channel names are closed enums rather than free-form
//! strings, so a typo cannot silently produce a dead subscription.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier the session assigns to each started job. Events carry the id
/// of the job that produced them; the session discards everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    PickVideoFile,
    PickOutputDirectory,
    CheckFfmpeg,
    StartConversion,
}

impl CommandKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandKind::PickVideoFile => "pick_video_file",
            CommandKind::PickOutputDirectory => "pick_output_directory",
            CommandKind::CheckFfmpeg => "check_ffmpeg",
            CommandKind::StartConversion => "start_conversion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    Progress,
    Complete,
    Error,
}

impl EventChannel {
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventChannel::Progress => "conversion://progress",
            EventChannel::Complete => "conversion://complete",
            EventChannel::Error => "conversion://error",
        }
    }
}

/// Payload of a progress event, exactly as emitted on `conversion://progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub percentage: f64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionEvent {
    Progress(ProgressPayload),
    Completed { output_path: PathBuf },
    Failed { error: String },
}

impl ConversionEvent {
    pub fn channel(&self) -> EventChannel {
        match self {
            ConversionEvent::Progress(_) => EventChannel::Progress,
            ConversionEvent::Completed { .. } => EventChannel::Complete,
            ConversionEvent::Failed { .. } => EventChannel::Error,
        }
    }
}

/// A job-tagged event as delivered by the event gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub job: JobId,
    pub event: ConversionEvent,
}

impl EventEnvelope {
    pub fn progress(job: JobId, percentage: f64, status: &str, message: &str) -> Self {
        Self {
            job,
            event: ConversionEvent::Progress(ProgressPayload {
                percentage,
                status: status.to_string(),
                message: message.to_string(),
            }),
        }
    }

    pub fn completed(job: JobId, output_path: PathBuf) -> Self {
        Self {
            job,
            event: ConversionEvent::Completed { output_path },
        }
    }

    pub fn failed(job: JobId, error: impl Into<String>) -> Self {
        Self {
            job,
            event: ConversionEvent::Failed {
                error: error.into(),
            },
        }
    }
}
