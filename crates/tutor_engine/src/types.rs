use std::fmt;

use serde::Serialize;

pub type JobId = String;

/// Job status as reported by the render service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Queued,
    Rendering,
    Completed,
    Failed,
}

impl RenderStatus {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(RenderStatus::Queued),
            "rendering" => Some(RenderStatus::Rendering),
            "completed" => Some(RenderStatus::Completed),
            "failed" => Some(RenderStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Validated answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: RenderStatus,
    /// Absolute result location, resolved against the service base address.
    pub video_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRequest {
    pub scene_spec: String,
    pub duration: u32,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "conversation_history")]
    pub history: Vec<HistoryEntry>,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub animations: Vec<ReplyAnimation>,
    pub questions: Vec<String>,
}

/// A render job minted by the reply endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAnimation {
    pub id: JobId,
    pub title: Option<String>,
    pub status: RenderStatus,
    pub scene_spec: Option<String>,
    pub duration: Option<u32>,
}

/// Identifies a status query by the job id and the slot generation it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub job_id: JobId,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledJob {
    pub job_id: JobId,
    pub generation: u32,
    pub result: Result<StatusReport, ServiceError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The poll timer fired.
    PollDue,
    ReplyCompleted {
        result: Result<ChatReply, ServiceError>,
    },
    /// Every query of one poll batch has returned.
    PollCompleted { results: Vec<PolledJob> },
    RenderSubmitted {
        job_id: JobId,
        generation: u32,
        result: Result<JobId, ServiceError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedPayload, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    NotFound,
    MalformedPayload,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::NotFound => write!(f, "job not found"),
            FailureKind::MalformedPayload => write!(f, "malformed payload"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}
