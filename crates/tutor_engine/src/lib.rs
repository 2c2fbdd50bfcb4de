//! Tutor engine: remote service client and effect execution.
mod client;
mod decode;
mod engine;
mod types;

pub use client::{JobService, ReplyService, ReqwestTutorClient, ServiceSettings, DEFAULT_BASE_URL};
pub use decode::{decode_chat_reply, decode_status, decode_submission, resolve_location};
pub use engine::{EngineHandle, EngineSettings};
pub use types::{
    ChatReply, ChatRequest, EngineEvent, FailureKind, HistoryEntry, JobId, PollRequest, PolledJob,
    Quality, RenderRequest, RenderStatus, ReplyAnimation, Role, ServiceError, StatusReport,
};
