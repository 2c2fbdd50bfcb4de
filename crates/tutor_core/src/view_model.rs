use crate::{JobId, JobStatus, Quality, Role};

/// Read-only snapshot of the conversation handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub messages: Vec<MessageView>,
    pub input: String,
    pub quality: Quality,
    pub awaiting_reply: bool,
    pub active_jobs: usize,
    /// Incremented once per committed change.
    pub revision: u64,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub role: Role,
    pub content: String,
    pub follow_ups: Vec<String>,
    pub animations: Vec<AnimationView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationView {
    pub job_id: JobId,
    pub title: Option<String>,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    /// Status could not be queried for too long; no longer polled.
    pub stale: bool,
    pub regenerating: bool,
    pub can_regenerate: bool,
}

impl AppViewModel {
    pub fn animations(&self) -> impl Iterator<Item = &AnimationView> {
        self.messages
            .iter()
            .flat_map(|message| message.animations.iter())
    }

    pub fn animation(&self, job_id: &str) -> Option<&AnimationView> {
        self.animations().find(|animation| animation.job_id == job_id)
    }
}
