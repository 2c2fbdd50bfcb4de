use crate::{HistoryEntry, JobId, PollTarget, Quality};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RequestReply {
        message: String,
        history: Vec<HistoryEntry>,
        quality: Quality,
    },
    PollJobs {
        targets: Vec<PollTarget>,
    },
    SubmitRender {
        job_id: JobId,
        generation: u32,
        request: RenderRequest,
    },
    StopPolling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub scene_spec: String,
    pub duration: u32,
    pub quality: Quality,
}
