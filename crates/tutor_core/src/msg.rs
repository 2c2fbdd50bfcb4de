use crate::{JobId, NewAnimation, Quality, StatusObservation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the message input.
    InputChanged(String),
    /// User switched the render quality selector.
    QualitySelected(Quality),
    /// User submitted the current input as a chat message.
    MessageSubmitted,
    /// Reply endpoint answered the outstanding submission.
    ReplyReceived {
        content: String,
        follow_ups: Vec<String>,
        animations: Vec<NewAnimation>,
    },
    /// Reply endpoint could not be reached or returned garbage.
    ReplyFailed { reason: String },
    /// Poll timer fired.
    PollTick,
    /// All status queries of one poll round have returned.
    PollCompleted { results: Vec<PollResult> },
    /// User asked to render a finished or failed job again.
    RegenerateClicked { job_id: JobId },
    /// Render submission for a regenerate was accepted under a new id.
    RegenerateAccepted {
        job_id: JobId,
        generation: u32,
        new_id: JobId,
    },
    /// Render submission for a regenerate was not accepted.
    RegenerateFailed {
        job_id: JobId,
        generation: u32,
        reason: String,
    },
    /// Conversation view is being torn down.
    ViewClosed,
}

/// Outcome of one status query, addressed by the id and generation it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub job_id: JobId,
    pub generation: u32,
    pub outcome: PollOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Observed(StatusObservation),
    QueryFailed { reason: String },
}
