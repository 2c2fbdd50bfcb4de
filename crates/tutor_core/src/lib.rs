//! Tutor core: pure conversation state machine, animation job lifecycle and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, RenderRequest};
pub use msg::{Msg, PollOutcome, PollResult};
pub use state::{
    AppState, HistoryEntry, JobId, JobStatus, NewAnimation, PollPolicy, PollTarget, Quality, Role,
    StatusObservation, CONNECTION_FAILURE_REPLY, DEFAULT_DURATION_SECS, DEFAULT_GREETING,
    UNSPECIFIED_RENDER_FAILURE,
};
pub use update::update;
pub use view_model::{AnimationView, AppViewModel, MessageView};
