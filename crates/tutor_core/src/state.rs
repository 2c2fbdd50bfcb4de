use crate::view_model::{AnimationView, AppViewModel, MessageView};

/// Opaque identifier assigned by the remote job service.
pub type JobId = String;

/// Render length used when a job carries no duration of its own.
pub const DEFAULT_DURATION_SECS: u32 = 15;

/// Opening assistant message of a fresh conversation.
pub const DEFAULT_GREETING: &str = "Hello! I'm your Math Tutor. Ask me to explain a concept!";

/// Assistant message substituted when the reply endpoint cannot be reached.
pub const CONNECTION_FAILURE_REPLY: &str =
    "Sorry, I encountered an error connecting to the tutor backend.";

/// Error text recorded when the service reports `failed` without a reason.
pub const UNSPECIFIED_RENDER_FAILURE: &str = "render failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Low,
    High,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Rendering,
    Completed,
    Failed,
}

impl JobStatus {
    /// Active jobs are eligible for polling.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Rendering)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Rendering => "rendering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Retry schedule for status queries that fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Upper bound on the number of rounds skipped between two attempts.
    pub max_backoff_rounds: u64,
    /// Consecutive failures after which a job is reported as status unknown.
    pub stale_after_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_backoff_rounds: 16,
            stale_after_failures: 10,
        }
    }
}

impl PollPolicy {
    /// Rounds to wait before the next attempt after `failures` consecutive failures.
    pub fn backoff_rounds(&self, failures: u32) -> u64 {
        if failures == 0 {
            return 1;
        }
        let exp = failures.saturating_sub(1).min(63);
        (1u64 << exp).min(self.max_backoff_rounds.max(1))
    }
}

/// An animation announced by an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnimation {
    pub id: JobId,
    pub title: Option<String>,
    pub status: JobStatus,
    pub scene_spec: Option<String>,
    pub duration: Option<u32>,
}

/// Status payload returned by a successful status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusObservation {
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Fields restored when a regenerate submission is not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TerminalCheckpoint {
    status: JobStatus,
    video_url: Option<String>,
    error: Option<String>,
    stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnimationJob {
    pub(crate) id: JobId,
    pub(crate) generation: u32,
    title: Option<String>,
    pub(crate) status: JobStatus,
    video_url: Option<String>,
    error: Option<String>,
    pub(crate) scene_spec: Option<String>,
    pub(crate) duration: Option<u32>,
    notice: Option<String>,
    stale: bool,
    consecutive_failures: u32,
    next_poll_round: u64,
    pending_regenerate: Option<TerminalCheckpoint>,
}

impl AnimationJob {
    fn from_reply(animation: NewAnimation, round: u64) -> Self {
        Self {
            id: animation.id,
            generation: 0,
            title: animation.title,
            status: animation.status,
            video_url: None,
            error: None,
            scene_spec: animation.scene_spec,
            duration: animation.duration,
            notice: None,
            stale: false,
            consecutive_failures: 0,
            next_poll_round: round + 1,
            pending_regenerate: None,
        }
    }

    pub(crate) fn is_poll_eligible(&self, round: u64) -> bool {
        self.status.is_active()
            && !self.stale
            && self.pending_regenerate.is_none()
            && self.next_poll_round <= round
    }

    pub(crate) fn can_regenerate(&self) -> bool {
        (self.status.is_terminal() || self.stale)
            && self.pending_regenerate.is_none()
            && self
                .scene_spec
                .as_deref()
                .is_some_and(|spec| !spec.trim().is_empty())
    }

    /// Applies an observation; returns whether any visible field changed.
    fn observe(&mut self, observation: StatusObservation, round: u64) -> bool {
        self.consecutive_failures = 0;
        self.next_poll_round = round + 1;

        let (video_url, error) = match observation.status {
            JobStatus::Queued | JobStatus::Rendering => (None, None),
            JobStatus::Completed => (observation.video_url, None),
            JobStatus::Failed => (
                None,
                Some(
                    observation
                        .error
                        .unwrap_or_else(|| UNSPECIFIED_RENDER_FAILURE.to_string()),
                ),
            ),
        };

        if self.status == observation.status && self.video_url == video_url && self.error == error
        {
            return false;
        }
        self.status = observation.status;
        self.video_url = video_url;
        self.error = error;
        self.notice = None;
        true
    }

    /// Records a failed status query; returns whether the job just became stale.
    fn record_query_failure(&mut self, policy: &PollPolicy, round: u64) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= policy.stale_after_failures {
            self.stale = true;
            return true;
        }
        self.next_poll_round = round + policy.backoff_rounds(self.consecutive_failures);
        false
    }

    fn reset_for_regenerate(&mut self) {
        self.pending_regenerate = Some(TerminalCheckpoint {
            status: self.status,
            video_url: self.video_url.take(),
            error: self.error.take(),
            stale: self.stale,
        });
        self.status = JobStatus::Queued;
        self.notice = None;
        self.stale = false;
        self.consecutive_failures = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    fn assign_new_identity(&mut self, new_id: JobId, round: u64) {
        self.id = new_id;
        self.pending_regenerate = None;
        self.next_poll_round = round + 1;
    }

    fn revert_regenerate(&mut self, reason: &str) {
        if let Some(checkpoint) = self.pending_regenerate.take() {
            self.status = checkpoint.status;
            self.video_url = checkpoint.video_url;
            self.error = checkpoint.error;
            self.stale = checkpoint.stale;
        }
        self.notice = Some(format!("Regenerate failed: {reason}"));
    }

    fn view(&self) -> AnimationView {
        AnimationView {
            job_id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            video_url: self.video_url.clone(),
            error: self.error.clone(),
            notice: self.notice.clone(),
            stale: self.stale,
            regenerating: self.pending_regenerate.is_some(),
            can_regenerate: self.can_regenerate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub(crate) role: Role,
    pub(crate) content: String,
    follow_ups: Vec<String>,
    pub(crate) animations: Vec<AnimationJob>,
}

/// A poll target: the job id plus the generation it was scanned under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub job_id: JobId,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    messages: Vec<Message>,
    input: String,
    quality: Quality,
    awaiting_reply: bool,
    poll_in_flight: bool,
    poll_round: u64,
    policy: PollPolicy,
    closed: bool,
    revision: u64,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation that opens with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.push_message(Role::Assistant, greeting.into(), Vec::new(), Vec::new());
        state.dirty = false;
        state
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            messages: self
                .messages
                .iter()
                .map(|message| MessageView {
                    role: message.role,
                    content: message.content.clone(),
                    follow_ups: message.follow_ups.clone(),
                    animations: message.animations.iter().map(AnimationJob::view).collect(),
                })
                .collect(),
            input: self.input.clone(),
            quality: self.quality,
            awaiting_reply: self.awaiting_reply,
            active_jobs: self.jobs().filter(|job| job.status.is_active()).count(),
            revision: self.revision,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything was committed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn poll_in_flight(&self) -> bool {
        self.poll_in_flight
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.poll_in_flight = false;
    }

    pub(crate) fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub(crate) fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    pub(crate) fn set_quality(&mut self, quality: Quality) -> bool {
        std::mem::replace(&mut self.quality, quality) != quality
    }

    pub(crate) fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub(crate) fn set_awaiting_reply(&mut self, awaiting: bool) {
        self.awaiting_reply = awaiting;
    }

    pub(crate) fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|message| HistoryEntry {
                role: message.role,
                content: message.content.clone(),
            })
            .collect()
    }

    pub(crate) fn push_user_message(&mut self, content: String) {
        self.push_message(Role::User, content, Vec::new(), Vec::new());
    }

    /// Appends an assistant reply; returns the ids of animations that were
    /// skipped because their id is already tracked.
    pub(crate) fn push_assistant_reply(
        &mut self,
        content: String,
        follow_ups: Vec<String>,
        animations: Vec<NewAnimation>,
    ) -> Vec<JobId> {
        let mut skipped = Vec::new();
        let mut jobs: Vec<AnimationJob> = Vec::with_capacity(animations.len());
        for animation in animations {
            let duplicate = self.find_job(&animation.id).is_some()
                || jobs.iter().any(|job| job.id == animation.id);
            if duplicate {
                skipped.push(animation.id);
                continue;
            }
            jobs.push(AnimationJob::from_reply(animation, self.poll_round));
        }
        self.push_message(Role::Assistant, content, follow_ups, jobs);
        skipped
    }

    fn push_message(
        &mut self,
        role: Role,
        content: String,
        follow_ups: Vec<String>,
        animations: Vec<AnimationJob>,
    ) {
        self.messages.push(Message {
            role,
            content,
            follow_ups,
            animations,
        });
        self.mark_dirty();
    }

    fn jobs(&self) -> impl Iterator<Item = &AnimationJob> {
        self.messages
            .iter()
            .flat_map(|message| message.animations.iter())
    }

    pub(crate) fn find_job(&self, job_id: &str) -> Option<&AnimationJob> {
        self.jobs().find(|job| job.id == job_id)
    }

    fn find_job_mut(&mut self, job_id: &str) -> Option<&mut AnimationJob> {
        self.messages
            .iter_mut()
            .flat_map(|message| message.animations.iter_mut())
            .find(|job| job.id == job_id)
    }

    /// Resolves a job by id and generation; `None` once it was regenerated or replaced.
    fn find_slot_mut(&mut self, job_id: &str, generation: u32) -> Option<&mut AnimationJob> {
        self.find_job_mut(job_id)
            .filter(|job| job.generation == generation)
    }

    /// Starts a poll round. Returns `None` when a batch is still outstanding
    /// or no job is due this round.
    pub(crate) fn begin_poll_round(&mut self) -> Option<Vec<PollTarget>> {
        if self.poll_in_flight {
            return None;
        }
        self.poll_round += 1;
        let round = self.poll_round;
        let targets: Vec<PollTarget> = self
            .jobs()
            .filter(|job| job.is_poll_eligible(round))
            .map(|job| PollTarget {
                job_id: job.id.clone(),
                generation: job.generation,
            })
            .collect();
        if targets.is_empty() {
            return None;
        }
        self.poll_in_flight = true;
        Some(targets)
    }

    pub(crate) fn finish_poll_round(&mut self) {
        self.poll_in_flight = false;
    }

    /// Applies one observation. Returns `None` when the slot no longer exists.
    pub(crate) fn apply_observation(
        &mut self,
        job_id: &str,
        generation: u32,
        observation: StatusObservation,
    ) -> Option<bool> {
        let round = self.poll_round;
        let job = self.find_slot_mut(job_id, generation)?;
        if job.pending_regenerate.is_some() {
            return None;
        }
        Some(job.observe(observation, round))
    }

    /// Records a query failure. Returns `None` when the slot no longer exists,
    /// otherwise whether the job just became stale.
    pub(crate) fn apply_query_failure(&mut self, job_id: &str, generation: u32) -> Option<bool> {
        let round = self.poll_round;
        let policy = self.policy;
        let job = self.find_slot_mut(job_id, generation)?;
        if job.pending_regenerate.is_some() {
            return None;
        }
        Some(job.record_query_failure(&policy, round))
    }

    /// Resets a terminal job for regeneration; returns its new generation and
    /// the parameters to resubmit.
    pub(crate) fn begin_regenerate(&mut self, job_id: &str) -> Option<(u32, String, u32)> {
        let job = self.find_job_mut(job_id)?;
        if !job.can_regenerate() {
            return None;
        }
        let scene_spec = job.scene_spec.clone()?;
        let duration = job.duration.unwrap_or(DEFAULT_DURATION_SECS);
        job.reset_for_regenerate();
        Some((job.generation, scene_spec, duration))
    }

    /// Swaps in the identity returned by the service. Returns `false` when the
    /// slot is gone or no longer waiting for this submission.
    pub(crate) fn complete_regenerate(
        &mut self,
        old_id: &str,
        generation: u32,
        new_id: JobId,
    ) -> bool {
        let round = self.poll_round;
        match self.find_slot_mut(old_id, generation) {
            Some(job) if job.pending_regenerate.is_some() => {
                job.assign_new_identity(new_id, round);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn fail_regenerate(&mut self, job_id: &str, generation: u32, reason: &str) -> bool {
        match self.find_slot_mut(job_id, generation) {
            Some(job) if job.pending_regenerate.is_some() => {
                job.revert_regenerate(reason);
                true
            }
            _ => false,
        }
    }
}
