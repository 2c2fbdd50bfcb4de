use tutor_logging::{tutor_debug, tutor_warn};

use crate::{AppState, Effect, Msg, PollOutcome, PollResult, RenderRequest};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    // A closed view is read-only; late results from abandoned calls land here.
    if state.is_closed() {
        tutor_debug!("Dropping {:?} after view teardown", msg);
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::QualitySelected(quality) => {
            if state.set_quality(quality) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::MessageSubmitted => submit_message(&mut state),
        Msg::ReplyReceived {
            content,
            follow_ups,
            animations,
        } => {
            if !state.awaiting_reply() {
                tutor_warn!("Ignoring reply with no outstanding submission");
                return (state, Vec::new());
            }
            state.set_awaiting_reply(false);
            let skipped = state.push_assistant_reply(content, follow_ups, animations);
            for job_id in skipped {
                tutor_warn!("Reply announced already tracked job id={}", job_id);
            }
            Vec::new()
        }
        Msg::ReplyFailed { reason } => {
            if !state.awaiting_reply() {
                return (state, Vec::new());
            }
            tutor_warn!("Reply request failed: {}", reason);
            state.set_awaiting_reply(false);
            state.push_assistant_reply(
                crate::CONNECTION_FAILURE_REPLY.to_string(),
                Vec::new(),
                Vec::new(),
            );
            Vec::new()
        }
        Msg::PollTick => match state.begin_poll_round() {
            Some(targets) => vec![Effect::PollJobs { targets }],
            None => Vec::new(),
        },
        Msg::PollCompleted { results } => {
            state.finish_poll_round();
            if apply_poll_results(&mut state, results) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::RegenerateClicked { job_id } => match state.begin_regenerate(&job_id) {
            Some((generation, scene_spec, duration)) => {
                state.mark_dirty();
                vec![Effect::SubmitRender {
                    job_id,
                    generation,
                    request: RenderRequest {
                        scene_spec,
                        duration,
                        quality: state.quality(),
                    },
                }]
            }
            None => {
                tutor_debug!("Regenerate rejected for job id={}", job_id);
                Vec::new()
            }
        },
        Msg::RegenerateAccepted {
            job_id,
            generation,
            new_id,
        } => {
            if state.find_job(&new_id).is_some() {
                tutor_warn!(
                    "Regenerate of job id={} returned already tracked id={}",
                    job_id,
                    new_id
                );
                if state.fail_regenerate(&job_id, generation, "duplicate job id") {
                    state.mark_dirty();
                }
            } else if state.complete_regenerate(&job_id, generation, new_id) {
                state.mark_dirty();
            } else {
                tutor_debug!("Dropping stale regenerate result for job id={}", job_id);
            }
            Vec::new()
        }
        Msg::RegenerateFailed {
            job_id,
            generation,
            reason,
        } => {
            tutor_warn!("Regenerate of job id={} failed: {}", job_id, reason);
            if state.fail_regenerate(&job_id, generation, &reason) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ViewClosed => {
            state.close();
            vec![Effect::StopPolling]
        }
    };

    (state, effects)
}

fn submit_message(state: &mut AppState) -> Vec<Effect> {
    if state.awaiting_reply() {
        tutor_debug!("Submission rejected: a reply is still outstanding");
        return Vec::new();
    }
    let text = state.take_input();
    let message = text.trim().to_string();
    if message.is_empty() {
        state.set_input(text);
        return Vec::new();
    }

    let history = state.history();
    state.push_user_message(message.clone());
    state.set_awaiting_reply(true);
    vec![Effect::RequestReply {
        message,
        history,
        quality: state.quality(),
    }]
}

/// Applies a poll batch; returns whether any visible field changed.
fn apply_poll_results(state: &mut AppState, results: Vec<PollResult>) -> bool {
    let mut changed = false;
    for result in results {
        match result.outcome {
            PollOutcome::Observed(observation) => {
                match state.apply_observation(&result.job_id, result.generation, observation) {
                    Some(job_changed) => changed |= job_changed,
                    None => tutor_debug!("Dropping stale status for job id={}", result.job_id),
                }
            }
            PollOutcome::QueryFailed { reason } => {
                match state.apply_query_failure(&result.job_id, result.generation) {
                    Some(true) => {
                        tutor_warn!(
                            "Status of job id={} unknown after repeated failures: {}",
                            result.job_id,
                            reason
                        );
                        changed = true;
                    }
                    Some(false) => {}
                    None => tutor_debug!("Dropping stale failure for job id={}", result.job_id),
                }
            }
        }
    }
    changed
}
