use std::sync::Once;

use pretty_assertions::assert_eq;
use tutor_core::{
    update, AppState, Effect, JobStatus, Msg, NewAnimation, PollOutcome, PollResult, PollTarget,
    Quality, RenderRequest, StatusObservation, DEFAULT_DURATION_SECS,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tutor_logging::initialize_for_tests);
}

fn state_with_job(id: &str, scene_spec: Option<&str>, duration: Option<u32>) -> AppState {
    let (state, _) = update(AppState::new(), Msg::InputChanged("animate".to_string()));
    let (state, _) = update(state, Msg::MessageSubmitted);
    let (state, _) = update(
        state,
        Msg::ReplyReceived {
            content: "reply".to_string(),
            follow_ups: Vec::new(),
            animations: vec![NewAnimation {
                id: id.to_string(),
                title: Some("Tangent line".to_string()),
                status: JobStatus::Queued,
                scene_spec: scene_spec.map(str::to_string),
                duration,
            }],
        },
    );
    state
}

fn poll_once(state: AppState, observation: StatusObservation) -> AppState {
    let (state, effects) = update(state, Msg::PollTick);
    let targets = match effects.as_slice() {
        [Effect::PollJobs { targets }] => targets.clone(),
        other => panic!("unexpected effects: {other:?}"),
    };
    let results = targets
        .iter()
        .map(|target| PollResult {
            job_id: target.job_id.clone(),
            generation: target.generation,
            outcome: PollOutcome::Observed(observation.clone()),
        })
        .collect();
    let (state, _) = update(state, Msg::PollCompleted { results });
    state
}

fn failed(error: &str) -> StatusObservation {
    StatusObservation {
        status: JobStatus::Failed,
        video_url: None,
        error: Some(error.to_string()),
    }
}

fn completed(url: &str) -> StatusObservation {
    StatusObservation {
        status: JobStatus::Completed,
        video_url: Some(url.to_string()),
        error: None,
    }
}

fn regenerate(state: AppState, job_id: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::RegenerateClicked {
            job_id: job_id.to_string(),
        },
    )
}

#[test]
fn regenerate_failed_job_swaps_identity_in_place() {
    init_logging();
    let state = poll_once(
        state_with_job("B1", Some("draw sine"), Some(20)),
        failed("render timeout"),
    );
    assert_eq!(state.view().animation("B1").unwrap().status, JobStatus::Failed);

    let (mut state, effects) = regenerate(state, "B1");
    assert!(state.consume_dirty());
    assert_eq!(
        effects,
        vec![Effect::SubmitRender {
            job_id: "B1".to_string(),
            generation: 1,
            request: RenderRequest {
                scene_spec: "draw sine".to_string(),
                duration: 20,
                quality: Quality::Low,
            },
        }]
    );
    let view = state.view();
    let job = view.animation("B1").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.error, None);
    assert_eq!(job.video_url, None);
    assert!(job.regenerating);
    assert!(!job.can_regenerate);

    let (state, _) = update(
        state,
        Msg::RegenerateAccepted {
            job_id: "B1".to_string(),
            generation: 1,
            new_id: "B2".to_string(),
        },
    );
    let view = state.view();
    assert!(view.animation("B1").is_none());
    let job = view.animation("B2").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.title.as_deref(), Some("Tangent line"));
    assert!(!job.regenerating);
    assert_eq!(view.messages[1].animations.len(), 1);

    let (_state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::PollJobs {
            targets: vec![PollTarget {
                job_id: "B2".to_string(),
                generation: 1,
            }],
        }]
    );
}

#[test]
fn regenerate_completed_job_clears_video_and_uses_default_duration() {
    init_logging();
    let state = poll_once(
        state_with_job("C1", Some("draw circle"), None),
        completed("http://localhost:8000/static/c1.mp4"),
    );
    let (state, _) = update(state, Msg::QualitySelected(Quality::High));

    let (state, effects) = regenerate(state, "C1");
    match effects.as_slice() {
        [Effect::SubmitRender { request, .. }] => {
            assert_eq!(request.duration, DEFAULT_DURATION_SECS);
            assert_eq!(request.quality, Quality::High);
        }
        other => panic!("unexpected effects: {other:?}"),
    }
    let view = state.view();
    let job = view.animation("C1").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.video_url, None);
    assert_eq!(job.error, None);
}

#[test]
fn regenerate_is_rejected_for_active_or_specless_jobs() {
    init_logging();
    let state = state_with_job("D1", Some("spec"), None);
    let (state, effects) = regenerate(state, "D1");
    assert!(effects.is_empty());

    let state = poll_once(state, failed("x"));
    let (state, effects) = regenerate(state, "unknown");
    assert!(effects.is_empty());

    let (state, effects) = regenerate(state, "D1");
    assert_eq!(effects.len(), 1);
    // A second click while the first submission is outstanding does nothing.
    let (_state, effects) = regenerate(state, "D1");
    assert!(effects.is_empty());

    let state = poll_once(state_with_job("E1", Some("   "), None), failed("x"));
    let view = state.view();
    assert!(!view.animation("E1").unwrap().can_regenerate);
    let (_state, effects) = regenerate(state, "E1");
    assert!(effects.is_empty());

    let state = poll_once(state_with_job("F1", None, None), failed("x"));
    let (_state, effects) = regenerate(state, "F1");
    assert!(effects.is_empty());
}

#[test]
fn pending_regenerate_job_is_not_polled_under_old_id() {
    init_logging();
    let state = poll_once(state_with_job("B1", Some("spec"), None), failed("render timeout"));
    let (state, _) = regenerate(state, "B1");

    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
    assert!(!state.poll_in_flight());
}

#[test]
fn stale_poll_result_does_not_overwrite_reset_job() {
    init_logging();
    let state = state_with_job("B1", Some("spec"), None);
    // Poll issued while the job is still active under generation 0.
    let (state, effects) = update(state, Msg::PollTick);
    let stale_target = match effects.as_slice() {
        [Effect::PollJobs { targets }] => targets[0].clone(),
        other => panic!("unexpected effects: {other:?}"),
    };
    // The render fails and is observed.
    let (state, _) = update(
        state,
        Msg::PollCompleted {
            results: vec![PollResult {
                job_id: stale_target.job_id.clone(),
                generation: stale_target.generation,
                outcome: PollOutcome::Observed(failed("render timeout")),
            }],
        },
    );
    let (state, _) = regenerate(state, "B1");

    // The old generation's late answer arrives after the reset.
    let (mut state, _) = update(
        state,
        Msg::PollCompleted {
            results: vec![PollResult {
                job_id: "B1".to_string(),
                generation: stale_target.generation,
                outcome: PollOutcome::Observed(failed("render timeout")),
            }],
        },
    );
    state.consume_dirty();
    let view = state.view();
    let job = view.animation("B1").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.error, None);
    assert!(job.regenerating);
}

#[test]
fn late_result_for_replaced_id_does_not_touch_new_job() {
    init_logging();
    let state = poll_once(state_with_job("B1", Some("spec"), None), failed("render timeout"));
    let (state, _) = regenerate(state, "B1");
    let (state, _) = update(
        state,
        Msg::RegenerateAccepted {
            job_id: "B1".to_string(),
            generation: 1,
            new_id: "B2".to_string(),
        },
    );
    let (mut state, _) = update(state, Msg::PollTick);
    state.consume_dirty();

    let (mut state, effects) = update(
        state,
        Msg::PollCompleted {
            results: vec![PollResult {
                job_id: "B1".to_string(),
                generation: 1,
                outcome: PollOutcome::Observed(failed("render timeout")),
            }],
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    let view = state.view();
    let job = view.animation("B2").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.error, None);

    let state = poll_once(state, completed("http://localhost:8000/static/b2.mp4"));
    let view = state.view();
    let job = view.animation("B2").unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.video_url.as_deref(), Some("http://localhost:8000/static/b2.mp4"));
}

#[test]
fn regenerate_failure_restores_previous_outcome_with_notice() {
    init_logging();
    let state = poll_once(
        state_with_job("G1", Some("spec"), None),
        completed("http://localhost:8000/static/g1.mp4"),
    );
    let (state, _) = regenerate(state, "G1");
    let (mut state, effects) = update(
        state,
        Msg::RegenerateFailed {
            job_id: "G1".to_string(),
            generation: 1,
            reason: "http status 500".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    let view = state.view();
    let job = view.animation("G1").unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.video_url.as_deref(), Some("http://localhost:8000/static/g1.mp4"));
    assert_eq!(job.error, None);
    assert_eq!(job.notice.as_deref(), Some("Regenerate failed: http status 500"));
    assert!(!job.regenerating);
    assert!(job.can_regenerate);
}

#[test]
fn timed_out_submission_leaves_job_actionable() {
    init_logging();
    let state = poll_once(state_with_job("T1", Some("spec"), None), failed("boom"));
    let (state, _) = regenerate(state, "T1");
    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::RegenerateFailed {
            job_id: "T1".to_string(),
            generation: 1,
            reason: "timeout: render submission gave no answer within 60s".to_string(),
        },
    );
    let view = state.view();
    let job = view.animation("T1").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert!(!job.regenerating);
    assert!(job.can_regenerate);

    let (_state, effects) = regenerate(state, "T1");
    assert!(matches!(effects.as_slice(), [Effect::SubmitRender { generation: 2, .. }]));
}

#[test]
fn regenerate_returning_tracked_id_is_treated_as_failure() {
    init_logging();
    let state = poll_once(state_with_job("H1", Some("spec"), None), failed("boom"));
    let (state, _) = regenerate(state, "H1");
    let (state, _) = update(
        state,
        Msg::RegenerateAccepted {
            job_id: "H1".to_string(),
            generation: 1,
            new_id: "H1".to_string(),
        },
    );

    let view = state.view();
    let job = view.animation("H1").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert_eq!(job.notice.as_deref(), Some("Regenerate failed: duplicate job id"));
}

#[test]
fn stale_regenerate_outcome_is_dropped() {
    init_logging();
    let state = poll_once(state_with_job("K1", Some("spec"), None), failed("boom"));
    let (state, _) = regenerate(state, "K1");
    let (mut state, _) = update(
        state,
        Msg::RegenerateAccepted {
            job_id: "K1".to_string(),
            generation: 1,
            new_id: "K2".to_string(),
        },
    );
    state.consume_dirty();

    let (mut state, _) = update(
        state,
        Msg::RegenerateFailed {
            job_id: "K1".to_string(),
            generation: 1,
            reason: "late".to_string(),
        },
    );
    assert!(!state.consume_dirty());
    let view = state.view();
    let job = view.animation("K2").unwrap();
    assert_eq!(job.notice, None);
    assert_eq!(job.status, JobStatus::Queued);
}
