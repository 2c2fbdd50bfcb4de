use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tutor_engine::{
    ChatReply, ChatRequest, EngineEvent, EngineHandle, EngineSettings, FailureKind, JobId,
    JobService, PollRequest, Quality, RenderRequest, RenderStatus, ReplyService, ServiceError, StatusReport,
};

const HANG: Duration = Duration::from_secs(3600);

/// In-memory service: status answers per job id, optional artificial latency,
/// and calls that never answer.
#[derive(Default)]
struct FakeService {
    statuses: Mutex<HashMap<String, StatusReport>>,
    delay: Option<Duration>,
    hanging_jobs: HashSet<String>,
    hang_replies_and_submissions: bool,
    next_id: Mutex<u32>,
}

impl FakeService {
    fn with_status(self, job_id: &str, status: RenderStatus) -> Self {
        self.statuses.lock().unwrap().insert(
            job_id.to_string(),
            StatusReport {
                status,
                video_url: None,
                error: None,
            },
        );
        self
    }
}

#[async_trait::async_trait]
impl ReplyService for FakeService {
    async fn request_reply(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError> {
        if self.hang_replies_and_submissions {
            tokio::time::sleep(HANG).await;
        }
        if request.message == "fail" {
            return Err(ServiceError {
                kind: FailureKind::Network,
                message: "connection refused".to_string(),
            });
        }
        Ok(ChatReply {
            reply: format!("echo: {}", request.message),
            animations: Vec::new(),
            questions: Vec::new(),
        })
    }
}

#[async_trait::async_trait]
impl JobService for FakeService {
    async fn submit_render(&self, _request: &RenderRequest) -> Result<JobId, ServiceError> {
        if self.hang_replies_and_submissions {
            tokio::time::sleep(HANG).await;
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(format!("job-{}", *next))
    }

    async fn query_status(&self, job_id: &str) -> Result<StatusReport, ServiceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.hanging_jobs.contains(job_id) {
            tokio::time::sleep(HANG).await;
        }
        self.statuses
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| ServiceError {
                kind: FailureKind::NotFound,
                message: job_id.to_string(),
            })
    }
}

fn wait_for(engine: &EngineHandle, timeout: Duration) -> Option<EngineEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(20)) {
            if event != EngineEvent::PollDue {
                return Some(event);
            }
        }
    }
    None
}

fn target(job_id: &str, generation: u32) -> PollRequest {
    PollRequest {
        job_id: job_id.to_string(),
        generation,
    }
}

#[test]
fn poll_batch_is_reported_as_one_event() {
    tutor_logging::initialize_for_tests();
    let service = FakeService::default()
        .with_status("A1", RenderStatus::Rendering)
        .with_status("A2", RenderStatus::Completed);
    let engine = EngineHandle::new(Arc::new(service));

    engine.poll_jobs(vec![target("A1", 0), target("A2", 3), target("missing", 1)]);

    let event = wait_for(&engine, Duration::from_secs(5)).expect("poll event");
    let results = match event {
        EngineEvent::PollCompleted { results } => results,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].job_id, "A1");
    assert_eq!(
        results[0].result.as_ref().map(|r| r.status),
        Ok(RenderStatus::Rendering)
    );
    assert_eq!(results[1].generation, 3);
    assert_eq!(
        results[1].result.as_ref().map(|r| r.status),
        Ok(RenderStatus::Completed)
    );
    assert_eq!(
        results[2].result.as_ref().map_err(|e| e.kind.clone()),
        Err(FailureKind::NotFound)
    );
    engine.shutdown();
}

#[test]
fn reply_and_render_results_come_back_as_events() {
    tutor_logging::initialize_for_tests();
    let engine = EngineHandle::new(Arc::new(FakeService::default()));

    engine.request_reply(ChatRequest {
        message: "hi".to_string(),
        history: Vec::new(),
        quality: Quality::Low,
    });
    let event = wait_for(&engine, Duration::from_secs(5)).expect("reply event");
    match event {
        EngineEvent::ReplyCompleted { result: Ok(reply) } => assert_eq!(reply.reply, "echo: hi"),
        other => panic!("unexpected event: {other:?}"),
    }

    engine.request_reply(ChatRequest {
        message: "fail".to_string(),
        history: Vec::new(),
        quality: Quality::Low,
    });
    let event = wait_for(&engine, Duration::from_secs(5)).expect("reply event");
    match event {
        EngineEvent::ReplyCompleted { result: Err(err) } => {
            assert_eq!(err.kind, FailureKind::Network)
        }
        other => panic!("unexpected event: {other:?}"),
    }

    engine.submit_render("B1".to_string(), 2, render_request());
    let event = wait_for(&engine, Duration::from_secs(5)).expect("render event");
    assert_eq!(
        event,
        EngineEvent::RenderSubmitted {
            job_id: "B1".to_string(),
            generation: 2,
            result: Ok("job-1".to_string()),
        }
    );
    engine.shutdown();
}

#[test]
fn poll_timer_emits_poll_due() {
    tutor_logging::initialize_for_tests();
    let engine = EngineHandle::new(Arc::new(FakeService::default()));
    engine.start_poll_timer(Duration::from_millis(20));

    let mut ticks = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while ticks < 3 && Instant::now() < deadline {
        if engine.recv_timeout(Duration::from_millis(50)) == Some(EngineEvent::PollDue) {
            ticks += 1;
        }
    }
    assert_eq!(ticks, 3);
    engine.shutdown();
}

fn short_deadlines() -> EngineSettings {
    EngineSettings {
        reply_deadline: Duration::from_millis(200),
        query_deadline: Duration::from_millis(200),
        submit_deadline: Duration::from_millis(200),
    }
}

fn render_request() -> RenderRequest {
    RenderRequest {
        scene_spec: "spec".to_string(),
        duration: 15,
        quality: Quality::Low,
    }
}

#[test]
fn hung_status_query_does_not_hold_back_other_jobs() {
    tutor_logging::initialize_for_tests();
    let service = FakeService {
        hanging_jobs: HashSet::from(["H".to_string()]),
        ..FakeService::default()
    }
    .with_status("A", RenderStatus::Completed)
    .with_status("H", RenderStatus::Rendering);
    let engine = EngineHandle::with_settings(Arc::new(service), short_deadlines());

    engine.poll_jobs(vec![target("A", 0), target("H", 0)]);

    let event = wait_for(&engine, Duration::from_secs(3)).expect("poll event");
    let results = match event {
        EngineEvent::PollCompleted { results } => results,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].result.as_ref().map(|r| r.status),
        Ok(RenderStatus::Completed)
    );
    assert_eq!(results[1].job_id, "H");
    assert_eq!(
        results[1].result.as_ref().map_err(|e| e.kind.clone()),
        Err(FailureKind::Timeout)
    );

    // The next round is not blocked by the earlier hung query.
    engine.poll_jobs(vec![target("A", 0)]);
    let event = wait_for(&engine, Duration::from_secs(3)).expect("second poll event");
    assert!(matches!(event, EngineEvent::PollCompleted { ref results } if results.len() == 1));
    engine.shutdown();
}

#[test]
fn hung_render_submission_reports_timeout() {
    tutor_logging::initialize_for_tests();
    let service = FakeService {
        hang_replies_and_submissions: true,
        ..FakeService::default()
    };
    let engine = EngineHandle::with_settings(Arc::new(service), short_deadlines());

    engine.submit_render("B1".to_string(), 1, render_request());

    let event = wait_for(&engine, Duration::from_secs(3)).expect("render event");
    match event {
        EngineEvent::RenderSubmitted {
            job_id,
            generation,
            result: Err(err),
        } => {
            assert_eq!(job_id, "B1");
            assert_eq!(generation, 1);
            assert_eq!(err.kind, FailureKind::Timeout);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    engine.shutdown();
}

#[test]
fn hung_reply_request_reports_timeout() {
    tutor_logging::initialize_for_tests();
    let service = FakeService {
        hang_replies_and_submissions: true,
        ..FakeService::default()
    };
    let engine = EngineHandle::with_settings(Arc::new(service), short_deadlines());

    engine.request_reply(ChatRequest {
        message: "hi".to_string(),
        history: Vec::new(),
        quality: Quality::Low,
    });

    match wait_for(&engine, Duration::from_secs(3)).expect("reply event") {
        EngineEvent::ReplyCompleted { result: Err(err) } => {
            assert_eq!(err.kind, FailureKind::Timeout)
        }
        other => panic!("unexpected event: {other:?}"),
    }
    engine.shutdown();
}

#[test]
fn shutdown_abandons_in_flight_queries_and_stops_timer() {
    tutor_logging::initialize_for_tests();
    let service = FakeService {
        delay: Some(Duration::from_millis(300)),
        ..FakeService::default()
    }
    .with_status("A1", RenderStatus::Completed);
    let engine = EngineHandle::new(Arc::new(service));
    engine.start_poll_timer(Duration::from_millis(20));
    engine.poll_jobs(vec![target("A1", 0)]);

    std::thread::sleep(Duration::from_millis(50));
    engine.shutdown();
    assert!(engine.is_shut_down());
    // Drain anything emitted before cancellation took effect.
    std::thread::sleep(Duration::from_millis(50));
    while engine.try_recv().is_some() {}

    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(engine.try_recv(), None);

    // Commands after shutdown are ignored.
    engine.poll_jobs(vec![target("A1", 0)]);
    assert_eq!(engine.recv_timeout(Duration::from_millis(100)), None);
}
