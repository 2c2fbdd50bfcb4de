use std::future::Future;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tutor_logging::{tutor_debug, tutor_info, tutor_warn};

use crate::{
    ChatRequest, EngineEvent, FailureKind, JobId, JobService, PollRequest, PolledJob,
    RenderRequest, ReplyService, ServiceError,
};

/// Longest the engine waits on each kind of remote call before reporting
/// [`FailureKind::Timeout`] for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub reply_deadline: Duration,
    pub query_deadline: Duration,
    pub submit_deadline: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reply_deadline: Duration::from_secs(120),
            query_deadline: Duration::from_secs(20),
            submit_deadline: Duration::from_secs(60),
        }
    }
}

enum EngineCommand {
    RequestReply(ChatRequest),
    PollJobs(Vec<PollRequest>),
    SubmitRender {
        job_id: JobId,
        generation: u32,
        request: RenderRequest,
    },
    StartPollTimer(Duration),
    Shutdown,
}

/// Runs remote calls and the poll timer on a dedicated tokio runtime thread.
///
/// Results come back as [`EngineEvent`]s. [`EngineHandle::shutdown`] stops the
/// timer and abandons every in-flight call without awaiting it.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<std::sync::Mutex<mpsc::Receiver<EngineEvent>>>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn new<S>(service: Arc<S>) -> Self
    where
        S: ReplyService + JobService + 'static,
    {
        Self::with_settings(service, EngineSettings::default())
    }

    pub fn with_settings<S>(service: Arc<S>, settings: EngineSettings) -> Self
    where
        S: ReplyService + JobService + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let replies: Arc<dyn ReplyService> = service.clone();
        let jobs: Arc<dyn JobService> = service;

        let token = cancel.clone();
        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                if token.is_cancelled() || matches!(command, EngineCommand::Shutdown) {
                    break;
                }
                let worker = Worker {
                    replies: replies.clone(),
                    jobs: jobs.clone(),
                    event_tx: event_tx.clone(),
                    settings,
                };
                let token = token.clone();
                runtime.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        _ = worker.handle(command, token.clone()) => {}
                    }
                });
            }
            // Dropping the runtime abandons tasks still waiting on the network.
            runtime.shutdown_background();
            tutor_info!("Engine stopped");
        });

        Self {
            cmd_tx,
            event_rx: Arc::new(std::sync::Mutex::new(event_rx)),
            cancel,
        }
    }

    pub fn request_reply(&self, request: ChatRequest) {
        self.send(EngineCommand::RequestReply(request));
    }

    /// Query every target concurrently and report them as one batch. A query
    /// that outlives the query deadline is reported as a timeout for its job.
    pub fn poll_jobs(&self, targets: Vec<PollRequest>) {
        self.send(EngineCommand::PollJobs(targets));
    }

    pub fn submit_render(&self, job_id: JobId, generation: u32, request: RenderRequest) {
        self.send(EngineCommand::SubmitRender {
            job_id,
            generation,
            request,
        });
    }

    /// Emit [`EngineEvent::PollDue`] every `period` until shutdown.
    pub fn start_poll_timer(&self, period: Duration) {
        self.send(EngineCommand::StartPollTimer(period));
    }

    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            tutor_info!("Engine shutdown requested");
            self.cancel.cancel();
            let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.cmd_tx.send(command);
    }
}

struct Worker {
    replies: Arc<dyn ReplyService>,
    jobs: Arc<dyn JobService>,
    event_tx: mpsc::Sender<EngineEvent>,
    settings: EngineSettings,
}

impl Worker {
    async fn handle(self, command: EngineCommand, token: CancellationToken) {
        match command {
            EngineCommand::RequestReply(request) => {
                let result = within(
                    self.settings.reply_deadline,
                    "reply request",
                    self.replies.request_reply(&request),
                )
                .await;
                if let Err(err) = &result {
                    tutor_warn!("Reply request failed: {}", err);
                }
                self.emit(EngineEvent::ReplyCompleted { result });
            }
            EngineCommand::PollJobs(targets) => {
                let results =
                    join_all(targets.into_iter().map(|target| self.poll_one(target))).await;
                self.emit(EngineEvent::PollCompleted { results });
            }
            EngineCommand::SubmitRender {
                job_id,
                generation,
                request,
            } => {
                let result = within(
                    self.settings.submit_deadline,
                    "render submission",
                    self.jobs.submit_render(&request),
                )
                .await;
                match &result {
                    Ok(new_id) => {
                        tutor_info!("Regenerate of job id={} queued as id={}", job_id, new_id)
                    }
                    Err(err) => {
                        tutor_warn!("Render submission for job id={} failed: {}", job_id, err)
                    }
                }
                self.emit(EngineEvent::RenderSubmitted {
                    job_id,
                    generation,
                    result,
                });
            }
            EngineCommand::StartPollTimer(period) => self.run_timer(period, token).await,
            EngineCommand::Shutdown => {}
        }
    }

    async fn poll_one(&self, target: PollRequest) -> PolledJob {
        let result = within(
            self.settings.query_deadline,
            "status query",
            self.jobs.query_status(&target.job_id),
        )
        .await;
        match &result {
            Ok(report) => tutor_debug!("Job id={} reported {:?}", target.job_id, report.status),
            Err(err) => tutor_warn!("Status query for job id={} failed: {}", target.job_id, err),
        }
        PolledJob {
            job_id: target.job_id,
            generation: target.generation,
            result,
        }
    }

    async fn run_timer(&self, period: Duration, token: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if self.event_tx.send(EngineEvent::PollDue).is_err() {
                        break;
                    }
                }
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}

async fn within<T>(
    deadline: Duration,
    call_name: &str,
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::new(
            FailureKind::Timeout,
            format!("{call_name} gave no answer within {deadline:?}"),
        )),
    }
}
