use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tutor_core::{
    Effect, HistoryEntry, JobStatus, Msg, NewAnimation, PollOutcome, PollResult, Quality, Role,
    StatusObservation,
};
use tutor_engine::{EngineEvent, EngineHandle, PollRequest, RenderStatus, ReplyAnimation};
use tutor_logging::{tutor_debug, tutor_info};

/// Executes core effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RequestReply {
                    message,
                    history,
                    quality,
                } => {
                    tutor_info!(
                        "RequestReply message_len={} history_len={} quality={}",
                        message.len(),
                        history.len(),
                        quality.as_str()
                    );
                    self.engine.request_reply(tutor_engine::ChatRequest {
                        message,
                        history: history.into_iter().map(map_history).collect(),
                        quality: map_quality(quality),
                    });
                }
                Effect::PollJobs { targets } => {
                    tutor_debug!("PollJobs count={}", targets.len());
                    self.engine.poll_jobs(
                        targets
                            .into_iter()
                            .map(|target| PollRequest {
                                job_id: target.job_id,
                                generation: target.generation,
                            })
                            .collect(),
                    );
                }
                Effect::SubmitRender {
                    job_id,
                    generation,
                    request,
                } => {
                    tutor_info!(
                        "SubmitRender job_id={} generation={} duration={}",
                        job_id,
                        generation,
                        request.duration
                    );
                    self.engine.submit_render(
                        job_id,
                        generation,
                        tutor_engine::RenderRequest {
                            scene_spec: request.scene_spec,
                            duration: request.duration,
                            quality: map_quality(request.quality),
                        },
                    );
                }
                Effect::StopPolling => self.engine.shutdown(),
            }
        }
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || {
            while !engine.is_shut_down() {
                let Some(event) = engine.recv_timeout(Duration::from_millis(50)) else {
                    continue;
                };
                if msg_tx.send(map_event(event)).is_err() {
                    break;
                }
            }
        });
    }
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::PollDue => Msg::PollTick,
        EngineEvent::ReplyCompleted { result } => match result {
            Ok(reply) => Msg::ReplyReceived {
                content: reply.reply,
                follow_ups: reply.questions,
                animations: reply.animations.into_iter().map(map_animation).collect(),
            },
            Err(err) => Msg::ReplyFailed {
                reason: err.to_string(),
            },
        },
        EngineEvent::PollCompleted { results } => Msg::PollCompleted {
            results: results
                .into_iter()
                .map(|polled| PollResult {
                    job_id: polled.job_id,
                    generation: polled.generation,
                    outcome: match polled.result {
                        Ok(report) => PollOutcome::Observed(StatusObservation {
                            status: map_status(report.status),
                            video_url: report.video_url,
                            error: report.error,
                        }),
                        Err(err) => PollOutcome::QueryFailed {
                            reason: err.to_string(),
                        },
                    },
                })
                .collect(),
        },
        EngineEvent::RenderSubmitted {
            job_id,
            generation,
            result,
        } => match result {
            Ok(new_id) => Msg::RegenerateAccepted {
                job_id,
                generation,
                new_id,
            },
            Err(err) => Msg::RegenerateFailed {
                job_id,
                generation,
                reason: err.to_string(),
            },
        },
    }
}

fn map_animation(animation: ReplyAnimation) -> NewAnimation {
    NewAnimation {
        id: animation.id,
        title: animation.title,
        status: map_status(animation.status),
        scene_spec: animation.scene_spec,
        duration: animation.duration,
    }
}

fn map_status(status: RenderStatus) -> JobStatus {
    match status {
        RenderStatus::Queued => JobStatus::Queued,
        RenderStatus::Rendering => JobStatus::Rendering,
        RenderStatus::Completed => JobStatus::Completed,
        RenderStatus::Failed => JobStatus::Failed,
    }
}

fn map_quality(quality: Quality) -> tutor_engine::Quality {
    match quality {
        Quality::Low => tutor_engine::Quality::Low,
        Quality::High => tutor_engine::Quality::High,
    }
}

fn map_history(entry: HistoryEntry) -> tutor_engine::HistoryEntry {
    tutor_engine::HistoryEntry {
        role: match entry.role {
            Role::User => tutor_engine::Role::User,
            Role::Assistant => tutor_engine::Role::Assistant,
        },
        content: entry.content,
    }
}
