use serde::Deserialize;
use url::Url;

use crate::{ChatReply, FailureKind, JobId, RenderStatus, ReplyAnimation, ServiceError, StatusReport};

#[derive(Debug, Deserialize)]
struct WireStatus {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSubmission {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct WireChatReply {
    reply: String,
    #[serde(default)]
    animations: Vec<WireAnimation>,
    #[serde(default)]
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireAnimation {
    id: String,
    #[serde(default)]
    title: Option<String>,
    status: String,
    #[serde(default)]
    scene_spec: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
}

/// Decode a status query body. Unknown statuses and `not_found` fail closed.
pub fn decode_status(body: &[u8], base: &Url) -> Result<StatusReport, ServiceError> {
    let wire: WireStatus = parse_json(body)?;
    if wire.status == "not_found" {
        return Err(ServiceError::new(
            FailureKind::NotFound,
            "service does not know this job",
        ));
    }
    let status = RenderStatus::parse(&wire.status)
        .ok_or_else(|| ServiceError::malformed(format!("unknown status {:?}", wire.status)))?;
    let video_url = non_empty(wire.video_url)
        .map(|raw| resolve_location(base, &raw))
        .transpose()?;

    Ok(StatusReport {
        status,
        video_url,
        error: non_empty(wire.error),
    })
}

/// Decode a render submission body into the new job id.
pub fn decode_submission(body: &[u8]) -> Result<JobId, ServiceError> {
    let wire: WireSubmission = parse_json(body)?;
    require_id(wire.job_id)
}

/// Decode a chat reply. Any malformed animation rejects the whole reply.
pub fn decode_chat_reply(body: &[u8]) -> Result<ChatReply, ServiceError> {
    let wire: WireChatReply = parse_json(body)?;
    let animations = wire
        .animations
        .into_iter()
        .map(|animation| {
            let status = RenderStatus::parse(&animation.status).ok_or_else(|| {
                ServiceError::malformed(format!("unknown animation status {:?}", animation.status))
            })?;
            Ok(ReplyAnimation {
                id: require_id(animation.id)?,
                title: non_empty(animation.title),
                status,
                scene_spec: animation.scene_spec,
                duration: animation.duration,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(ChatReply {
        reply: wire.reply,
        animations,
        questions: wire.questions,
    })
}

/// Resolve a result location reported by the service into an absolute URL.
///
/// Root-relative paths are appended to the base address so a base with a path
/// prefix keeps it; other relative references use URL join semantics.
pub fn resolve_location(base: &Url, raw: &str) -> Result<String, ServiceError> {
    let raw = raw.trim();
    if let Ok(absolute) = Url::parse(raw) {
        return Ok(absolute.to_string());
    }
    let resolved = if raw.starts_with('/') && !raw.starts_with("//") {
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), raw);
        Url::parse(&joined)
    } else {
        base.join(raw)
    };
    resolved
        .map(|url| url.to_string())
        .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))
}

fn parse_json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body).map_err(|err| ServiceError::malformed(err.to_string()))
}

fn require_id(id: String) -> Result<JobId, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ServiceError::malformed("empty job id"));
    }
    Ok(id.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
