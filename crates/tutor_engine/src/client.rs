use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::decode::{decode_chat_reply, decode_status, decode_submission};
use crate::{ChatReply, ChatRequest, FailureKind, JobId, RenderRequest, ServiceError, StatusReport};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// `None` leaves request duration to the service.
    pub request_timeout: Option<Duration>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

/// The reply-generation endpoint.
#[async_trait::async_trait]
pub trait ReplyService: Send + Sync {
    async fn request_reply(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError>;
}

/// The remote render job service.
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    async fn submit_render(&self, request: &RenderRequest) -> Result<JobId, ServiceError>;

    async fn query_status(&self, job_id: &str) -> Result<StatusReport, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTutorClient {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestTutorClient {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServiceError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base address", settings.base_url),
            ));
        }

        let mut builder = reqwest::Client::builder().connect_timeout(settings.connect_timeout);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Probe the service root; returns the banner message it reports.
    pub async fn health_check(&self) -> Result<String, ServiceError> {
        let body = self.send(self.client.get(self.base.clone())).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|err| ServiceError::malformed(err.to_string()))?;
        Ok(value
            .get("message")
            .and_then(|message| message.as_str())
            .unwrap_or_default()
            .to_string())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::new(FailureKind::InvalidUrl, "base address has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        payload: &T,
    ) -> Result<Vec<u8>, ServiceError> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| ServiceError::malformed(err.to_string()))?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ServiceError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl ReplyService for ReqwestTutorClient {
    async fn request_reply(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError> {
        let url = self.endpoint(&["chat"])?;
        let body = self.post_json(url, request).await?;
        decode_chat_reply(&body)
    }
}

#[async_trait::async_trait]
impl JobService for ReqwestTutorClient {
    async fn submit_render(&self, request: &RenderRequest) -> Result<JobId, ServiceError> {
        let url = self.endpoint(&["render"])?;
        let body = self.post_json(url, request).await?;
        decode_submission(&body)
    }

    async fn query_status(&self, job_id: &str) -> Result<StatusReport, ServiceError> {
        let url = self.endpoint(&["render", "status", job_id])?;
        let body = self.send(self.client.get(url)).await?;
        decode_status(&body, &self.base)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::new(FailureKind::Timeout, err.to_string());
    }
    ServiceError::new(FailureKind::Network, err.to_string())
}
