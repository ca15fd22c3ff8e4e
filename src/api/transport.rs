use async_trait::async_trait;
use futures_util::stream::BoxStream;
use reqwest::Url;
use tracing::debug;

use super::stream::decode_response;
use super::{ApiError, EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse, ListResponse};
use crate::utils::url::{endpoint_url, host_problem};

pub type GenerateStream = BoxStream<'static, Result<GenerateResponse, ApiError>>;

/// The calls components make against an Ollama server.
///
/// Components hold an `Arc<dyn Transport>` so tests can substitute a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_models(&self, host: &Url) -> Result<ListResponse, ApiError>;

    /// Start a streaming generation. Errors before the first line are returned
    /// directly; later ones arrive inside the stream.
    async fn generate(
        &self,
        host: &Url,
        request: &GenerateRequest,
    ) -> Result<GenerateStream, ApiError>;

    async fn embed(&self, host: &Url, request: &EmbedRequest) -> Result<EmbedResponse, ApiError>;
}

/// Validate a user-supplied host before any request is built.
pub fn parse_host(host: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidHost {
        url: host.to_string(),
        reason,
    };

    let url = Url::parse(host.trim()).map_err(|e| invalid(e.to_string()))?;
    match host_problem(&url) {
        Some(reason) => Err(invalid(reason.to_string())),
        None => Ok(url),
    }
}

/// [`Transport`] over reqwest.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), &body))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_models(&self, host: &Url) -> Result<ListResponse, ApiError> {
        let url = endpoint_url(host, "api/tags");
        debug!(%url, "listing models");

        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn generate(
        &self,
        host: &Url,
        request: &GenerateRequest,
    ) -> Result<GenerateStream, ApiError> {
        let url = endpoint_url(host, "api/generate");
        debug!(%url, model = %request.model, images = request.images.len(), "starting generate request");

        let response = self.client.post(url).json(request).send().await?;
        let response = check_status(response).await?;
        Ok(decode_response(response))
    }

    async fn embed(&self, host: &Url, request: &EmbedRequest) -> Result<EmbedResponse, ApiError> {
        let url = endpoint_url(host, "api/embed");
        debug!(%url, model = %request.model, "starting embed request");

        let response = self.client.post(url).json(request).send().await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
