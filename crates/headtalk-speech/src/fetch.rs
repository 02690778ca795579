//! HTTP speech fetcher for OpenAI-compatible text-to-speech endpoints.

use async_trait::async_trait;
use serde::Serialize;

use crate::strategy::remote::{FetchError, SpeechFetcher};

/// Default synthesis endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

/// Default synthesis model.
pub const DEFAULT_MODEL: &str = "tts-1";

#[derive(Serialize)]
struct SpeechRequestBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// [`SpeechFetcher`] backed by an OpenAI-compatible `/audio/speech` API.
///
/// Requests raw PCM (`response_format: "pcm"`, 24 kHz mono s16le) so the
/// payload can be streamed into the playback buffer without a container
/// decoder.
pub struct HttpSpeechFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpSpeechFetcher {
    /// Create a fetcher for the default endpoint and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the fetcher at a different endpoint (self-hosted gateways).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different synthesis model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SpeechFetcher for HttpSpeechFetcher {
    async fn fetch(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, FetchError> {
        let body = SpeechRequestBody {
            model: &self.model,
            input: text,
            voice,
            speed: speed.clamp(0.25, 4.0),
            response_format: "pcm",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                FetchError::retryable(format!("speech request failed: {err}")).with_source(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let reason = format!("speech service returned {status}: {detail}");
            // Server-side trouble may clear up; client-side errors will not.
            return Err(if status.is_server_error() {
                FetchError::retryable(reason)
            } else {
                FetchError::terminal(reason)
            });
        }

        let bytes = response.bytes().await.map_err(|err| {
            FetchError::retryable(format!("failed reading speech payload: {err}")).with_source(err)
        })?;

        tracing::debug!(bytes = bytes.len(), voice, "Fetched synthesized audio");
        Ok(bytes.to_vec())
    }
}
