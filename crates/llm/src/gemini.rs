//! [`ContentGenerator`] over the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::RETRY_AFTER;
use storybook::{
    prompts, ContentError, ContentGenerator, GeneratedStory, Illustration, Language, Narration,
    StoryParameters,
};
use tracing::instrument;

use crate::{
    audio,
    backoff::with_backoff,
    wire::{ErrorEnvelope, GenerateRequest, GenerateResponse, GenerationConfig, SpeechConfig},
    GeminiConfig,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini-backed content generator.
///
/// Every public call is wrapped in the configured back-off schedule; errors
/// returned from the trait methods are final.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Builds the HTTP client. Fails only if the TLS backend cannot initialise.
    pub fn new(config: GeminiConfig) -> Result<Self, ContentError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ContentError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    /// One `generateContent` round trip, without retries.
    #[instrument(skip(self, request))]
    async fn call(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ContentError> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ContentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            let err = error_for_status(status.as_u16(), retry_after, &body);
            tracing::debug!(status = status.as_u16(), error = %err, "Generation request failed");
            return Err(err);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ContentError::MalformedResponse(e.to_string()))?;
        if let Some(reason) = parsed.block_reason() {
            return Err(ContentError::Blocked { reason });
        }
        Ok(parsed)
    }

    fn story_request(&self, params: &StoryParameters) -> GenerateRequest {
        GenerateRequest::user_text(
            prompts::story_prompt(params),
            GenerationConfig {
                temperature: Some(self.config.temperature),
                response_mime_type: Some("application/json".into()),
                ..Default::default()
            },
        )
    }

    fn illustration_request(prompt: &str) -> GenerateRequest {
        GenerateRequest::user_text(
            prompt,
            GenerationConfig {
                response_modalities: vec!["IMAGE".into()],
                ..Default::default()
            },
        )
    }

    fn narration_request(&self, text: &str, language: Language) -> GenerateRequest {
        GenerateRequest::user_text(
            prompts::narration_prompt(text, language),
            GenerationConfig {
                response_modalities: vec!["AUDIO".into()],
                speech_config: Some(SpeechConfig::prebuilt(&self.config.voice)),
                ..Default::default()
            },
        )
    }
}

#[async_trait]
impl ContentGenerator for GeminiProvider {
    #[instrument(skip_all, fields(pages = params.page_count.get(), language = params.language.code()))]
    async fn generate_story(&self, params: &StoryParameters) -> Result<GeneratedStory, ContentError> {
        let request = &self.story_request(params);
        let expected = params.page_count.get();
        with_backoff(&self.config.backoff, "story", move || async move {
            let response = self.call(&self.config.text_model, request).await?;
            let text = response.text();
            if text.trim().is_empty() {
                return Err(ContentError::MissingContent { what: "story text" });
            }
            prompts::parse_story(&text, expected).map_err(ContentError::from)
        })
        .await
    }

    #[instrument(skip_all)]
    async fn generate_illustration(&self, prompt: &str) -> Result<Illustration, ContentError> {
        let request = &Self::illustration_request(prompt);
        with_backoff(&self.config.backoff, "illustration", move || async move {
            let response = self.call(&self.config.image_model, request).await?;
            illustration_from(&response)
        })
        .await
    }

    #[instrument(skip_all, fields(language = language.code()))]
    async fn generate_narration(
        &self,
        text: &str,
        language: Language,
    ) -> Result<Narration, ContentError> {
        let request = &self.narration_request(text, language);
        with_backoff(&self.config.backoff, "narration", move || async move {
            let response = self.call(&self.config.speech_model, request).await?;
            narration_from(&response)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

/// Parses a `Retry-After` header given in whole seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Maps a non-success response onto [`ContentError`].
fn error_for_status(status: u16, retry_after: Option<Duration>, body: &str) -> ContentError {
    if status == 429 {
        return ContentError::RateLimited { retry_after };
    }
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| match e.error.status {
            Some(code) if !e.error.message.is_empty() => format!("{code}: {}", e.error.message),
            _ => e.error.message,
        })
        .unwrap_or_else(|_| body.trim().chars().take(300).collect());
    ContentError::Provider { status, message }
}

fn decode_inline(data: &str) -> Result<Vec<u8>, ContentError> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| ContentError::MalformedResponse(format!("inline data is not base64: {e}")))
}

fn illustration_from(response: &GenerateResponse) -> Result<Illustration, ContentError> {
    let inline = response
        .inline_data()
        .filter(|d| d.mime_type.starts_with("image/"))
        .ok_or(ContentError::MissingContent { what: "image" })?;
    Ok(Illustration {
        bytes: decode_inline(&inline.data)?,
        mime_type: inline.mime_type.clone(),
    })
}

fn narration_from(response: &GenerateResponse) -> Result<Narration, ContentError> {
    let inline = response
        .inline_data()
        .filter(|d| d.mime_type.starts_with("audio/"))
        .ok_or(ContentError::MissingContent { what: "audio" })?;
    let bytes = decode_inline(&inline.data)?;
    let sample_rate =
        audio::sample_rate_from_mime(&inline.mime_type).unwrap_or(audio::DEFAULT_SAMPLE_RATE);
    let wav = if audio::is_wav(&bytes) {
        bytes
    } else {
        audio::pcm_to_wav(&bytes, sample_rate)
    };
    Ok(Narration { wav, sample_rate })
}
