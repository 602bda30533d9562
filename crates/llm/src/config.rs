//! Provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use storybook::BackoffSchedule;

/// Public endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Settings for [`crate::GeminiProvider`].
///
/// Every field except `api_key` has a default, so a configuration file only
/// needs to name the models it wants to override.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub speech_model: String,
    /// Prebuilt narration voice.
    pub voice: String,
    /// Sampling temperature for story text.
    pub temperature: f32,
    /// Per-request timeout in seconds. Image calls can take tens of seconds.
    pub timeout_secs: u64,
    pub backoff: BackoffSchedule,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            text_model: "gemini-2.5-flash".into(),
            image_model: "gemini-2.5-flash-image".into(),
            speech_model: "gemini-2.5-flash-preview-tts".into(),
            voice: "Kore".into(),
            temperature: 0.9,
            timeout_secs: 120,
            backoff: BackoffSchedule::default(),
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("speech_model", &self.speech_model)
            .field("voice", &self.voice)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("backoff", &self.backoff)
            .finish()
    }
}
