//! Generative content infrastructure adapter.
//!
//! Implements the [`storybook::ContentGenerator`] trait for Google's Gemini
//! `generateContent` API: story text as JSON, illustrations as inline image
//! data, and narration as inline PCM audio.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response parsing,
//! rate-limit header tracking, and exponential back-off live here. The
//! [`storybook`] crate sees only [`storybook::ContentGenerator`].

pub mod audio;
pub mod backoff;
mod config;
mod gemini;
pub mod wire;

pub use backoff::with_backoff;
pub use config::{GeminiConfig, DEFAULT_BASE_URL};
pub use gemini::GeminiProvider;
