//! Runtime configuration: a TOML file plus environment overrides.
//!
//! ```toml
//! [backend]
//! url = "https://abcd.supabase.co"
//! anon_key = "..."
//!
//! [generation]
//! api_key = "..."
//! image_model = "gemini-2.5-flash-image"
//!
//! [generation.backoff]
//! initial = 2000
//! max_attempts = 5
//!
//! [telemetry]
//! otlp_endpoint = "http://localhost:4317"
//!
//! [export]
//! sheet = "letter"
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use backend::BackendConfig;
use llm::GeminiConfig;
use render::{RenderOptions, SheetSize};
use serde::Deserialize;
use storybook::{BrandSettings, StorybookError};
use tracing::{debug, info};

pub const ENV_BACKEND_URL: &str = "STORYBOOK_BACKEND_URL";
pub const ENV_BACKEND_ANON_KEY: &str = "STORYBOOK_BACKEND_ANON_KEY";
pub const ENV_GEMINI_API_KEY: &str = "STORYBOOK_GEMINI_API_KEY";
pub const ENV_OTLP_ENDPOINT: &str = "STORYBOOK_OTLP_ENDPOINT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; spans are exported only when this is set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "storybook".into(),
        }
    }
}

/// PDF layout defaults; the sheet size can be overridden per export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub sheet: String,
    pub margin: f32,
    pub body_font_size: f32,
    pub title_font_size: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let defaults = RenderOptions::default();
        Self {
            sheet: "a4".into(),
            margin: defaults.margin,
            body_font_size: defaults.body_font_size,
            title_font_size: defaults.title_font_size,
        }
    }
}

impl ExportConfig {
    pub fn render_options(
        &self,
        sheet: Option<SheetSize>,
        brand: BrandSettings,
    ) -> Result<RenderOptions, StorybookError> {
        let sheet = match sheet {
            Some(sheet) => sheet,
            None => SheetSize::parse(&self.sheet).ok_or_else(|| configuration(format!(
                "export.sheet must be \"a4\" or \"letter\", got {:?}",
                self.sheet
            )))?,
        };
        Ok(RenderOptions {
            sheet,
            margin: self.margin,
            body_font_size: self.body_font_size,
            title_font_size: self.title_font_size,
            brand: Some(brand),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub generation: GeminiConfig,
    pub telemetry: TelemetryConfig,
    pub export: ExportConfig,
}

/// Where the configuration came from. Loading happens before the tracing
/// subscriber exists, so this is logged afterwards with [`ConfigSource::log`].
#[derive(Debug, Default, PartialEq)]
pub struct ConfigSource {
    /// The file that was read, if any.
    pub file: Option<PathBuf>,
    /// The default file, when it was looked for and not found.
    pub missing_default: Option<PathBuf>,
    /// Environment variables that replaced file values.
    pub overrides: Vec<&'static str>,
}

impl ConfigSource {
    pub fn log(&self) {
        if let Some(path) = &self.file {
            debug!(path = %path.display(), "loaded configuration file");
        }
        if let Some(path) = &self.missing_default {
            info!(path = %path.display(), "no configuration file, using defaults");
        }
        for variable in &self.overrides {
            info!(variable, "environment overrides configuration file");
        }
    }
}

fn configuration(message: impl Into<String>) -> StorybookError {
    StorybookError::Configuration {
        message: message.into(),
    }
}

/// `<config_dir>/storybook`, where the config file and session live.
pub fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("storybook"))
}

impl AppConfig {
    /// Loads `path`, or the default location when `path` is `None`, then
    /// applies environment overrides and validates the result.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigSource), StorybookError> {
        let (path, required) = match path {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (app_dir().map(|dir| dir.join("config.toml")), false),
        };

        let mut source = ConfigSource::default();
        let mut config = match path {
            Some(path) => match Self::read(&path, required)? {
                Some(config) => {
                    source.file = Some(path);
                    config
                }
                None => {
                    source.missing_default = Some(path);
                    Self::default()
                }
            },
            None => Self::default(),
        };
        source.overrides = config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, source))
    }

    /// `None` when an optional file does not exist.
    fn read(path: &Path, required: bool) -> Result<Option<Self>, StorybookError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)
                .map(Some)
                .map_err(|e| configuration(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound && !required => Ok(None),
            Err(e) => Err(configuration(format!("cannot read {}: {e}", path.display()))),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overrides file values with any non-empty variable `lookup` returns,
    /// and names the variables that were applied.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
        let mut applied = Vec::new();
        let mut get = |key: &'static str| {
            let value = lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            if value.is_some() {
                applied.push(key);
            }
            value
        };

        if let Some(url) = get(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(key) = get(ENV_BACKEND_ANON_KEY) {
            self.backend.anon_key = key;
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.generation.api_key = key;
        }
        if let Some(endpoint) = get(ENV_OTLP_ENDPOINT) {
            self.telemetry.otlp_endpoint = Some(endpoint);
        }
        applied
    }

    /// Checks everything every command needs.
    pub fn validate(&self) -> Result<(), StorybookError> {
        let url = self.backend.url.trim();
        if url.is_empty() {
            return Err(configuration(format!(
                "backend.url is not set (or set {ENV_BACKEND_URL})"
            )));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(configuration(format!(
                "backend.url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(configuration(format!(
                "backend.anon_key is not set (or set {ENV_BACKEND_ANON_KEY})"
            )));
        }
        if self.backend.bucket.trim().is_empty() {
            return Err(configuration("backend.bucket must not be empty"));
        }
        if self.generation.backoff.max_attempts == 0 {
            return Err(configuration("generation.backoff.max_attempts must be at least 1"));
        }
        self.export
            .render_options(None, BrandSettings::default())?
            .check()
            .map_err(|e| configuration(format!("export: {e}")))?;
        Ok(())
    }

    /// Checks what commands that call the content generator need.
    pub fn require_generation(&self) -> Result<&GeminiConfig, StorybookError> {
        if self.generation.api_key.trim().is_empty() {
            return Err(configuration(format!(
                "generation.api_key is not set (or set {ENV_GEMINI_API_KEY})"
            )));
        }
        Ok(&self.generation)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const MINIMAL: &str = r#"
        [backend]
        url = "https://proj.supabase.co"
        anon_key = "anon"
    "#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_file_gets_defaults_everywhere_else() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.backend.bucket, "storybooks");
        assert_eq!(config.generation.text_model, "gemini-2.5-flash");
        assert_eq!(config.generation.backoff.max_attempts, 4);
        assert_eq!(config.telemetry.service_name, "storybook");
        assert_eq!(config.export.sheet, "a4");
    }

    #[test]
    fn partial_backoff_tables_keep_the_other_defaults() {
        let text = format!("{MINIMAL}\n[generation.backoff]\nmax_attempts = 6\n");
        let config = AppConfig::from_toml(&text).unwrap();
        assert_eq!(config.generation.backoff.max_attempts, 6);
        assert_eq!(config.generation.backoff.multiplier, 2);
    }

    #[test]
    fn environment_overrides_the_file() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        let applied = config.apply_env(env(&[
            (ENV_BACKEND_URL, "https://other.supabase.co"),
            (ENV_GEMINI_API_KEY, " secret "),
            (ENV_BACKEND_ANON_KEY, "  "),
        ]));
        assert_eq!(config.backend.url, "https://other.supabase.co");
        assert_eq!(config.generation.api_key, "secret");
        assert_eq!(config.backend.anon_key, "anon");
        assert_eq!(applied, vec![ENV_BACKEND_URL, ENV_GEMINI_API_KEY]);
    }

    #[test]
    fn missing_backend_secrets_are_configuration_errors() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(matches!(err, StorybookError::Configuration { .. }));

        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.backend.anon_key.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn generation_key_is_only_required_on_demand() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.require_generation().is_err());
    }

    #[test]
    fn unknown_sheet_sizes_are_rejected() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.export.sheet = "a5".into();
        assert!(config
            .export
            .render_options(None, BrandSettings::default())
            .is_err());
        let options = config
            .export
            .render_options(Some(SheetSize::Letter), BrandSettings::default())
            .unwrap();
        assert_eq!(options.sheet, SheetSize::Letter);
    }

    #[test]
    fn bad_export_settings_fail_at_start_up() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.export.sheet = "a5".into();
        assert!(matches!(
            config.validate(),
            Err(StorybookError::Configuration { .. })
        ));

        let text = format!("{MINIMAL}\n[export]\nmargin = 400.0\n");
        let config = AppConfig::from_toml(&text).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("margin"));

        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.export.body_font_size = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_file_is_recorded_as_the_source() {
        let dir = std::env::temp_dir().join(format!("storybook-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, MINIMAL).unwrap();

        let (config, source) = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.backend.bucket, "storybooks");
        assert_eq!(source.file, Some(path));
        assert_eq!(source.missing_default, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/storybook.toml"))).unwrap_err();
        assert!(matches!(err, StorybookError::Configuration { .. }));
    }
}
