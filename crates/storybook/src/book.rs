//! Books, pages, and the generated content that fills them.

use serde::{Deserialize, Serialize};

use crate::{
    AgeGroup, BookId, BookStatus, Language, PageCount, PageId, StorageKey, StorybookError,
    Timestamp, UserId,
};

/// Longest accepted value for a free-text story parameter.
pub const MAX_FIELD_LEN: usize = 200;

/// Everything the story wizard collects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryParameters {
    /// What the story is about (e.g. `"a trip to the moon"`).
    pub theme: String,
    /// The main character (e.g. `"Pip, a shy hedgehog"`).
    pub character: String,
    pub age_group: AgeGroup,
    /// The lesson the story should convey.
    pub moral: String,
    pub language: Language,
    pub page_count: PageCount,
    /// Whether narration audio is generated for every page.
    #[serde(default = "default_narration")]
    pub narration: bool,
    /// Optional illustration style override (e.g. `"paper cut-out"`).
    #[serde(default)]
    pub art_style: Option<String>,
}

fn default_narration() -> bool {
    true
}

impl StoryParameters {
    /// Re-checks every field. Used before any generation call is made.
    pub fn validate(&self) -> Result<(), StorybookError> {
        check_text("theme", &self.theme)?;
        check_text("character", &self.character)?;
        check_text("moral", &self.moral)?;
        if let Some(style) = &self.art_style {
            check_text("art_style", style)?;
        }
        Ok(())
    }
}

/// Validates a required free-text field.
pub(crate) fn check_text(field: &'static str, value: &str) -> Result<(), StorybookError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StorybookError::InvalidParameters {
            field,
            reason: "must not be empty".into(),
        });
    }
    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(StorybookError::InvalidParameters {
            field,
            reason: format!("must be at most {MAX_FIELD_LEN} characters"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Generated content
// ---------------------------------------------------------------------------

/// Story text as returned by the text model, before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub title: String,
    pub pages: Vec<GeneratedPage>,
}

/// One page of generated story text plus a description of its illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPage {
    pub text: String,
    #[serde(alias = "image_prompt", alias = "illustration")]
    pub illustration_prompt: String,
}

/// An image payload returned by the image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Illustration {
    pub bytes: Vec<u8>,
    /// MIME type reported by the provider (e.g. `"image/png"`).
    pub mime_type: String,
}

impl Illustration {
    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// Narration audio for one page, already wrapped in a WAV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
}

impl Narration {
    /// MIME type of the stored narration.
    pub const MIME_TYPE: &'static str = "audio/wav";
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// A book as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub owner: UserId,
    pub title: String,
    pub parameters: StoryParameters,
    pub status: BookStatus,
    /// Storage key of the cover image (the first page's illustration).
    pub cover_image: Option<StorageKey>,
    pub created_at: Timestamp,
}

impl Book {
    /// A fresh book row for a story that is about to be illustrated.
    pub fn new_generating(owner: UserId, title: String, parameters: StoryParameters) -> Self {
        Self {
            id: BookId::new_random(),
            owner,
            title,
            parameters,
            status: BookStatus::Generating,
            cover_image: None,
            created_at: Timestamp::now(),
        }
    }
}

/// A page as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub book_id: BookId,
    /// 1-based position within the book.
    pub number: u32,
    pub text: String,
    pub image: Option<StorageKey>,
    pub audio: Option<StorageKey>,
}

impl Page {
    /// A page with text only; assets are attached once uploaded.
    pub fn new(book_id: BookId, number: u32, text: impl Into<String>) -> Self {
        Self {
            id: PageId::new_random(),
            book_id,
            number,
            text: text.into(),
            image: None,
            audio: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_parameters;

    #[test]
    fn validate_accepts_complete_parameters() {
        assert!(sample_parameters().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_overlong_fields() {
        let mut params = sample_parameters();
        params.moral = "   ".into();
        assert!(matches!(
            params.validate(),
            Err(StorybookError::InvalidParameters { field: "moral", .. })
        ));

        let mut params = sample_parameters();
        params.theme = "x".repeat(MAX_FIELD_LEN + 1);
        assert!(matches!(
            params.validate(),
            Err(StorybookError::InvalidParameters { field: "theme", .. })
        ));
    }

    #[test]
    fn narration_defaults_on_when_absent_from_stored_parameters() {
        let json = r#"{"theme":"t","character":"c","age_group":"middle","moral":"m","language":"de","page_count":4}"#;
        let params: StoryParameters = serde_json::from_str(json).unwrap();
        assert!(params.narration);
        assert_eq!(params.language, Language::German);
    }

    #[test]
    fn illustration_extension_follows_mime_type() {
        let png = Illustration { bytes: vec![], mime_type: "image/png".into() };
        let jpg = Illustration { bytes: vec![], mime_type: "image/jpeg".into() };
        assert_eq!(png.extension(), "png");
        assert_eq!(jpg.extension(), "jpg");
    }
}
