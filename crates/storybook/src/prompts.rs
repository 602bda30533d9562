//! Prompt text for the generative content service, and parsing of the story
//! it returns.
//!
//! These functions only format and parse text. No networking and no retry
//! logic lives here.

use std::fmt::Write as _;

use serde::Deserialize;

use crate::{GeneratedPage, GeneratedStory, Language, StoryParameters, StorybookError};

/// Illustration style used when the wizard did not set one.
pub const DEFAULT_ART_STYLE: &str = "soft watercolor children's book illustration";

/// Prompt asking the text model for the whole story as JSON.
pub fn story_prompt(params: &StoryParameters) -> String {
    let pages = params.page_count.get();
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are an award-winning author of picture books for children {}.",
        params.age_group
    );
    let _ = writeln!(
        prompt,
        "Write an original story in {} about {}.",
        params.language.name(),
        params.theme.trim()
    );
    let _ = writeln!(prompt, "The main character is {}.", params.character.trim());
    let _ = writeln!(
        prompt,
        "The story should gently teach this moral without stating it as a lecture: {}.",
        params.moral.trim()
    );
    let _ = writeln!(prompt, "{}", params.age_group.reading_guidance());
    let _ = writeln!(prompt, "The story must have exactly {pages} pages.");
    prompt.push('\n');
    prompt.push_str("Respond with JSON only, in this shape:\n");
    prompt.push_str(
        "{\"title\": \"...\", \"pages\": [{\"text\": \"...\", \"illustration_prompt\": \"...\"}]}\n",
    );
    let _ = writeln!(
        prompt,
        "\"title\" and every \"text\" are written in {}.",
        params.language.name()
    );
    prompt.push_str(
        "Every \"illustration_prompt\" is written in English and describes the scene on that page, \
         including what the main character looks like so they stay consistent between pages.\n",
    );

    prompt
}

/// Prompt for one page's illustration.
pub fn illustration_prompt(params: &StoryParameters, title: &str, page: &GeneratedPage) -> String {
    let style = params
        .art_style
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ART_STYLE);

    format!(
        "Illustration for the children's book \"{title}\", for readers {age}.\n\
         Style: {style}. Warm, friendly, age-appropriate, no scary imagery.\n\
         Main character: {character}.\n\
         Scene: {scene}\n\
         Do not include any text, letters, or captions in the image.",
        age = params.age_group,
        character = params.character.trim(),
        scene = page.illustration_prompt.trim(),
    )
}

/// Prompt for one page's narration.
pub fn narration_prompt(text: &str, language: Language) -> String {
    format!(
        "Read this page of a children's story aloud in {}, warmly and slowly, \
         like a bedtime story:\n{}",
        language.name(),
        text.trim()
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawStory {
    #[serde(default)]
    title: String,
    #[serde(default)]
    pages: Vec<GeneratedPage>,
}

/// Parses the text model's answer into a [`GeneratedStory`].
///
/// Accepts bare JSON or JSON inside a markdown code fence. Surplus pages are
/// dropped; a story with fewer than `expected_pages` pages is rejected.
pub fn parse_story(raw: &str, expected_pages: u32) -> Result<GeneratedStory, StorybookError> {
    let body = strip_code_fence(raw);
    let parsed: RawStory = serde_json::from_str(body).map_err(|e| {
        crate::ContentError::MalformedResponse(format!("story is not valid JSON: {e}"))
    })?;

    let title = parsed.title.trim().to_string();
    if title.is_empty() {
        return Err(crate::ContentError::MalformedResponse("story has no title".into()).into());
    }

    let mut pages: Vec<GeneratedPage> = parsed
        .pages
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| GeneratedPage {
            text: p.text.trim().to_string(),
            illustration_prompt: p.illustration_prompt.trim().to_string(),
        })
        .collect();

    let actual = pages.len() as u32;
    if actual < expected_pages {
        return Err(StorybookError::StoryShape {
            expected: expected_pages,
            actual,
        });
    }
    if actual > expected_pages {
        tracing::debug!(actual, expected_pages, "Dropping surplus story pages");
        pages.truncate(expected_pages as usize);
    }

    Ok(GeneratedStory { title, pages })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // An optional language tag follows the opening fence, on the same line as
    // the body when the answer has no line breaks. JSON never starts with one.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let rest = rest.trim();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
