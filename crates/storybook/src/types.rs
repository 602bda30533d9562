//! Shared value types for the storybook domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (page counts are bounded, colours are
//! `#rrggbb`, languages come from a fixed supported set).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

/// Target reader age band. Drives vocabulary and sentence length in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    /// Ages 2–4.
    Toddler,
    /// Ages 5–7.
    Early,
    /// Ages 8–10.
    Middle,
    /// Ages 11–12.
    Preteen,
}

impl AgeGroup {
    /// All age groups, youngest first.
    pub const ALL: [AgeGroup; 4] = [Self::Toddler, Self::Early, Self::Middle, Self::Preteen];

    /// Human-readable age range, e.g. `"5-7"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Toddler => "2-4",
            Self::Early => "5-7",
            Self::Middle => "8-10",
            Self::Preteen => "11-12",
        }
    }

    /// Reading-level guidance handed to the text model.
    pub fn reading_guidance(self) -> &'static str {
        match self {
            Self::Toddler => {
                "Use very simple words, one or two short sentences per page, and gentle repetition."
            }
            Self::Early => "Use simple sentences of everyday words, two to four sentences per page.",
            Self::Middle => {
                "Use clear, vivid sentences with some new words explained by context, one short paragraph per page."
            }
            Self::Preteen => {
                "Use rich but accessible language and some dialogue, one or two paragraphs per page."
            }
        }
    }

    /// Parses a snake-case name (`"early"`) or an age range label (`"5-7"`).
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|g| g.label() == v || g.as_str() == v)
    }

    /// Snake-case name as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toddler => "toddler",
            Self::Early => "early",
            Self::Middle => "middle",
            Self::Preteen => "preteen",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ages {}", self.label())
    }
}

// ---------------------------------------------------------------------------

/// Language the story is written and narrated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "nl")]
    Dutch,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "zh")]
    Chinese,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 10] = [
        Self::English,
        Self::Spanish,
        Self::French,
        Self::German,
        Self::Italian,
        Self::Portuguese,
        Self::Dutch,
        Self::Hindi,
        Self::Japanese,
        Self::Chinese,
    ];

    /// BCP-47 primary language subtag.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::German => "de",
            Self::Italian => "it",
            Self::Portuguese => "pt",
            Self::Dutch => "nl",
            Self::Hindi => "hi",
            Self::Japanese => "ja",
            Self::Chinese => "zh",
        }
    }

    /// English display name, used inside prompts.
    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
            Self::Dutch => "Dutch",
            Self::Hindi => "Hindi",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
        }
    }

    /// Parses a language code or English name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(v) || l.name().eq_ignore_ascii_case(v))
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::English
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------

/// Number of story pages in a book, bounded to `[MIN_PAGES, MAX_PAGES]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PageCount(u32);

impl PageCount {
    /// Smallest book the generator produces.
    pub const MIN_PAGES: u32 = 3;
    /// Largest book the generator produces.
    pub const MAX_PAGES: u32 = 12;

    /// Creates a [`PageCount`], returning `None` outside the supported range.
    #[must_use]
    pub fn new(pages: u32) -> Option<Self> {
        (Self::MIN_PAGES..=Self::MAX_PAGES)
            .contains(&pages)
            .then_some(Self(pages))
    }

    /// Returns the page count as an integer.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageCount {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u32> for PageCount {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!(
                "page count must be between {} and {}, got {value}",
                Self::MIN_PAGES,
                Self::MAX_PAGES
            )
        })
    }
}

impl From<PageCount> for u32 {
    fn from(value: PageCount) -> Self {
        value.0
    }
}

impl std::fmt::Display for PageCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Branding
// ---------------------------------------------------------------------------

/// An sRGB colour in `#rrggbb` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    r: u8,
    g: u8,
    b: u8,
}

impl HexColor {
    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Red, green and blue channels.
    pub fn rgb(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("'{value}' is not a #rrggbb colour"))
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for HexColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Access level of a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account: sees only its own books and profile.
    #[default]
    Member,
    /// May list every profile in the admin user list.
    Admin,
}

impl Role {
    /// Name as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored role name. The legacy value `"user"` maps to [`Role::Member`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" | "user" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle of a book row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// Row created; pages are still being generated.
    Generating,
    /// Every page has been persisted.
    Complete,
    /// Generation stopped part-way; some pages may be missing.
    Failed,
}

impl BookStatus {
    /// Name as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generating" => Some(Self::Generating),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] from seconds since the Unix epoch.
    pub fn from_unix(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(Self)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns a timestamp shifted by `seconds` (negative moves backwards).
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_enforces_bounds() {
        assert!(PageCount::new(PageCount::MIN_PAGES - 1).is_none());
        assert!(PageCount::new(PageCount::MAX_PAGES + 1).is_none());
        assert_eq!(PageCount::new(8).map(PageCount::get), Some(8));
        assert_eq!(PageCount::default().get(), 5);
    }

    #[test]
    fn page_count_display_honours_width() {
        let count = PageCount::new(5).unwrap();
        assert_eq!(format!("{count:>2}p"), " 5p");
        assert_eq!(format!("{count}"), "5");
    }

    #[test]
    fn page_count_deserialisation_rejects_out_of_range_values() {
        assert!(serde_json::from_str::<PageCount>("7").is_ok());
        assert!(serde_json::from_str::<PageCount>("40").is_err());
    }

    #[test]
    fn language_parses_codes_and_names() {
        assert_eq!(Language::parse("ES"), Some(Language::Spanish));
        assert_eq!(Language::parse("japanese"), Some(Language::Japanese));
        assert_eq!(Language::parse("klingon"), None);
        assert_eq!(serde_json::to_string(&Language::French).unwrap(), "\"fr\"");
    }

    #[test]
    fn age_group_parses_labels_and_names() {
        assert_eq!(AgeGroup::parse("5-7"), Some(AgeGroup::Early));
        assert_eq!(AgeGroup::parse("Preteen"), Some(AgeGroup::Preteen));
        assert_eq!(AgeGroup::parse("adult"), None);
    }

    #[test]
    fn hex_color_normalises_to_lowercase_with_hash() {
        let c = HexColor::parse("FF8800").unwrap();
        assert_eq!(c.rgb(), (0xff, 0x88, 0x00));
        assert_eq!(c.to_string(), "#ff8800");
        assert!(HexColor::parse("#ff88").is_none());
        assert!(HexColor::parse("#gg0000").is_none());
    }

    #[test]
    fn legacy_user_role_reads_as_member() {
        assert_eq!(Role::parse("user"), Some(Role::Member));
        assert_eq!(Role::parse("owner"), None);
    }
}
