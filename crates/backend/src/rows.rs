//! Table row shapes and their conversion to and from domain records.
//!
//! Rows mirror the database columns one-to-one; enum-like columns are stored
//! as text and validated on the way in.

use serde::{Deserialize, Serialize};
use storybook::{
    AgeGroup, Book, BookId, BookStatus, BrandSettings, Email, HexColor, Language, Page, PageCount,
    PageId, Profile, Role, StorageKey, StoreError, StoryParameters, Timestamp, UserId,
};

fn decode<T>(column: &str, value: &str, parsed: Option<T>) -> Result<T, StoreError> {
    parsed.ok_or_else(|| StoreError::Decode(format!("unexpected {column} '{value}'")))
}

fn key(value: Option<String>) -> Option<StorageKey> {
    value.and_then(StorageKey::new)
}

// ---------------------------------------------------------------------------
// books
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRow {
    pub id: BookId,
    pub user_id: UserId,
    pub title: String,
    pub theme: String,
    pub character: String,
    pub age_group: String,
    pub moral: String,
    pub language: String,
    pub page_count: u32,
    pub narration: bool,
    #[serde(default)]
    pub art_style: Option<String>,
    pub status: String,
    #[serde(default)]
    pub cover_image_path: Option<String>,
    pub created_at: Timestamp,
}

impl From<&Book> for BookRow {
    fn from(book: &Book) -> Self {
        let p = &book.parameters;
        Self {
            id: book.id,
            user_id: book.owner,
            title: book.title.clone(),
            theme: p.theme.clone(),
            character: p.character.clone(),
            age_group: p.age_group.as_str().into(),
            moral: p.moral.clone(),
            language: p.language.code().into(),
            page_count: p.page_count.get(),
            narration: p.narration,
            art_style: p.art_style.clone(),
            status: book.status.as_str().into(),
            cover_image_path: book.cover_image.as_ref().map(|k| k.as_str().to_string()),
            created_at: book.created_at,
        }
    }
}

impl TryFrom<BookRow> for Book {
    type Error = StoreError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let parameters = StoryParameters {
            theme: row.theme,
            character: row.character,
            age_group: decode("age_group", &row.age_group, AgeGroup::parse(&row.age_group))?,
            moral: row.moral,
            language: decode("language", &row.language, Language::parse(&row.language))?,
            page_count: decode(
                "page_count",
                &row.page_count.to_string(),
                PageCount::new(row.page_count),
            )?,
            narration: row.narration,
            art_style: row.art_style,
        };
        Ok(Book {
            id: row.id,
            owner: row.user_id,
            title: row.title,
            parameters,
            status: decode("status", &row.status, BookStatus::parse(&row.status))?,
            cover_image: key(row.cover_image_path),
            created_at: row.created_at,
        })
    }
}

/// Columns a book update may change.
#[derive(Debug, Serialize)]
pub struct BookPatch<'a> {
    pub title: &'a str,
    pub status: &'a str,
    pub cover_image_path: Option<&'a str>,
}

impl<'a> From<&'a Book> for BookPatch<'a> {
    fn from(book: &'a Book) -> Self {
        Self {
            title: &book.title,
            status: book.status.as_str(),
            cover_image_path: book.cover_image.as_ref().map(StorageKey::as_str),
        }
    }
}

// ---------------------------------------------------------------------------
// pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRow {
    pub id: PageId,
    pub book_id: BookId,
    pub page_number: u32,
    pub text: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
}

impl From<&Page> for PageRow {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            book_id: page.book_id,
            page_number: page.number,
            text: page.text.clone(),
            image_path: page.image.as_ref().map(|k| k.as_str().to_string()),
            audio_path: page.audio.as_ref().map(|k| k.as_str().to_string()),
        }
    }
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Page {
            id: row.id,
            book_id: row.book_id,
            number: row.page_number,
            text: row.text,
            image: key(row.image_path),
            audio: key(row.audio_path),
        }
    }
}

/// Columns a page update may change.
#[derive(Debug, Serialize)]
pub struct PagePatch<'a> {
    pub text: &'a str,
    pub image_path: Option<&'a str>,
    pub audio_path: Option<&'a str>,
}

impl<'a> From<&'a Page> for PagePatch<'a> {
    fn from(page: &'a Page) -> Self {
        Self {
            text: &page.text,
            image_path: page.image.as_ref().map(StorageKey::as_str),
            audio_path: page.audio.as_ref().map(StorageKey::as_str),
        }
    }
}

// ---------------------------------------------------------------------------
// profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Same value as the auth user id.
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub brand_color: Option<String>,
    #[serde(default)]
    pub logo_path: Option<String>,
    pub created_at: Timestamp,
}

impl From<&Profile> for ProfileRow {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.user_id,
            email: profile.email.as_ref().map(|e| e.as_str().to_string()),
            display_name: profile.display_name.clone(),
            role: profile.role.as_str().into(),
            brand_name: profile.brand.brand_name.clone(),
            brand_color: profile.brand.primary_color.map(|c| c.to_string()),
            logo_path: profile.brand.logo.as_ref().map(|k| k.as_str().to_string()),
            created_at: profile.created_at,
        }
    }
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let primary_color = match row.brand_color.as_deref().filter(|c| !c.is_empty()) {
            Some(c) => Some(decode("brand_color", c, HexColor::parse(c))?),
            None => None,
        };
        Ok(Profile {
            user_id: row.id,
            email: row.email.and_then(Email::new),
            display_name: row.display_name,
            role: decode("role", &row.role, Role::parse(&row.role))?,
            brand: BrandSettings {
                brand_name: row.brand_name,
                primary_color,
                logo: key(row.logo_path),
            },
            created_at: row.created_at,
        })
    }
}
