//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`BookId`] with a [`PageId`] even though both are UUIDs under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes.
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), FromStr, Display.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID (e.g. deserialised from a row).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies an authenticated user.
    ///
    /// Assigned by the auth service at sign-up; the same value keys the user's
    /// profile row and prefixes every object they upload.
    UserId
}

uuid_id! {
    /// Identifies a generated book.
    BookId
}

uuid_id! {
    /// Identifies a single page of a book.
    PageId
}

// ---------------------------------------------------------------------------
// String-backed identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Path of an object inside the storage bucket (e.g. `"<user>/<book>/page-01.png"`).
    StorageKey
}

impl StorageKey {
    /// Key for a page asset: `<owner>/<book>/page-NN.<extension>`.
    pub fn for_page_asset(owner: UserId, book: BookId, number: u32, extension: &str) -> Self {
        Self(format!("{owner}/{book}/page-{number:02}.{extension}"))
    }

    /// Key for a user's brand logo: `<owner>/brand/logo.<extension>`.
    pub fn for_logo(owner: UserId, extension: &str) -> Self {
        Self(format!("{owner}/brand/logo.{extension}"))
    }

    /// Prefix under which every asset of `book` is stored.
    pub fn book_prefix(owner: UserId, book: BookId) -> String {
        format!("{owner}/{book}/")
    }
}

/// An e-mail address used as the sign-in identity.
///
/// Only the shape is checked (one `@` with text on both sides); the auth
/// service remains the authority on deliverability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Creates an [`Email`], returning `None` if the value is not address-shaped.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into().trim().to_string();
        match v.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Some(Self(v))
            }
            _ => None,
        }
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_asset_keys_are_zero_padded_under_the_book_prefix() {
        let owner = UserId::new_random();
        let book = BookId::new_random();

        let key = StorageKey::for_page_asset(owner, book, 3, "png");

        assert!(key.as_str().starts_with(&StorageKey::book_prefix(owner, book)));
        assert!(key.as_str().ends_with("/page-03.png"));
    }

    #[test]
    fn uuid_ids_parse_from_their_display_form() {
        let id = BookId::new_random();
        let parsed: BookId = format!(" {id} ").parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<BookId>().is_err());
    }

    #[test]
    fn email_requires_a_single_at_with_both_sides() {
        assert!(Email::new("reader@example.com").is_some());
        assert!(Email::new("  reader@example.com ").is_some());
        assert!(Email::new("reader").is_none());
        assert!(Email::new("@example.com").is_none());
        assert!(Email::new("a@b@c").is_none());
    }

    #[test]
    fn empty_storage_key_is_rejected() {
        assert!(StorageKey::new("").is_none());
    }
}
