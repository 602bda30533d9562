//! Core domain for the storybook generator.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used throughout the workspace. Infrastructure crates
//! implement the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`UserId`, `BookId`, `StorageKey`, etc.) |
//! | [`types`] | Value types (`AgeGroup`, `Language`, `PageCount`, `HexColor`, etc.) |
//! | [`book`] | Story parameters, generated content, book and page records |
//! | [`account`] | Credentials, sessions, profiles, brand settings |
//! | [`wizard`] | The step-by-step story wizard |
//! | [`prompts`] | Prompt text and story parsing |
//! | [`retry`] | Exponential back-off schedule |
//! | [`errors`] | Workflow and port error types, retry policy |
//! | [`ports`] | Traits implemented by infrastructure crates |

pub mod account;
pub mod book;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod prompts;
pub mod retry;
pub mod types;
pub mod wizard;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use account::{
    AuthUser, BrandSettings, Credentials, Profile, Session, SignUpOutcome, MIN_PASSWORD_LEN,
};
pub use book::{
    Book, GeneratedPage, GeneratedStory, Illustration, Narration, Page, StoryParameters,
    MAX_FIELD_LEN,
};
pub use errors::{ContentError, RetryPolicy, StoreError, StorybookError};
pub use identifiers::{BookId, Email, PageId, StorageKey, UserId};
pub use ports::{AuthProvider, BookRepository, ContentGenerator, ObjectStore, ProfileRepository};
pub use retry::BackoffSchedule;
pub use types::{AgeGroup, BookStatus, HexColor, Language, PageCount, Role, Timestamp};
pub use wizard::{StoryWizard, WizardStep};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{AgeGroup, Language, PageCount, StoryParameters};

    pub(crate) fn sample_parameters() -> StoryParameters {
        StoryParameters {
            theme: "a lantern festival".into(),
            character: "Mei, a curious fox".into(),
            age_group: AgeGroup::Early,
            moral: "sharing makes light brighter".into(),
            language: Language::English,
            page_count: PageCount::default(),
            narration: true,
            art_style: None,
        }
    }
}
