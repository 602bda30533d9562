//! Port traits implemented by infrastructure crates.
//!
//! The orchestration layer (`studio`) depends only on these traits; the
//! generative content provider and the backend-as-a-service are plugged in by
//! the composition root.

use async_trait::async_trait;

use crate::{
    AuthUser, Book, BookId, ContentError, Credentials, Email, GeneratedStory, Illustration,
    Language, Narration, Page, Profile, Session, SignUpOutcome, StorageKey, StoreError,
    StoryParameters, UserId,
};

/// Generative content service: story text, illustrations, narration.
///
/// Implementations own rate-limit handling: a returned error is final, after
/// any back-off the implementation applies per [`ContentError::retry_policy`].
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Writes the story text for `params`, with exactly `params.page_count` pages.
    async fn generate_story(&self, params: &StoryParameters) -> Result<GeneratedStory, ContentError>;

    /// Renders one illustration from a complete image prompt.
    async fn generate_illustration(&self, prompt: &str) -> Result<Illustration, ContentError>;

    /// Speaks `text` in `language`.
    async fn generate_narration(
        &self,
        text: &str,
        language: Language,
    ) -> Result<Narration, ContentError>;
}

/// Hosted authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, StoreError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError>;

    /// Exchanges the refresh token for a new session.
    async fn refresh(&self, session: &Session) -> Result<Session, StoreError>;

    /// Revokes the session server-side.
    async fn sign_out(&self, session: &Session) -> Result<(), StoreError>;

    /// Resolves the user the access token belongs to.
    async fn current_user(&self, session: &Session) -> Result<AuthUser, StoreError>;

    /// Sends a password-reset e-mail.
    async fn request_password_reset(&self, email: &Email) -> Result<(), StoreError>;
}

/// Relational storage of books and their pages.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create_book(&self, book: &Book) -> Result<Book, StoreError>;

    /// Writes title, status, and cover of an existing book.
    async fn update_book(&self, book: &Book) -> Result<Book, StoreError>;

    /// The owner's books, newest first.
    async fn list_books(&self, owner: UserId) -> Result<Vec<Book>, StoreError>;

    async fn get_book(&self, id: BookId) -> Result<Book, StoreError>;

    /// Deletes the book and (by cascade) its pages.
    async fn delete_book(&self, id: BookId) -> Result<(), StoreError>;

    async fn insert_page(&self, page: &Page) -> Result<Page, StoreError>;

    /// Writes text and asset keys of an existing page.
    async fn update_page(&self, page: &Page) -> Result<Page, StoreError>;

    /// Pages of a book ordered by page number.
    async fn list_pages(&self, book: BookId) -> Result<Vec<Page>, StoreError>;
}

/// Relational storage of user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Returns `Ok(None)` when the user has no profile row yet.
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError>;

    /// Inserts or replaces the profile row keyed by `user_id`.
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError>;

    /// Every profile, oldest first. Backend policy restricts this to admins.
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
}

/// Object storage for illustrations, narration, and logos.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `key`, replacing any existing object.
    async fn upload(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    async fn download(&self, key: &StorageKey) -> Result<Vec<u8>, StoreError>;

    /// Deletes every listed object. Missing objects are not an error.
    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StoreError>;

    /// Publicly reachable URL of `key`.
    fn public_url(&self, key: &StorageKey) -> String;
}
