//! In-memory port implementations for workflow tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use storybook::{
    AgeGroup, AuthProvider, AuthUser, Book, BookId, BookRepository, ContentError, ContentGenerator,
    Credentials, Email, GeneratedPage, GeneratedStory, Illustration, Language, Narration,
    ObjectStore, Page, PageCount, Profile, ProfileRepository, Session, SignUpOutcome, StorageKey,
    StoreError, StoryParameters, Timestamp, UserId,
};

pub(crate) fn parameters(pages: u32) -> StoryParameters {
    StoryParameters {
        theme: "a lantern festival".into(),
        character: "Mei, a curious fox".into(),
        age_group: AgeGroup::Early,
        moral: "sharing makes light brighter".into(),
        language: Language::English,
        page_count: PageCount::new(pages).unwrap(),
        narration: true,
        art_style: None,
    }
}

pub(crate) fn user() -> AuthUser {
    AuthUser {
        id: UserId::new_random(),
        email: Email::new("mei@example.com"),
    }
}

pub(crate) fn session_for(user: &AuthUser, expires_at: Timestamp) -> Session {
    Session {
        access_token: "access".into(),
        refresh_token: "refresh".into(),
        expires_at,
        user: user.clone(),
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Content generator with switchable failures and call counters.
#[derive(Default)]
pub(crate) struct FakeContent {
    pub fail_story: Mutex<Option<ContentError>>,
    /// Page numbers (1-based, by call order) whose illustration fails.
    pub fail_illustrations: Mutex<Vec<u32>>,
    pub fail_narration: Mutex<Option<ContentError>>,
    pub illustration_calls: AtomicU32,
    pub narration_calls: AtomicU32,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentGenerator for FakeContent {
    async fn generate_story(&self, params: &StoryParameters) -> Result<GeneratedStory, ContentError> {
        if let Some(error) = self.fail_story.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(GeneratedStory {
            title: "Mei and the Lantern".into(),
            pages: (1..=params.page_count.get())
                .map(|n| GeneratedPage {
                    text: format!("Page {n} of the story."),
                    illustration_prompt: format!("Scene {n}"),
                })
                .collect(),
        })
    }

    async fn generate_illustration(&self, prompt: &str) -> Result<Illustration, ContentError> {
        let call = self.illustration_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_illustrations.lock().unwrap().contains(&call) {
            return Err(ContentError::Blocked {
                reason: "IMAGE_SAFETY".into(),
            });
        }
        Ok(Illustration {
            bytes: format!("png-{call}").into_bytes(),
            mime_type: "image/png".into(),
        })
    }

    async fn generate_narration(
        &self,
        text: &str,
        _language: Language,
    ) -> Result<Narration, ContentError> {
        self.narration_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_narration.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(Narration {
            wav: format!("wav:{text}").into_bytes(),
            sample_rate: 24_000,
        })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Which backend operations should fail.
#[derive(Default, Clone)]
pub(crate) struct Failures {
    pub create_book: bool,
    pub update_book: bool,
    pub delete_book: bool,
    pub insert_page_number: Option<u32>,
    pub update_page: bool,
    pub upload: bool,
    pub download: bool,
    pub upsert_profile: bool,
    pub refresh: bool,
}

fn unavailable() -> StoreError {
    StoreError::Provider {
        status: 503,
        message: "unavailable".into(),
    }
}

/// Books, pages, profiles, and objects held in memory.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub books: Mutex<Vec<Book>>,
    pub pages: Mutex<HashMap<BookId, Vec<Page>>>,
    pub profiles: Mutex<Vec<Profile>>,
    pub objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    pub failures: Mutex<Failures>,
    pub signed_out: Mutex<Vec<String>>,
    pub refreshes: AtomicU32,
}

impl FakeBackend {
    pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.failures.lock().unwrap());
    }

    fn failures(&self) -> Failures {
        self.failures.lock().unwrap().clone()
    }

    pub fn book(&self, id: BookId) -> Option<Book> {
        self.books.lock().unwrap().iter().find(|b| b.id == id).cloned()
    }

    pub fn stored_pages(&self, id: BookId) -> Vec<Page> {
        self.pages.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn put_object(&self, key: &StorageKey, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), "application/octet-stream".into()));
    }
}

#[async_trait]
impl BookRepository for FakeBackend {
    async fn create_book(&self, book: &Book) -> Result<Book, StoreError> {
        if self.failures().create_book {
            return Err(unavailable());
        }
        self.books.lock().unwrap().push(book.clone());
        Ok(book.clone())
    }

    async fn update_book(&self, book: &Book) -> Result<Book, StoreError> {
        if self.failures().update_book {
            return Err(unavailable());
        }
        let mut books = self.books.lock().unwrap();
        let slot = books.iter_mut().find(|b| b.id == book.id).ok_or_else(|| StoreError::NotFound {
            entity: "book",
            id: book.id.to_string(),
        })?;
        *slot = book.clone();
        Ok(book.clone())
    }

    async fn list_books(&self, owner: UserId) -> Result<Vec<Book>, StoreError> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: BookId) -> Result<Book, StoreError> {
        self.book(id).ok_or_else(|| StoreError::NotFound {
            entity: "book",
            id: id.to_string(),
        })
    }

    async fn delete_book(&self, id: BookId) -> Result<(), StoreError> {
        if self.failures().delete_book {
            return Err(unavailable());
        }
        self.pages.lock().unwrap().remove(&id);
        let mut books = self.books.lock().unwrap();
        let before = books.len();
        books.retain(|b| b.id != id);
        if books.len() == before {
            return Err(StoreError::NotFound {
                entity: "book",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_page(&self, page: &Page) -> Result<Page, StoreError> {
        if self.failures().insert_page_number == Some(page.number) {
            return Err(unavailable());
        }
        self.pages
            .lock()
            .unwrap()
            .entry(page.book_id)
            .or_default()
            .push(page.clone());
        Ok(page.clone())
    }

    async fn update_page(&self, page: &Page) -> Result<Page, StoreError> {
        if self.failures().update_page {
            return Err(unavailable());
        }
        let mut pages = self.pages.lock().unwrap();
        let slot = pages
            .get_mut(&page.book_id)
            .and_then(|pages| pages.iter_mut().find(|p| p.id == page.id))
            .ok_or_else(|| StoreError::NotFound {
                entity: "page",
                id: page.id.to_string(),
            })?;
        *slot = page.clone();
        Ok(page.clone())
    }

    async fn list_pages(&self, book: BookId) -> Result<Vec<Page>, StoreError> {
        let mut pages = self.stored_pages(book);
        pages.sort_by_key(|p| p.number);
        Ok(pages)
    }
}

#[async_trait]
impl ProfileRepository for FakeBackend {
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user)
            .cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        if self.failures().upsert_profile {
            return Err(unavailable());
        }
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.iter_mut().find(|p| p.user_id == profile.user_id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        Ok(profile.clone())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        Ok(self.profiles.lock().unwrap().clone())
    }
}

#[async_trait]
impl ObjectStore for FakeBackend {
    async fn upload(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if self.failures().upload {
            return Err(unavailable());
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn download(&self, key: &StorageKey) -> Result<Vec<u8>, StoreError> {
        if self.failures().download {
            return Err(unavailable());
        }
        self.objects
            .lock()
            .unwrap()
            .get(key.as_str())
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                entity: "object",
                id: key.to_string(),
            })
    }

    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key.as_str());
        }
        Ok(())
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!("https://cdn.test/{key}")
    }
}

#[async_trait]
impl AuthProvider for FakeBackend {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, StoreError> {
        Ok(SignUpOutcome::ConfirmationRequired {
            user: AuthUser {
                id: UserId::new_random(),
                email: Some(credentials.email.clone()),
            },
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError> {
        if credentials.password() != "correct horse" {
            return Err(StoreError::Unauthorized("Invalid login credentials".into()));
        }
        let user = AuthUser {
            id: UserId::new_random(),
            email: Some(credentials.email.clone()),
        };
        Ok(session_for(&user, Timestamp::now().plus_seconds(3600)))
    }

    async fn refresh(&self, session: &Session) -> Result<Session, StoreError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.failures().refresh {
            return Err(StoreError::Unauthorized("refresh token revoked".into()));
        }
        let mut fresh = session_for(&session.user, Timestamp::now().plus_seconds(3600));
        fresh.access_token = format!("{}-renewed", session.access_token);
        Ok(fresh)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), StoreError> {
        self.signed_out
            .lock()
            .unwrap()
            .push(session.access_token.clone());
        Ok(())
    }

    async fn current_user(&self, session: &Session) -> Result<AuthUser, StoreError> {
        Ok(session.user.clone())
    }

    async fn request_password_reset(&self, _email: &Email) -> Result<(), StoreError> {
        Ok(())
    }
}
