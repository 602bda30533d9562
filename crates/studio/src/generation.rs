//! End-to-end book generation.

use std::sync::Arc;

use storybook::{
    prompts, Book, BookRepository, BookStatus, ContentError, ContentGenerator, GeneratedPage,
    GeneratedStory, Narration, ObjectStore, Page, StorageKey, StoryParameters, StorybookError,
    UserId,
};
use tracing::{info, instrument, warn};

/// Which asset of a page failed to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Illustration,
    Narration,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Illustration => "illustration",
            Self::Narration => "narration",
        })
    }
}

/// A page saved without one of its assets.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFailure {
    pub page: u32,
    pub asset: AssetKind,
    pub error: ContentError,
}

/// Progress events emitted while a book is generated.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationProgress {
    StoryWritten { title: String, pages: u32 },
    PageStarted { number: u32, total: u32 },
    AssetFailed(AssetFailure),
    PageSaved { number: u32 },
    Finished { book: Book },
}

/// Outcome of a successful generation run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub book: Book,
    pub pages: Vec<Page>,
    /// Assets that could not be generated; their pages were saved without them.
    pub asset_failures: Vec<AssetFailure>,
}

/// Turns story parameters into a persisted, illustrated book.
pub struct BookGenerator {
    content: Arc<dyn ContentGenerator>,
    books: Arc<dyn BookRepository>,
    storage: Arc<dyn ObjectStore>,
}

impl BookGenerator {
    pub fn new(
        content: Arc<dyn ContentGenerator>,
        books: Arc<dyn BookRepository>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            content,
            books,
            storage,
        }
    }

    /// Writes the story, creates the book row, then illustrates, narrates, and
    /// saves every page in order.
    ///
    /// Illustration and narration failures are recorded in the report and do
    /// not stop the run. Any persistence failure after the book row exists
    /// marks the book [`BookStatus::Failed`] and is returned.
    #[instrument(skip(self, params, progress), fields(pages = params.page_count.get()))]
    pub async fn generate(
        &self,
        owner: UserId,
        params: &StoryParameters,
        progress: &(dyn Fn(GenerationProgress) + Send + Sync),
    ) -> Result<GenerationReport, StorybookError> {
        params.validate()?;

        let story = self.content.generate_story(params).await?;
        progress(GenerationProgress::StoryWritten {
            title: story.title.clone(),
            pages: story.pages.len() as u32,
        });

        let book = Book::new_generating(owner, story.title.clone(), params.clone());
        let book = self.books.create_book(&book).await?;
        info!(book = %book.id, title = %book.title, "created book");

        match self.fill(&book, &story, progress).await {
            Ok((pages, asset_failures)) => {
                let mut finished = book;
                finished.cover_image = pages.first().and_then(|p| p.image.clone());
                finished.status = BookStatus::Complete;
                let finished = match self.books.update_book(&finished).await {
                    Ok(saved) => saved,
                    Err(error) => {
                        self.mark_failed(finished).await;
                        return Err(error.into());
                    }
                };
                progress(GenerationProgress::Finished {
                    book: finished.clone(),
                });
                Ok(GenerationReport {
                    book: finished,
                    pages,
                    asset_failures,
                })
            }
            Err(error) => {
                self.mark_failed(book).await;
                Err(error)
            }
        }
    }

    async fn fill(
        &self,
        book: &Book,
        story: &GeneratedStory,
        progress: &(dyn Fn(GenerationProgress) + Send + Sync),
    ) -> Result<(Vec<Page>, Vec<AssetFailure>), StorybookError> {
        let total = story.pages.len() as u32;
        let mut pages = Vec::with_capacity(story.pages.len());
        let mut failures = Vec::new();

        for (generated, number) in story.pages.iter().zip(1..) {
            progress(GenerationProgress::PageStarted { number, total });
            let mut page = Page::new(book.id, number, generated.text.trim());

            let mut record = |asset, error: ContentError| {
                warn!(page = number, %asset, %error, "saving page without asset");
                let failure = AssetFailure {
                    page: number,
                    asset,
                    error,
                };
                progress(GenerationProgress::AssetFailed(failure.clone()));
                failures.push(failure);
            };

            match self.illustrate(book, generated, number).await {
                Ok(key) => page.image = Some(key),
                Err(StorybookError::Content(error)) => record(AssetKind::Illustration, error),
                Err(other) => return Err(other),
            }

            if book.parameters.narration {
                match self.narrate(book, &page).await {
                    Ok(key) => page.audio = Some(key),
                    Err(StorybookError::Content(error)) => record(AssetKind::Narration, error),
                    Err(other) => return Err(other),
                }
            }

            let saved = self.books.insert_page(&page).await?;
            progress(GenerationProgress::PageSaved { number });
            pages.push(saved);
        }

        Ok((pages, failures))
    }

    async fn illustrate(
        &self,
        book: &Book,
        generated: &GeneratedPage,
        number: u32,
    ) -> Result<StorageKey, StorybookError> {
        let prompt = prompts::illustration_prompt(&book.parameters, &book.title, generated);
        let illustration = self.content.generate_illustration(&prompt).await?;
        let key = StorageKey::for_page_asset(book.owner, book.id, number, illustration.extension());
        self.storage
            .upload(&key, illustration.bytes, &illustration.mime_type)
            .await?;
        Ok(key)
    }

    async fn narrate(&self, book: &Book, page: &Page) -> Result<StorageKey, StorybookError> {
        let narration = self
            .content
            .generate_narration(&page.text, book.parameters.language)
            .await?;
        let key = StorageKey::for_page_asset(book.owner, book.id, page.number, "wav");
        self.storage
            .upload(&key, narration.wav, Narration::MIME_TYPE)
            .await?;
        Ok(key)
    }

    /// Best effort: the original error is what the caller sees.
    async fn mark_failed(&self, mut book: Book) {
        book.status = BookStatus::Failed;
        if let Err(error) = self.books.update_book(&book).await {
            warn!(book = %book.id, %error, "could not mark book as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{parameters, FakeBackend, FakeContent};

    fn generator(content: &Arc<FakeContent>, backend: &Arc<FakeBackend>) -> BookGenerator {
        BookGenerator::new(content.clone(), backend.clone(), backend.clone())
    }

    #[tokio::test]
    async fn generates_a_complete_book_with_assets_for_every_page() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        let owner = UserId::new_random();
        let events = Mutex::new(Vec::new());

        let report = generator(&content, &backend)
            .generate(owner, &parameters(3), &|e| events.lock().unwrap().push(e))
            .await
            .unwrap();

        assert_eq!(report.book.status, BookStatus::Complete);
        assert_eq!(report.pages.len(), 3);
        assert!(report.asset_failures.is_empty());
        assert_eq!(report.book.cover_image, report.pages[0].image);
        assert_eq!(
            report.pages[1].image.as_ref().unwrap().as_str(),
            format!("{owner}/{}/page-02.png", report.book.id)
        );
        assert_eq!(
            report.pages[2].audio.as_ref().unwrap().as_str(),
            format!("{owner}/{}/page-03.wav", report.book.id)
        );
        assert_eq!(backend.object_keys().len(), 6);
        assert_eq!(backend.book(report.book.id).unwrap().status, BookStatus::Complete);

        let events = events.into_inner().unwrap();
        assert!(matches!(events.first(), Some(GenerationProgress::StoryWritten { pages: 3, .. })));
        assert!(matches!(events.last(), Some(GenerationProgress::Finished { .. })));
        let saved = events
            .iter()
            .filter(|e| matches!(e, GenerationProgress::PageSaved { .. }))
            .count();
        assert_eq!(saved, 3);
    }

    #[tokio::test]
    async fn failed_illustration_is_recorded_and_the_page_is_still_saved() {
        let content = Arc::new(FakeContent::default());
        content.fail_illustrations.lock().unwrap().push(2);
        let backend = Arc::new(FakeBackend::default());

        let report = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|_| {})
            .await
            .unwrap();

        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.pages[1].image, None);
        assert!(report.pages[1].audio.is_some());
        assert_eq!(report.asset_failures.len(), 1);
        assert_eq!(report.asset_failures[0].page, 2);
        assert_eq!(report.asset_failures[0].asset, AssetKind::Illustration);
        assert_eq!(report.book.status, BookStatus::Complete);
    }

    #[tokio::test]
    async fn failed_narration_is_recorded_for_every_page_and_the_book_completes() {
        let content = Arc::new(FakeContent::default());
        *content.fail_narration.lock().unwrap() = Some(ContentError::Provider {
            status: 400,
            message: "voice not available".into(),
        });
        let backend = Arc::new(FakeBackend::default());
        let events = Mutex::new(Vec::new());

        let report = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|e| {
                events.lock().unwrap().push(e)
            })
            .await
            .unwrap();

        assert_eq!(report.book.status, BookStatus::Complete);
        assert_eq!(report.pages.len(), 3);
        assert!(report.pages.iter().all(|p| p.audio.is_none() && p.image.is_some()));
        assert_eq!(report.asset_failures.len(), 3);
        assert!(report
            .asset_failures
            .iter()
            .all(|f| f.asset == AssetKind::Narration));
        assert_eq!(
            backend
                .stored_pages(report.book.id)
                .iter()
                .filter(|p| p.audio.is_none())
                .count(),
            3
        );
        let reported = events
            .into_inner()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, GenerationProgress::AssetFailed(_)))
            .count();
        assert_eq!(reported, 3);
    }

    #[tokio::test]
    async fn rejected_book_row_stops_before_any_asset_is_made() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        backend.fail(|f| f.create_book = true);

        let err = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::Store(_)));
        assert!(backend.books.lock().unwrap().is_empty());
        assert!(backend.object_keys().is_empty());
        assert_eq!(
            content
                .illustration_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn narration_is_skipped_when_disabled() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        let mut params = parameters(3);
        params.narration = false;

        let report = generator(&content, &backend)
            .generate(UserId::new_random(), &params, &|_| {})
            .await
            .unwrap();

        assert!(report.pages.iter().all(|p| p.audio.is_none()));
        assert_eq!(
            content
                .narration_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_generator() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        let mut params = parameters(3);
        params.theme = "  ".into();

        let err = generator(&content, &backend)
            .generate(UserId::new_random(), &params, &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::InvalidParameters { field: "theme", .. }));
        assert!(backend.books.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn story_failure_creates_no_book() {
        let content = Arc::new(FakeContent::default());
        *content.fail_story.lock().unwrap() = Some(ContentError::RateLimited { retry_after: None });
        let backend = Arc::new(FakeBackend::default());

        let err = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::Content(ContentError::RateLimited { .. })));
        assert!(backend.books.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_marks_the_book_failed() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        backend.fail(|f| f.insert_page_number = Some(2));

        let err = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::Store(_)));
        let books = backend.books.lock().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].status, BookStatus::Failed);
    }

    #[tokio::test]
    async fn upload_failure_is_a_persistence_failure() {
        let content = Arc::new(FakeContent::default());
        let backend = Arc::new(FakeBackend::default());
        backend.fail(|f| f.upload = true);

        let err = generator(&content, &backend)
            .generate(UserId::new_random(), &parameters(3), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::Store(_)));
        assert_eq!(backend.books.lock().unwrap()[0].status, BookStatus::Failed);
    }
}
