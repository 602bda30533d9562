//! The signed-in user's books, cached locally and edited optimistically.
//!
//! Every mutation is applied to the cache first and then persisted. When
//! persistence fails the cache is restored to its previous state and the
//! error is returned, so the cache never shows a change the backend rejected.

use std::{collections::HashMap, sync::Arc};

use storybook::{
    prompts, Book, BookId, BookRepository, ContentGenerator, GeneratedPage, Narration,
    ObjectStore, Page, StorageKey, StoreError, StorybookError, UserId, MAX_FIELD_LEN,
};
use tracing::{debug, instrument, warn};

pub struct Library {
    owner: UserId,
    books: Arc<dyn BookRepository>,
    storage: Arc<dyn ObjectStore>,
    entries: Vec<Book>,
    pages: HashMap<BookId, Vec<Page>>,
}

fn validate_text(
    field: &'static str,
    value: &str,
    max: Option<usize>,
) -> Result<String, StorybookError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StorybookError::InvalidParameters {
            field,
            reason: "must not be empty".into(),
        });
    }
    if let Some(max) = max {
        if trimmed.chars().count() > max {
            return Err(StorybookError::InvalidParameters {
                field,
                reason: format!("must be at most {max} characters"),
            });
        }
    }
    Ok(trimmed.to_string())
}

fn page_not_found(book: BookId, number: u32) -> StorybookError {
    StoreError::NotFound {
        entity: "page",
        id: format!("{book}#{number}"),
    }
    .into()
}

impl Library {
    pub fn new(
        owner: UserId,
        books: Arc<dyn BookRepository>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            owner,
            books,
            storage,
            entries: Vec::new(),
            pages: HashMap::new(),
        }
    }

    /// Cached books, newest first once [`Library::refresh`] has run.
    pub fn books(&self) -> &[Book] {
        &self.entries
    }

    /// Replaces the cache with the owner's books from the backend.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn refresh(&mut self) -> Result<&[Book], StorybookError> {
        self.entries = self.books.list_books(self.owner).await?;
        self.pages.clear();
        debug!(count = self.entries.len(), "loaded library");
        Ok(&self.entries)
    }

    /// Looks a book up in the cache, fetching it when absent.
    pub async fn book(&mut self, id: BookId) -> Result<&Book, StorybookError> {
        let index = self.index_of(id).await?;
        Ok(&self.entries[index])
    }

    /// Pages of `id` in reading order.
    pub async fn pages(&mut self, id: BookId) -> Result<&[Page], StorybookError> {
        self.load_pages(id).await?;
        Ok(self.pages.get(&id).map(Vec::as_slice).unwrap_or_default())
    }

    async fn index_of(&mut self, id: BookId) -> Result<usize, StorybookError> {
        if let Some(index) = self.entries.iter().position(|b| b.id == id) {
            return Ok(index);
        }
        let book = self.books.get_book(id).await?;
        self.entries.push(book);
        Ok(self.entries.len() - 1)
    }

    async fn load_pages(&mut self, id: BookId) -> Result<(), StorybookError> {
        if !self.pages.contains_key(&id) {
            let mut pages = self.books.list_pages(id).await?;
            pages.sort_by_key(|p| p.number);
            self.pages.insert(id, pages);
        }
        Ok(())
    }

    fn page_index(&self, book: BookId, number: u32) -> Result<usize, StorybookError> {
        self.pages
            .get(&book)
            .and_then(|pages| pages.iter().position(|p| p.number == number))
            .ok_or_else(|| page_not_found(book, number))
    }

    /// Renames a book.
    #[instrument(skip(self, title))]
    pub async fn rename(&mut self, id: BookId, title: &str) -> Result<&Book, StorybookError> {
        let title = validate_text("title", title, Some(MAX_FIELD_LEN))?;
        let index = self.index_of(id).await?;

        let previous = std::mem::replace(&mut self.entries[index].title, title);
        let result = self.books.update_book(&self.entries[index]).await;
        match result {
            Ok(saved) => {
                self.entries[index] = saved;
                Ok(&self.entries[index])
            }
            Err(error) => {
                warn!(book = %id, %error, "rename rejected, restoring title");
                self.entries[index].title = previous;
                Err(error.into())
            }
        }
    }

    /// Deletes a book and then its stored assets.
    ///
    /// Asset clean-up runs only after the row is gone; a failure there leaves
    /// orphaned objects and is logged rather than returned.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: BookId) -> Result<(), StorybookError> {
        let index = self.index_of(id).await?;
        let cached_pages = match self.load_pages(id).await {
            Ok(()) => self.pages.remove(&id),
            Err(error) => {
                warn!(book = %id, %error, "could not list pages, their assets may be orphaned");
                None
            }
        };
        let book = self.entries.remove(index);

        if let Err(error) = self.books.delete_book(id).await {
            warn!(book = %id, %error, "delete rejected, restoring book");
            self.entries.insert(index, book);
            if let Some(pages) = cached_pages {
                self.pages.insert(id, pages);
            }
            return Err(error.into());
        }

        let mut keys: Vec<StorageKey> = cached_pages
            .iter()
            .flatten()
            .flat_map(|p| [p.image.clone(), p.audio.clone()])
            .flatten()
            .collect();
        if let Some(cover) = book.cover_image {
            if !keys.contains(&cover) {
                keys.push(cover);
            }
        }
        if let Err(error) = self.storage.remove(&keys).await {
            warn!(book = %id, %error, count = keys.len(), "could not remove book assets");
        }
        Ok(())
    }

    /// Replaces the text of page `number`.
    #[instrument(skip(self, text))]
    pub async fn edit_page_text(
        &mut self,
        book: BookId,
        number: u32,
        text: &str,
    ) -> Result<&Page, StorybookError> {
        let text = validate_text("text", text, None)?;
        self.index_of(book).await?;
        self.load_pages(book).await?;
        let index = self.page_index(book, number)?;

        self.update_page_with(book, index, |page| page.text = text)
            .await
    }

    /// Draws a fresh illustration for page `number` from its current text.
    #[instrument(skip(self, content))]
    pub async fn regenerate_illustration(
        &mut self,
        content: &dyn ContentGenerator,
        book: BookId,
        number: u32,
    ) -> Result<&Page, StorybookError> {
        let book_index = self.index_of(book).await?;
        self.load_pages(book).await?;
        let index = self.page_index(book, number)?;

        let record = self.entries[book_index].clone();
        let text = self.pages[&book][index].text.clone();
        let prompt = prompts::illustration_prompt(
            &record.parameters,
            &record.title,
            &GeneratedPage {
                illustration_prompt: text.clone(),
                text,
            },
        );
        let illustration = content.generate_illustration(&prompt).await?;
        let key = StorageKey::for_page_asset(record.owner, book, number, illustration.extension());
        self.storage
            .upload(&key, illustration.bytes, &illustration.mime_type)
            .await?;

        self.update_page_with(book, index, |page| page.image = Some(key.clone()))
            .await?;

        // The cover follows page 1 only once the page itself points at the new
        // image.
        if number == 1 && record.cover_image.as_ref() != Some(&key) {
            let mut with_cover = record;
            with_cover.cover_image = Some(key);
            match self.books.update_book(&with_cover).await {
                Ok(saved) => self.entries[book_index] = saved,
                Err(error) => warn!(%book, %error, "could not update cover image"),
            }
        }
        Ok(&self.pages[&book][index])
    }

    /// Records fresh narration for page `number` from its current text.
    #[instrument(skip(self, content))]
    pub async fn regenerate_narration(
        &mut self,
        content: &dyn ContentGenerator,
        book: BookId,
        number: u32,
    ) -> Result<&Page, StorybookError> {
        let book_index = self.index_of(book).await?;
        self.load_pages(book).await?;
        let index = self.page_index(book, number)?;

        let record = &self.entries[book_index];
        let (owner, language) = (record.owner, record.parameters.language);
        let narration = content
            .generate_narration(&self.pages[&book][index].text, language)
            .await?;
        let key = StorageKey::for_page_asset(owner, book, number, "wav");
        self.storage
            .upload(&key, narration.wav, Narration::MIME_TYPE)
            .await?;

        self.update_page_with(book, index, |page| page.audio = Some(key))
            .await
    }

    /// Applies `change` to a cached page, persists it, and restores the
    /// previous page if the backend rejects it.
    async fn update_page_with(
        &mut self,
        book: BookId,
        index: usize,
        change: impl FnOnce(&mut Page),
    ) -> Result<&Page, StorybookError> {
        let pages = self
            .pages
            .get_mut(&book)
            .ok_or_else(|| page_not_found(book, index as u32 + 1))?;
        let previous = pages[index].clone();
        change(&mut pages[index]);

        let result = self.books.update_page(&pages[index]).await;
        match result {
            Ok(saved) => {
                pages[index] = saved;
                Ok(&pages[index])
            }
            Err(error) => {
                warn!(%book, page = previous.number, %error, "page update rejected, restoring");
                pages[index] = previous;
                Err(error.into())
            }
        }
    }
}
