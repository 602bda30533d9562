//! Gathers a stored book and its assets for rendering.

use std::sync::Arc;

use render::{BookExport, ExportPage};
use storybook::{BookId, BookRepository, BrandSettings, ObjectStore, StorageKey, StorybookError};
use tracing::{instrument, warn};

/// Narration audio of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAudio {
    pub number: u32,
    pub wav: Vec<u8>,
}

pub struct BookExporter {
    books: Arc<dyn BookRepository>,
    storage: Arc<dyn ObjectStore>,
}

impl BookExporter {
    pub fn new(books: Arc<dyn BookRepository>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { books, storage }
    }

    /// Loads `id`, its pages, their illustrations, and the brand logo.
    ///
    /// Missing assets are logged and left out; the book still renders.
    #[instrument(skip(self, brand))]
    pub async fn assemble(
        &self,
        id: BookId,
        brand: &BrandSettings,
    ) -> Result<BookExport, StorybookError> {
        let book = self.books.get_book(id).await?;
        let mut pages = self.books.list_pages(id).await?;
        pages.sort_by_key(|p| p.number);

        let mut export_pages = Vec::with_capacity(pages.len());
        for page in pages {
            let illustration = self.fetch(page.image.as_ref()).await;
            export_pages.push(ExportPage { page, illustration });
        }
        let logo = self.fetch(brand.logo.as_ref()).await;

        Ok(BookExport {
            book,
            pages: export_pages,
            logo,
        })
    }

    /// Downloads the narration of every page that has one.
    #[instrument(skip(self))]
    pub async fn narration(&self, id: BookId) -> Result<Vec<PageAudio>, StorybookError> {
        let mut pages = self.books.list_pages(id).await?;
        pages.sort_by_key(|p| p.number);

        let mut audio = Vec::new();
        for page in pages {
            if let Some(wav) = self.fetch(page.audio.as_ref()).await {
                audio.push(PageAudio {
                    number: page.number,
                    wav,
                });
            }
        }
        Ok(audio)
    }

    async fn fetch(&self, key: Option<&StorageKey>) -> Option<Vec<u8>> {
        let key = key?;
        match self.storage.download(key).await {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                warn!(%key, %error, "asset unavailable, leaving it out");
                None
            }
        }
    }
}
