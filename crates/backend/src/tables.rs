//! [`BookRepository`] and [`ProfileRepository`] over the REST table API
//! (PostgREST).

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use storybook::{
    Book, BookId, BookRepository, Page, Profile, ProfileRepository, StoreError, UserId,
};
use tracing::instrument;

use crate::{
    client::{json, send, AuthorizedClient},
    rows::{BookPatch, BookRow, PagePatch, PageRow, ProfileRow},
};

const BOOKS: &str = "books";
const PAGES: &str = "pages";
const PROFILES: &str = "profiles";

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT: &str = "resolution=merge-duplicates,return=representation";

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

impl AuthorizedClient {
    fn table(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        self.request(method, &format!("/rest/v1/{table}"))
    }

    async fn select<R: DeserializeOwned>(
        &self,
        table: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<R>, StoreError> {
        let request = self.table(Method::GET, table).query(&[("select", "*")]).query(query);
        json(send(request, table, "").await?).await
    }

    /// Selects by primary key; an empty result is [`StoreError::NotFound`].
    async fn select_one<R: DeserializeOwned>(
        &self,
        table: &'static str,
        entity: &'static str,
        column: &str,
        id: impl std::fmt::Display,
    ) -> Result<R, StoreError> {
        let id = id.to_string();
        let rows: Vec<R> = self.select(table, &[(column, eq(&id))]).await?;
        rows.into_iter()
            .next()
            .ok_or(StoreError::NotFound { entity, id })
    }

    async fn insert<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &'static str,
        entity: &'static str,
        row: &T,
        prefer: &str,
    ) -> Result<R, StoreError> {
        let request = self
            .table(Method::POST, table)
            .header("Prefer", prefer)
            .json(row);
        first(json(send(request, entity, "").await?).await?, entity, "")
    }

    async fn patch<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &'static str,
        entity: &'static str,
        id: impl std::fmt::Display,
        row: &T,
    ) -> Result<R, StoreError> {
        let id = id.to_string();
        let request = self
            .table(Method::PATCH, table)
            .query(&[("id", eq(&id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row);
        // Row-level security filters instead of failing, so a patch that
        // matched nothing comes back as an empty array.
        first(json(send(request, entity, &id).await?).await?, entity, &id)
    }
}

fn first<R>(rows: Vec<R>, entity: &'static str, id: &str) -> Result<R, StoreError> {
    rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
        entity,
        id: id.to_string(),
    })
}

#[async_trait]
impl BookRepository for AuthorizedClient {
    #[instrument(skip_all, fields(book = %book.id))]
    async fn create_book(&self, book: &Book) -> Result<Book, StoreError> {
        let row: BookRow = self
            .insert(BOOKS, "book", &BookRow::from(book), RETURN_REPRESENTATION)
            .await?;
        row.try_into()
    }

    #[instrument(skip_all, fields(book = %book.id, status = %book.status))]
    async fn update_book(&self, book: &Book) -> Result<Book, StoreError> {
        let row: BookRow = self
            .patch(BOOKS, "book", book.id, &BookPatch::from(book))
            .await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn list_books(&self, owner: UserId) -> Result<Vec<Book>, StoreError> {
        let rows: Vec<BookRow> = self
            .select(
                BOOKS,
                &[
                    ("user_id", eq(owner)),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await?;
        rows.into_iter().map(Book::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_book(&self, id: BookId) -> Result<Book, StoreError> {
        let row: BookRow = self.select_one(BOOKS, "book", "id", id).await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn delete_book(&self, id: BookId) -> Result<(), StoreError> {
        let request = self
            .table(Method::DELETE, BOOKS)
            .query(&[("id", eq(id))])
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<BookRow> = json(send(request, "book", id).await?).await?;
        first(deleted, "book", &id.to_string()).map(|_| ())
    }

    #[instrument(skip_all, fields(book = %page.book_id, number = page.number))]
    async fn insert_page(&self, page: &Page) -> Result<Page, StoreError> {
        let row: PageRow = self
            .insert(PAGES, "page", &PageRow::from(page), RETURN_REPRESENTATION)
            .await?;
        Ok(row.into())
    }

    #[instrument(skip_all, fields(page = %page.id))]
    async fn update_page(&self, page: &Page) -> Result<Page, StoreError> {
        let row: PageRow = self
            .patch(PAGES, "page", page.id, &PagePatch::from(page))
            .await?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_pages(&self, book: BookId) -> Result<Vec<Page>, StoreError> {
        let rows: Vec<PageRow> = self
            .select(
                PAGES,
                &[
                    ("book_id", eq(book)),
                    ("order", "page_number.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }
}

#[async_trait]
impl ProfileRepository for AuthorizedClient {
    #[instrument(skip(self))]
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        match self.select_one::<ProfileRow>(PROFILES, "profile", "id", user).await {
            Ok(row) => row.try_into().map(Some),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(user = %profile.user_id))]
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        let row: ProfileRow = self
            .insert(PROFILES, "profile", &ProfileRow::from(profile), UPSERT)
            .await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let rows: Vec<ProfileRow> = self
            .select(PROFILES, &[("order", "created_at.asc".to_string())])
            .await?;
        rows.into_iter().map(Profile::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_filters_use_postgrest_syntax() {
        let id = BookId::new_random();
        assert_eq!(eq(id), format!("eq.{id}"));
    }

    #[test]
    fn first_reports_empty_results_as_not_found() {
        let rows: Vec<u8> = Vec::new();
        assert_eq!(
            first(rows, "page", "p1"),
            Err(StoreError::NotFound {
                entity: "page",
                id: "p1".into()
            })
        );
        assert_eq!(first(vec![3, 4], "page", "p1"), Ok(3));
    }
}
