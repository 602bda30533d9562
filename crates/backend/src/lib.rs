//! Backend-as-a-service infrastructure adapter.
//!
//! Implements the persistence ports of the [`storybook`] crate against a
//! Supabase project:
//!
//! | Port | Service | Path prefix |
//! |------|---------|-------------|
//! | [`storybook::AuthProvider`] | GoTrue | `/auth/v1` |
//! | [`storybook::BookRepository`], [`storybook::ProfileRepository`] | PostgREST | `/rest/v1` |
//! | [`storybook::ObjectStore`] | Storage | `/storage/v1` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Header conventions, query syntax, row shapes, and
//! status-code mapping all live here. Access control is enforced by the
//! backend's row-level security; this crate never adds domain rules.

mod auth;
mod client;
pub mod rows;
mod storage;
mod tables;

pub use client::{AuthorizedClient, BackendConfig, SupabaseClient, DEFAULT_BUCKET};
