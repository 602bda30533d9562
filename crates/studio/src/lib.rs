//! Storybook workflows.
//!
//! Sequences calls between the domain in the [`storybook`] crate and the port
//! traits it defines: generating a book page by page, editing the user's
//! library, managing accounts and brand settings, and gathering a book for
//! export.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Every dependency is a port trait object, so the
//! same workflows run against the hosted services or in-memory fakes. No
//! domain rules live here.

pub mod account;
pub mod admin;
pub mod export;
pub mod generation;
pub mod library;

#[cfg(test)]
mod testing;

pub use account::{AccountService, BrandUpdate, ProfileService, MAX_LOGO_BYTES};
pub use admin::AdminDirectory;
pub use export::{BookExporter, PageAudio};
pub use generation::{
    AssetFailure, AssetKind, BookGenerator, GenerationProgress, GenerationReport,
};
pub use library::Library;
