//! # Lens
//!
//! A reader for startup articles that adapts each article to the reader:
//! rewritten at a chosen complexity level, translated, summarized, or
//! explained passage by passage.
//!
//! ## Architecture
//!
//! ```text
//! Content service → Normalizer → Stores (interests, transforms) → Reader
//!                                   ↕
//!                                 SQLite
//! ```
//!
//! - [`client`]: The remote content service (feeds, extraction, search, text operations)
//! - [`interests`]: Interest selection and recommended-article search
//! - [`transform`]: Per-article caches of rewritten, translated and summarized text
//! - [`reader`]: View model of one open article
//! - [`store`]: SQLite persistence layer
//!
//! ## Quick Start
//!
//! ```bash
//! # Pick topics and get recommendations
//! lens interests add AI
//! lens interests done
//!
//! # Read an article at level 2, in Hindi
//! lens read <item-id> --level 2 --lang hindi
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the service,
/// the store and every state store.
pub mod app;

/// Shared building blocks of the stores: loading flags, single-flight
/// requests and request scopes.
pub mod cache;

/// Command-line interface using clap.
pub mod cli;

/// Client for the remote content service.
///
/// - [`ContentService`](client::ContentService): Async trait over the four endpoints
/// - [`HttpContentService`](client::HttpContentService): reqwest-based implementation
/// - [`ParallelSearcher`](client::ParallelSearcher): Concurrent searches with semaphore
/// - [`MockContentService`](client::MockContentService): In-process service for tests
pub mod client;

/// Configuration loaded from `~/.config/lens/config.toml`.
pub mod config;

/// Core domain models: feeds, articles, interests, search results and
/// transform parameters.
pub mod domain;

/// Interest selection and the search built from it.
pub mod interests;

/// Converts service feeds into display-ready articles.
pub mod normalizer;

/// View model of one open article.
pub mod reader;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Content-transform caches: complexity, translation, summary, explain.
pub mod transform;
