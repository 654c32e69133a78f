pub mod sqlite;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::Result;
use crate::domain::{ArticleVersion, ComplexityLevel, Interest, Language, Translation};

pub use sqlite::SqliteStore;

pub type SharedStore = Arc<dyn Store + Send + Sync>;

pub trait Store {
    // Interest selection
    fn get_selected_interests(&self) -> Result<Vec<Interest>>;
    fn add_selected_interest(&self, interest: &Interest) -> Result<()>;
    fn remove_selected_interest(&self, id: &str) -> Result<()>;

    // Blog-description signals
    fn get_blog_descriptions(&self) -> Result<Vec<String>>;
    fn add_blog_description(&self, text: &str) -> Result<()>;
    fn remove_blog_description(&self, text: &str) -> Result<()>;

    // Settings (JSON-encoded values)
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    // Transform caches
    fn get_article_versions(&self) -> Result<Vec<(String, ComplexityLevel, ArticleVersion)>>;
    fn put_article_version(
        &self,
        article_id: &str,
        level: ComplexityLevel,
        version: &ArticleVersion,
    ) -> Result<()>;
    fn get_translations(&self) -> Result<Vec<(String, Language, Translation)>>;
    fn put_translation(
        &self,
        blog_id: &str,
        language: &Language,
        translation: &Translation,
    ) -> Result<()>;
    fn get_summaries(&self) -> Result<Vec<(String, String)>>;
    fn put_summary(&self, blog_id: &str, summary: &str) -> Result<()>;

    /// Forget everything (logout/reset).
    fn clear(&self) -> Result<()>;
}

pub fn load_setting<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    match store.get_setting(key)? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable setting {}: {}", key, e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub fn save_setting<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set_setting(key, &raw)
}
