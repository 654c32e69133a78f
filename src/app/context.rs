use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{LensError, Result};
use crate::client::{HttpContentService, ParallelSearcher, SharedService};
use crate::config::Config;
use crate::domain::settings::keys;
use crate::domain::FontSize;
use crate::interests::InterestsStore;
use crate::normalizer::Normalizer;
use crate::store::sqlite::SqliteStore;
use crate::store::{load_setting, save_setting, SharedStore};
use crate::transform::{ComplexityStore, ExplainStore, SummaryStore, TranslationStore};

/// One reading session: the service, the persistent store and every state
/// store built on top of them.
pub struct AppContext {
    pub config: Config,
    pub store: SharedStore,
    pub service: SharedService,
    pub normalizer: Normalizer,
    pub interests: InterestsStore,
    pub complexity: ComplexityStore,
    pub translations: TranslationStore,
    pub summaries: SummaryStore,
    pub explain: ExplainStore,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store: SharedStore = Arc::new(SqliteStore::new(&db_path)?);
        let service: SharedService = Arc::new(HttpContentService::new(&config.api)?);
        Self::with_parts(config, service, store)
    }

    /// Session backed by an in-memory database, for tests and demos.
    pub fn in_memory(service: SharedService) -> Result<Self> {
        let store: SharedStore = Arc::new(SqliteStore::in_memory()?);
        Self::with_parts(Config::default(), service, store)
    }

    pub fn with_parts(config: Config, service: SharedService, store: SharedStore) -> Result<Self> {
        let params = config.transform.clone();
        let persist = config.cache.persist_transforms;

        let searcher = ParallelSearcher::with_workers(
            service.clone(),
            config.api.search_k,
            config.api.search_workers,
        );
        let interests = InterestsStore::load(searcher, store.clone())?;
        let complexity = ComplexityStore::load(service.clone(), store.clone(), params.clone())?;
        let translations =
            TranslationStore::load(service.clone(), store.clone(), params.clone(), persist)?;
        let summaries = SummaryStore::load(service.clone(), store.clone(), params.clone(), persist)?;
        let explain = ExplainStore::new(service.clone(), params);

        Ok(Self {
            config,
            store,
            service,
            normalizer: Normalizer::new(),
            interests,
            complexity,
            translations,
            summaries,
            explain,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| LensError::Config("Could not find data directory".into()))?;
        let lens_dir = data_dir.join("lens");
        std::fs::create_dir_all(&lens_dir)?;
        Ok(lens_dir.join("lens.db"))
    }

    pub fn font_size(&self) -> FontSize {
        load_setting(&*self.store, keys::FONT_SIZE)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub fn set_font_size(&self, size: FontSize) -> Result<()> {
        save_setting(&*self.store, keys::FONT_SIZE, &size)
    }

    /// Log out: cancel outstanding requests, then wipe every in-memory cache
    /// and the persisted state. Requests still running when this returns
    /// write nothing.
    pub fn reset(&self) -> Result<()> {
        self.interests.reset();
        self.complexity.reset();
        self.translations.reset();
        self.summaries.reset();
        self.explain.reset();
        self.store.clear()?;
        tracing::info!("Session reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;
    use crate::domain::{ArticleVersion, ComplexityLevel};

    fn ctx() -> AppContext {
        AppContext::in_memory(Arc::new(MockContentService::new())).unwrap()
    }

    #[test]
    fn test_font_size_defaults_to_medium() {
        let ctx = ctx();
        assert_eq!(ctx.font_size(), FontSize::Medium);

        ctx.set_font_size(FontSize::Large).unwrap();
        assert_eq!(ctx.font_size(), FontSize::Large);
    }

    #[test]
    fn test_unknown_font_size_is_ignored() {
        let ctx = ctx();
        ctx.store.set_setting(keys::FONT_SIZE, "\"huge\"").unwrap();
        assert_eq!(ctx.font_size(), FontSize::Medium);
    }

    #[test]
    fn test_reset_clears_everything() {
        let ctx = ctx();
        let ai = ctx.interests.interests()[5].clone();
        ctx.interests.add_interest(&ai);
        ctx.interests.set_has_selected_interests(true);
        let level = ComplexityLevel::new(2).unwrap();
        ctx.complexity
            .set_version("a1", level, ArticleVersion::new("t", "c"));
        ctx.summaries.add_summary("a1", "short");

        ctx.reset().unwrap();

        assert!(ctx.interests.selected_interests().is_empty());
        assert!(!ctx.interests.has_selected_interests());
        assert!(ctx.complexity.get_version("a1", level).is_none());
        assert!(ctx.summaries.get_summary("a1").is_none());
        assert!(ctx.store.get_selected_interests().unwrap().is_empty());
        assert!(ctx.store.get_article_versions().unwrap().is_empty());
    }
}
