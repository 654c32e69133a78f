use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::{LensError, Result};
use crate::cache::{lock, LoadingSet, RequestScope, SingleFlight};
use crate::client::{GenerationParams, SharedService, TextOperation};
use crate::domain::settings::keys;
use crate::domain::{ArticleVersion, ComplexityLevel};
use crate::store::{load_setting, save_setting, SharedStore};

use super::transform_article;

pub const REWRITE_FAILED: &str = "Failed to load this complexity level. Please try again.";

type VersionKey = (String, ComplexityLevel);

struct ComplexityState {
    versions: HashMap<VersionKey, ArticleVersion>,
    level: ComplexityLevel,
    show_original: bool,
    last_error: Option<String>,
}

/// Article versions rewritten per complexity level, plus the reader's
/// current level and show-original choice.
#[derive(Clone)]
pub struct ComplexityStore {
    service: SharedService,
    store: SharedStore,
    params: GenerationParams,
    state: Arc<Mutex<ComplexityState>>,
    loading: LoadingSet<VersionKey>,
    flights: SingleFlight<VersionKey, ArticleVersion>,
}

impl ComplexityStore {
    /// Build the store from what was persisted in earlier sessions.
    pub fn load(service: SharedService, store: SharedStore, params: GenerationParams) -> Result<Self> {
        let versions = store
            .get_article_versions()?
            .into_iter()
            .map(|(article_id, level, version)| ((article_id, level), version))
            .collect::<HashMap<_, _>>();
        let level: ComplexityLevel = load_setting(&*store, keys::COMPLEXITY_LEVEL)?.unwrap_or_default();
        let show_original: bool = load_setting(&*store, keys::SHOW_ORIGINAL)?.unwrap_or(true);

        tracing::debug!(
            "Loaded {} article versions (level {}, show original {})",
            versions.len(),
            level.value(),
            show_original
        );

        Ok(Self {
            service,
            store,
            params,
            state: Arc::new(Mutex::new(ComplexityState {
                versions,
                level,
                show_original,
                last_error: None,
            })),
            loading: LoadingSet::new(),
            flights: SingleFlight::new(),
        })
    }

    pub fn get_version(&self, article_id: &str, level: ComplexityLevel) -> Option<ArticleVersion> {
        lock(&self.state)
            .versions
            .get(&(article_id.to_string(), level))
            .cloned()
    }

    /// Insert or replace the version for `(article_id, level)`.
    pub fn set_version(&self, article_id: &str, level: ComplexityLevel, version: ArticleVersion) {
        lock(&self.state)
            .versions
            .insert((article_id.to_string(), level), version.clone());
        self.persist_version(article_id, level, &version);
    }

    /// The version to display for `article_id`, or `None` when the original
    /// should be shown.
    pub fn get_article_version(&self, article_id: &str) -> Option<ArticleVersion> {
        let state = lock(&self.state);
        if state.show_original {
            return None;
        }
        state
            .versions
            .get(&(article_id.to_string(), state.level))
            .cloned()
    }

    pub fn complexity_level(&self) -> ComplexityLevel {
        lock(&self.state).level
    }

    pub fn set_complexity_level(&self, level: ComplexityLevel) {
        lock(&self.state).level = level;
        self.persist_setting(keys::COMPLEXITY_LEVEL, &level);
    }

    pub fn show_original(&self) -> bool {
        lock(&self.state).show_original
    }

    pub fn set_show_original(&self, show: bool) {
        lock(&self.state).show_original = show;
        self.persist_setting(keys::SHOW_ORIGINAL, &show);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.any()
    }

    pub fn is_loading_version(&self, article_id: &str, level: ComplexityLevel) -> bool {
        self.loading.is_loading(&(article_id.to_string(), level))
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).last_error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).last_error = None;
    }

    pub async fn request_version(
        &self,
        article_id: &str,
        level: ComplexityLevel,
        source: &ArticleVersion,
    ) -> Result<ArticleVersion> {
        self.request_version_scoped(article_id, level, source, &RequestScope::unscoped())
            .await
    }

    /// Switch the reader to `level`, rewriting `source` if that level has not
    /// been produced for this article yet.
    ///
    /// The level is adopted only once its version is available; on failure
    /// the previous level and version stay on display.
    pub async fn request_version_scoped(
        &self,
        article_id: &str,
        level: ComplexityLevel,
        source: &ArticleVersion,
        scope: &RequestScope,
    ) -> Result<ArticleVersion> {
        if let Some(version) = self.get_version(article_id, level) {
            self.adopt(level);
            return Ok(version);
        }

        let key = (article_id.to_string(), level);
        let guard = self.loading.acquire(key.clone());
        let this = self.clone();
        let task_key = key.clone();
        let source = source.clone();
        self.flights
            .run(key, scope, move |flight| async move {
                let _guard = guard;
                this.fetch_version(task_key, source, flight).await
            })
            .await
    }

    /// Runs as the shared flight for `key`. Nothing is written once `flight`
    /// is cancelled; the check happens under the state lock so a concurrent
    /// [`reset`](Self::reset) either sees the write or prevents it.
    async fn fetch_version(
        &self,
        key: VersionKey,
        source: ArticleVersion,
        flight: RequestScope,
    ) -> Result<ArticleVersion> {
        let (article_id, level) = (&key.0, key.1);

        // Another flight may have finished between the lookup and this one
        if let Some(version) = self.get_version(article_id, level) {
            self.adopt(level);
            return Ok(version);
        }

        tracing::debug!("Rewriting article {} at {}", article_id, level);
        let operation = TextOperation::Rewrite { level };
        let result = flight
            .guard(transform_article(&self.service, &self.params, &source, operation))
            .await;

        let mut state = lock(&self.state);
        if flight.is_cancelled() {
            tracing::debug!("Rewrite of article {} at {} cancelled", article_id, level);
            return Err(LensError::Cancelled);
        }
        match result {
            Ok(version) => {
                state.versions.insert(key.clone(), version.clone());
                state.level = level;
                state.show_original = false;
                state.last_error = None;
                self.persist_version(article_id, level, &version);
                self.persist_display(level, false);
                tracing::info!("Cached article {} at {}", article_id, level);
                Ok(version)
            }
            Err(e) => {
                tracing::warn!("Failed to rewrite article {} at {}: {}", article_id, level, e);
                state.last_error = Some(REWRITE_FAILED.to_string());
                Err(e)
            }
        }
    }

    fn adopt(&self, level: ComplexityLevel) {
        {
            let mut state = lock(&self.state);
            state.level = level;
            state.show_original = false;
        }
        self.persist_display(level, false);
    }

    /// Cancel outstanding rewrites and drop everything held in memory.
    /// Persistent rows are cleared by the owner of the store, after this.
    pub fn reset(&self) {
        self.flights.cancel_all();
        let mut state = lock(&self.state);
        state.versions.clear();
        state.level = ComplexityLevel::default();
        state.show_original = true;
        state.last_error = None;
        drop(state);
        self.loading.clear();
    }

    fn persist_version(&self, article_id: &str, level: ComplexityLevel, version: &ArticleVersion) {
        if let Err(e) = self.store.put_article_version(article_id, level, version) {
            tracing::warn!("Failed to persist article {} at {}: {}", article_id, level, e);
        }
    }

    fn persist_display(&self, level: ComplexityLevel, show_original: bool) {
        self.persist_setting(keys::COMPLEXITY_LEVEL, &level);
        self.persist_setting(keys::SHOW_ORIGINAL, &show_original);
    }

    fn persist_setting<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = save_setting(&*self.store, key, value) {
            tracing::warn!("Failed to persist setting {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;
    use crate::store::SqliteStore;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn level(value: u8) -> ComplexityLevel {
        ComplexityLevel::new(value).unwrap()
    }

    fn source() -> ArticleVersion {
        ArticleVersion::new("Seed rounds", "How seed rounds work.")
    }

    fn setup(mock: MockContentService) -> (Arc<MockContentService>, SharedStore, ComplexityStore) {
        let mock = Arc::new(mock);
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let complexity =
            ComplexityStore::load(mock.clone(), store.clone(), GenerationParams::default())
                .unwrap();
        (mock, store, complexity)
    }

    async fn settle(complexity: &ComplexityStore) {
        for _ in 0..500 {
            if !complexity.is_loading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[test]
    fn test_defaults() {
        let (_, _, complexity) = setup(MockContentService::new());
        assert_eq!(complexity.complexity_level(), ComplexityLevel::MIN);
        assert!(complexity.show_original());
        assert!(!complexity.is_loading());
        assert!(complexity.last_error().is_none());
    }

    #[test]
    fn test_set_then_get_version() {
        let (_, _, complexity) = setup(MockContentService::new());
        let version = ArticleVersion::new("Simple", "Short words.");

        complexity.set_version("a1", level(2), version.clone());
        assert_eq!(complexity.get_version("a1", level(2)), Some(version.clone()));
        assert_eq!(complexity.get_version("a1", level(3)), None);

        // Overwrite, no merge
        let replaced = ArticleVersion::new("Simpler", "");
        complexity.set_version("a1", level(2), replaced.clone());
        assert_eq!(complexity.get_version("a1", level(2)), Some(replaced));
    }

    #[test]
    fn test_show_original_hides_versions() {
        let (_, _, complexity) = setup(MockContentService::new());
        complexity.set_version("a1", level(1), ArticleVersion::new("t", "c"));
        complexity.set_show_original(false);
        assert!(complexity.get_article_version("a1").is_some());

        complexity.set_show_original(true);
        assert!(complexity.get_article_version("a1").is_none());
        complexity.set_show_original(true);
        assert!(complexity.get_article_version("a1").is_none());
    }

    #[tokio::test]
    async fn test_request_miss_fetches_and_adopts_level() {
        let (mock, _, complexity) = setup(MockContentService::new());
        mock.hold("rewrite:intermediate");

        let pending = {
            let complexity = complexity.clone();
            tokio::spawn(async move { complexity.request_version("a1", level(3), &source()).await })
        };

        assert!(mock.wait_for_calls(2).await);
        assert!(complexity.is_loading_version("a1", level(3)));
        assert!(complexity.is_loading());

        mock.release("rewrite:intermediate");
        let version = pending.await.unwrap().unwrap();

        assert_eq!(version.title, "[Intermediate] Seed rounds");
        assert_eq!(version.content, "[Intermediate] How seed rounds work.");
        assert_eq!(complexity.complexity_level(), level(3));
        assert!(!complexity.show_original());
        assert!(!complexity.is_loading());
        assert_eq!(complexity.get_article_version("a1"), Some(version));
        assert_eq!(mock.operation_calls("rewrite"), 2);
    }

    #[tokio::test]
    async fn test_request_hit_makes_no_call() {
        let (mock, _, complexity) = setup(MockContentService::new());
        let cached = ArticleVersion::new("Cached", "Already here.");
        complexity.set_version("a1", level(4), cached.clone());

        let version = complexity
            .request_version("a1", level(4), &source())
            .await
            .unwrap();

        assert_eq!(version, cached);
        assert_eq!(complexity.complexity_level(), level(4));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_level() {
        let (_, _, complexity) =
            setup(MockContentService::new().fail_operation("rewrite:advanced"));
        complexity
            .request_version("a1", level(2), &source())
            .await
            .unwrap();

        let err = complexity
            .request_version("a1", level(4), &source())
            .await
            .unwrap_err();

        assert!(err.is_network_failure());
        assert_eq!(complexity.complexity_level(), level(2));
        assert!(complexity.get_version("a1", level(4)).is_none());
        assert_eq!(complexity.last_error().as_deref(), Some(REWRITE_FAILED));
        assert!(!complexity.is_loading());

        complexity.clear_error();
        assert!(complexity.last_error().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_rewrite() {
        let (mock, _, complexity) = setup(MockContentService::new());
        mock.hold("rewrite:expert");

        let first = {
            let complexity = complexity.clone();
            tokio::spawn(async move { complexity.request_version("a1", level(5), &source()).await })
        };
        assert!(mock.wait_for_calls(2).await);
        let second = {
            let complexity = complexity.clone();
            tokio::spawn(async move { complexity.request_version("a1", level(5), &source()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        mock.release("rewrite:expert");

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(mock.operation_calls("rewrite"), 2);
    }

    #[tokio::test]
    async fn test_cancelled_scope_discards_write() {
        let (mock, _, complexity) = setup(MockContentService::new());
        mock.hold("rewrite:elementary");
        let token = CancellationToken::new();

        let pending = {
            let complexity = complexity.clone();
            let scope = RequestScope::new(token.clone());
            tokio::spawn(async move {
                complexity
                    .request_version_scoped("a1", level(2), &source(), &scope)
                    .await
            })
        };
        assert!(mock.wait_for_calls(2).await);

        token.cancel();
        let err = pending.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());

        mock.release("rewrite:elementary");
        settle(&complexity).await;

        assert!(!complexity.is_loading());
        assert!(complexity.get_version("a1", level(2)).is_none());
        assert_eq!(complexity.complexity_level(), ComplexityLevel::MIN);
        assert!(complexity.last_error().is_none());
    }

    #[tokio::test]
    async fn test_versions_survive_reload() {
        let (mock, store, complexity) = setup(MockContentService::new());
        complexity
            .request_version("a1", level(3), &source())
            .await
            .unwrap();

        let reloaded = ComplexityStore::load(mock, store, GenerationParams::default()).unwrap();
        assert_eq!(reloaded.complexity_level(), level(3));
        assert!(!reloaded.show_original());
        assert_eq!(
            reloaded.get_article_version("a1").map(|v| v.title),
            Some("[Intermediate] Seed rounds".to_string())
        );
    }

    #[tokio::test]
    async fn test_reset_forgets_versions() {
        let (_, _, complexity) = setup(MockContentService::new());
        complexity
            .request_version("a1", level(3), &source())
            .await
            .unwrap();

        complexity.reset();
        assert!(complexity.get_version("a1", level(3)).is_none());
        assert_eq!(complexity.complexity_level(), ComplexityLevel::MIN);
        assert!(complexity.show_original());
    }

    #[tokio::test]
    async fn test_reset_during_rewrite_discards_late_write() {
        let (mock, store, complexity) = setup(MockContentService::new());
        mock.hold("rewrite:advanced");

        let pending = {
            let complexity = complexity.clone();
            tokio::spawn(async move { complexity.request_version("a1", level(4), &source()).await })
        };
        assert!(mock.wait_for_calls(2).await);

        complexity.reset();
        store.clear().unwrap();
        mock.release("rewrite:advanced");

        assert!(pending.await.unwrap().unwrap_err().is_cancelled());
        assert!(complexity.get_version("a1", level(4)).is_none());
        assert_eq!(complexity.complexity_level(), ComplexityLevel::MIN);
        assert!(complexity.show_original());
        assert!(!complexity.is_loading());
        assert!(store.get_article_versions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unscoped_joiner_outlives_cancelled_starter() {
        let (mock, _, complexity) = setup(MockContentService::new());
        mock.hold("rewrite:advanced");
        let token = CancellationToken::new();

        let scoped = {
            let complexity = complexity.clone();
            let scope = RequestScope::new(token.clone());
            tokio::spawn(async move {
                complexity
                    .request_version_scoped("a1", level(4), &source(), &scope)
                    .await
            })
        };
        assert!(mock.wait_for_calls(2).await);
        let unscoped = {
            let complexity = complexity.clone();
            tokio::spawn(async move { complexity.request_version("a1", level(4), &source()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        token.cancel();
        assert!(scoped.await.unwrap().unwrap_err().is_cancelled());
        mock.release("rewrite:advanced");

        let version = unscoped.await.unwrap().unwrap();
        assert_eq!(complexity.get_version("a1", level(4)), Some(version));
        assert_eq!(complexity.complexity_level(), level(4));
        assert_eq!(mock.operation_calls("rewrite"), 2);
    }
}
