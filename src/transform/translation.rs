use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::{LensError, Result};
use crate::cache::{lock, LoadingSet, RequestScope, SingleFlight};
use crate::client::{GenerationParams, SharedService, TextOperation};
use crate::domain::{ArticleVersion, Language, Translation};
use crate::store::SharedStore;

use super::transform_article;

pub const TRANSLATION_FAILED: &str = "Failed to translate this article. Please try again.";

type TranslationKey = (String, Language);

#[derive(Default)]
struct TranslationState {
    translations: HashMap<TranslationKey, Translation>,
    last_error: Option<String>,
}

/// Translations per blog and language. English is the identity transform
/// and never reaches the cache or the service.
#[derive(Clone)]
pub struct TranslationStore {
    service: SharedService,
    store: SharedStore,
    params: GenerationParams,
    persist: bool,
    state: Arc<Mutex<TranslationState>>,
    loading: LoadingSet<Language>,
    flights: SingleFlight<TranslationKey, Translation>,
}

impl TranslationStore {
    /// With `persist` set, translations are written through to `store` and
    /// reloaded here; otherwise they last for the session only.
    pub fn load(
        service: SharedService,
        store: SharedStore,
        params: GenerationParams,
        persist: bool,
    ) -> Result<Self> {
        let mut state = TranslationState::default();
        if persist {
            for (blog_id, language, translation) in store.get_translations()? {
                state.translations.insert((blog_id, language), translation);
            }
            tracing::debug!("Loaded {} translations", state.translations.len());
        }

        Ok(Self {
            service,
            store,
            params,
            persist,
            state: Arc::new(Mutex::new(state)),
            loading: LoadingSet::new(),
            flights: SingleFlight::new(),
        })
    }

    pub fn get_translation(&self, blog_id: &str, language: &Language) -> Option<Translation> {
        lock(&self.state)
            .translations
            .get(&(blog_id.to_string(), language.clone()))
            .cloned()
    }

    pub fn add_translation(&self, blog_id: &str, language: &Language, translation: Translation) {
        if language.is_english() {
            return;
        }
        lock(&self.state)
            .translations
            .insert((blog_id.to_string(), language.clone()), translation.clone());
        self.persist_translation(blog_id, language, &translation);
    }

    pub fn set_loading_language(&self, language: &Language, loading: bool) {
        self.loading.set(language.clone(), loading);
    }

    pub fn is_loading_language(&self, language: &Language) -> bool {
        self.loading.is_loading(language)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).last_error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).last_error = None;
    }

    pub async fn request_translation(
        &self,
        blog_id: &str,
        language: &Language,
        original: &Translation,
    ) -> Result<Translation> {
        self.request_translation_scoped(blog_id, language, original, &RequestScope::unscoped())
            .await
    }

    /// Translate `original` into `language`, reusing a cached translation.
    pub async fn request_translation_scoped(
        &self,
        blog_id: &str,
        language: &Language,
        original: &Translation,
        scope: &RequestScope,
    ) -> Result<Translation> {
        if language.is_english() {
            return Ok(original.clone());
        }
        if let Some(translation) = self.get_translation(blog_id, language) {
            return Ok(translation);
        }

        let key = (blog_id.to_string(), language.clone());
        let guard = self.loading.acquire(language.clone());
        let this = self.clone();
        let task_key = key.clone();
        let original = original.clone();
        self.flights
            .run(key, scope, move |flight| async move {
                let _guard = guard;
                this.fetch_translation(task_key, original, flight).await
            })
            .await
    }

    async fn fetch_translation(
        &self,
        key: TranslationKey,
        original: Translation,
        flight: RequestScope,
    ) -> Result<Translation> {
        let (blog_id, language) = (&key.0, &key.1);
        if let Some(translation) = self.get_translation(blog_id, language) {
            return Ok(translation);
        }

        tracing::debug!("Translating blog {} into {}", blog_id, language);
        let operation = TextOperation::Translate {
            target_language: language.clone(),
        };
        let source = ArticleVersion::from(original);
        let result = flight
            .guard(transform_article(&self.service, &self.params, &source, operation))
            .await;

        let mut state = lock(&self.state);
        if flight.is_cancelled() {
            tracing::debug!("Translation of blog {} into {} cancelled", blog_id, language);
            return Err(LensError::Cancelled);
        }
        match result {
            Ok(version) => {
                let translation = Translation::from(version);
                state.translations.insert(key.clone(), translation.clone());
                state.last_error = None;
                self.persist_translation(blog_id, language, &translation);
                tracing::info!("Cached {} translation of blog {}", language, blog_id);
                Ok(translation)
            }
            Err(e) => {
                tracing::warn!("Failed to translate blog {} into {}: {}", blog_id, language, e);
                state.last_error = Some(TRANSLATION_FAILED.to_string());
                Err(e)
            }
        }
    }

    pub fn reset(&self) {
        self.flights.cancel_all();
        let mut state = lock(&self.state);
        state.translations.clear();
        state.last_error = None;
        drop(state);
        self.loading.clear();
    }

    fn persist_translation(&self, blog_id: &str, language: &Language, translation: &Translation) {
        if !self.persist {
            return;
        }
        if let Err(e) = self.store.put_translation(blog_id, language, translation) {
            tracing::warn!("Failed to persist {} translation of {}: {}", language, blog_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;
    use crate::store::SqliteStore;

    fn hindi() -> Language {
        Language::new("hindi")
    }

    fn original() -> Translation {
        Translation::new("Growth loops", "Loops beat funnels.")
    }

    fn setup(
        mock: MockContentService,
        persist: bool,
    ) -> (Arc<MockContentService>, SharedStore, TranslationStore) {
        let mock = Arc::new(mock);
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let translations = TranslationStore::load(
            mock.clone(),
            store.clone(),
            GenerationParams::default(),
            persist,
        )
        .unwrap();
        (mock, store, translations)
    }

    #[tokio::test]
    async fn test_english_is_identity() {
        let (mock, _, translations) = setup(MockContentService::new(), false);
        let english = Language::english();

        let result = translations
            .request_translation("b1", &english, &original())
            .await
            .unwrap();

        assert_eq!(result, original());
        assert!(translations.get_translation("b1", &english).is_none());
        assert!(!translations.is_loading_language(&english));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_translation_is_fetched_once() {
        let (mock, _, translations) = setup(MockContentService::new(), false);

        let first = translations
            .request_translation("b1", &hindi(), &original())
            .await
            .unwrap();
        let second = translations
            .request_translation("b1", &hindi(), &original())
            .await
            .unwrap();

        assert_eq!(first.title, "[hindi] Growth loops");
        assert_eq!(first.content, "[hindi] Loops beat funnels.");
        assert_eq!(first, second);
        assert_eq!(mock.operation_calls("translate"), 2);
    }

    #[tokio::test]
    async fn test_loading_is_per_language() {
        let (mock, _, translations) = setup(MockContentService::new(), false);
        mock.hold("translate:hindi");

        let pending = {
            let translations = translations.clone();
            tokio::spawn(async move {
                translations
                    .request_translation("b1", &hindi(), &original())
                    .await
            })
        };
        assert!(mock.wait_for_calls(2).await);

        assert!(translations.is_loading_language(&hindi()));
        assert!(!translations.is_loading_language(&Language::new("punjabi")));

        // A second blog in the same language keeps the flag up
        let other = {
            let translations = translations.clone();
            tokio::spawn(async move {
                translations
                    .request_translation("b2", &hindi(), &original())
                    .await
            })
        };
        assert!(mock.wait_for_calls(4).await);

        mock.release("translate:hindi");
        pending.await.unwrap().unwrap();
        other.await.unwrap().unwrap();
        assert!(!translations.is_loading_language(&hindi()));
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let (_, _, translations) =
            setup(MockContentService::new().fail_operation("translate:punjabi"), false);
        let punjabi = Language::new("punjabi");

        let err = translations
            .request_translation("b1", &punjabi, &original())
            .await
            .unwrap_err();

        assert!(err.is_network_failure());
        assert!(translations.get_translation("b1", &punjabi).is_none());
        assert!(!translations.is_loading_language(&punjabi));
        assert_eq!(translations.last_error().as_deref(), Some(TRANSLATION_FAILED));
    }

    #[test]
    fn test_manual_loading_flag() {
        let (_, _, translations) = setup(MockContentService::new(), false);
        translations.set_loading_language(&hindi(), true);
        assert!(translations.is_loading_language(&hindi()));
        translations.set_loading_language(&hindi(), false);
        assert!(!translations.is_loading_language(&hindi()));
    }

    #[test]
    fn test_add_translation_ignores_english() {
        let (_, _, translations) = setup(MockContentService::new(), false);
        translations.add_translation("b1", &Language::english(), original());
        assert!(translations
            .get_translation("b1", &Language::english())
            .is_none());

        translations.add_translation("b1", &hindi(), original());
        assert_eq!(translations.get_translation("b1", &hindi()), Some(original()));
    }

    #[tokio::test]
    async fn test_persistence_follows_setting() {
        let (mock, store, translations) = setup(MockContentService::new(), false);
        translations
            .request_translation("b1", &hindi(), &original())
            .await
            .unwrap();
        assert!(store.get_translations().unwrap().is_empty());

        let persistent = TranslationStore::load(
            mock.clone(),
            store.clone(),
            GenerationParams::default(),
            true,
        )
        .unwrap();
        persistent
            .request_translation("b1", &hindi(), &original())
            .await
            .unwrap();
        assert_eq!(store.get_translations().unwrap().len(), 1);

        let reloaded =
            TranslationStore::load(mock, store, GenerationParams::default(), true).unwrap();
        assert!(reloaded.get_translation("b1", &hindi()).is_some());
    }

    #[tokio::test]
    async fn test_reset_during_translation_discards_late_write() {
        let (mock, store, translations) = setup(MockContentService::new(), true);
        mock.hold("translate:hindi");

        let pending = {
            let translations = translations.clone();
            tokio::spawn(async move {
                translations
                    .request_translation("b1", &hindi(), &original())
                    .await
            })
        };
        assert!(mock.wait_for_calls(2).await);

        translations.reset();
        store.clear().unwrap();
        mock.release("translate:hindi");

        assert!(pending.await.unwrap().unwrap_err().is_cancelled());
        assert!(translations.get_translation("b1", &hindi()).is_none());
        assert!(!translations.is_loading_language(&hindi()));
        assert!(store.get_translations().unwrap().is_empty());
    }
}
