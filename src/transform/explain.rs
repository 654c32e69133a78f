use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::{LensError, Result};
use crate::cache::{lock, LoadingSet, RequestScope, SingleFlight};
use crate::client::{GenerationParams, SharedService, TextOperation};

use super::transform_text;

pub const EXPLAIN_FAILED: &str = "Failed to explain the selection. Please try again.";

type SelectionKey = (String, String);

#[derive(Default)]
struct ExplainState {
    explanations: HashMap<SelectionKey, String>,
    last_error: Option<String>,
}

/// Explanations of text selections, cached per blog and selection for the
/// session.
#[derive(Clone)]
pub struct ExplainStore {
    service: SharedService,
    params: GenerationParams,
    state: Arc<Mutex<ExplainState>>,
    loading: LoadingSet<SelectionKey>,
    flights: SingleFlight<SelectionKey, String>,
}

fn selection_key(blog_id: &str, selection: &str) -> SelectionKey {
    (blog_id.to_string(), selection.trim().to_string())
}

impl ExplainStore {
    pub fn new(service: SharedService, params: GenerationParams) -> Self {
        Self {
            service,
            params,
            state: Arc::new(Mutex::new(ExplainState::default())),
            loading: LoadingSet::new(),
            flights: SingleFlight::new(),
        }
    }

    pub fn get_explanation(&self, blog_id: &str, selection: &str) -> Option<String> {
        lock(&self.state)
            .explanations
            .get(&selection_key(blog_id, selection))
            .cloned()
    }

    pub fn is_loading(&self, blog_id: &str, selection: &str) -> bool {
        self.loading.is_loading(&selection_key(blog_id, selection))
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).last_error.clone()
    }

    /// Explain `selection`. Blank selections are ignored and yield `None`.
    pub async fn request_explanation(&self, blog_id: &str, selection: &str) -> Result<Option<String>> {
        self.request_explanation_scoped(blog_id, selection, &RequestScope::unscoped())
            .await
    }

    pub async fn request_explanation_scoped(
        &self,
        blog_id: &str,
        selection: &str,
        scope: &RequestScope,
    ) -> Result<Option<String>> {
        let key = selection_key(blog_id, selection);
        if key.1.is_empty() {
            return Ok(None);
        }
        let cached = lock(&self.state).explanations.get(&key).cloned();
        if let Some(explanation) = cached {
            return Ok(Some(explanation));
        }

        let guard = self.loading.acquire(key.clone());
        let this = self.clone();
        let task_key = key.clone();
        self.flights
            .run(key, scope, move |flight| async move {
                let _guard = guard;
                this.fetch_explanation(task_key, flight).await
            })
            .await
            .map(Some)
    }

    async fn fetch_explanation(&self, key: SelectionKey, flight: RequestScope) -> Result<String> {
        tracing::debug!("Explaining selection from blog {}", key.0);
        let result = flight
            .guard(transform_text(
                &self.service,
                &self.params,
                &key.1,
                TextOperation::Explain,
            ))
            .await;

        let mut state = lock(&self.state);
        if flight.is_cancelled() {
            return Err(LensError::Cancelled);
        }
        match result {
            Ok(explanation) => {
                state.last_error = None;
                state.explanations.insert(key, explanation.clone());
                Ok(explanation)
            }
            Err(e) => {
                tracing::warn!("Failed to explain selection from blog {}: {}", key.0, e);
                state.last_error = Some(EXPLAIN_FAILED.to_string());
                Err(e)
            }
        }
    }

    pub fn reset(&self) {
        self.flights.cancel_all();
        let mut state = lock(&self.state);
        state.explanations.clear();
        state.last_error = None;
        drop(state);
        self.loading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;

    fn setup(mock: MockContentService) -> (Arc<MockContentService>, ExplainStore) {
        let mock = Arc::new(mock);
        let explain = ExplainStore::new(mock.clone(), GenerationParams::default());
        (mock, explain)
    }

    #[tokio::test]
    async fn test_blank_selection_is_ignored() {
        let (mock, explain) = setup(MockContentService::new());
        assert_eq!(explain.request_explanation("b1", "   ").await.unwrap(), None);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_explanation_cached_per_selection() {
        let (mock, explain) = setup(MockContentService::new());

        let first = explain
            .request_explanation("b1", " product-market fit ")
            .await
            .unwrap();
        let again = explain
            .request_explanation("b1", "product-market fit")
            .await
            .unwrap();

        assert_eq!(first.as_deref(), Some("Explanation: product-market fit"));
        assert_eq!(first, again);
        assert_eq!(mock.operation_calls("explain"), 1);
        assert_eq!(
            explain.get_explanation("b1", "product-market fit").as_deref(),
            Some("Explanation: product-market fit")
        );
    }

    #[tokio::test]
    async fn test_failure_records_error() {
        let (_, explain) = setup(MockContentService::new().fail_operation("explain"));
        assert!(explain.request_explanation("b1", "churn").await.is_err());
        assert_eq!(explain.last_error().as_deref(), Some(EXPLAIN_FAILED));
        assert!(!explain.is_loading("b1", "churn"));
        assert!(explain.get_explanation("b1", "churn").is_none());
    }
}
