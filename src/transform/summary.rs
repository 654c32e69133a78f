use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::{LensError, Result};
use crate::cache::{lock, LoadingSet, RequestScope, SingleFlight};
use crate::client::{GenerationParams, SharedService, TextOperation};
use crate::store::SharedStore;

use super::transform_text;

pub const SUMMARY_FAILED: &str = "Failed to summarize this article. Please try again.";

#[derive(Default)]
struct SummaryState {
    summaries: HashMap<String, String>,
    last_error: Option<String>,
}

/// One summary per blog, computed at most once per session.
#[derive(Clone)]
pub struct SummaryStore {
    service: SharedService,
    store: SharedStore,
    params: GenerationParams,
    persist: bool,
    state: Arc<Mutex<SummaryState>>,
    loading: LoadingSet<String>,
    flights: SingleFlight<String, String>,
}

impl SummaryStore {
    pub fn load(
        service: SharedService,
        store: SharedStore,
        params: GenerationParams,
        persist: bool,
    ) -> Result<Self> {
        let mut state = SummaryState::default();
        if persist {
            state.summaries.extend(store.get_summaries()?);
            tracing::debug!("Loaded {} summaries", state.summaries.len());
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

    pub fn get_summary(&self, blog_id: &str) -> Option<String> {
        lock(&self.state).summaries.get(blog_id).cloned()
    }

    /// Store a summary unless the blog already has one. Returns whether it
    /// was stored.
    pub fn add_summary(&self, blog_id: &str, summary: &str) -> bool {
        {
            let mut state = lock(&self.state);
            if state.summaries.contains_key(blog_id) {
                return false;
            }
            state
                .summaries
                .insert(blog_id.to_string(), summary.to_string());
        }
        self.persist_summary(blog_id, summary);
        true
    }

    pub fn is_loading(&self, blog_id: &str) -> bool {
        self.loading.is_loading(blog_id)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).last_error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).last_error = None;
    }

    pub async fn request_summary(&self, blog_id: &str, content: &str) -> Result<String> {
        self.request_summary_scoped(blog_id, content, &RequestScope::unscoped())
            .await
    }

    pub async fn request_summary_scoped(
        &self,
        blog_id: &str,
        content: &str,
        scope: &RequestScope,
    ) -> Result<String> {
        if let Some(summary) = self.get_summary(blog_id) {
            return Ok(summary);
        }

        let guard = self.loading.acquire(blog_id.to_string());
        let this = self.clone();
        let task_blog = blog_id.to_string();
        let content = content.to_string();
        self.flights
            .run(blog_id.to_string(), scope, move |flight| async move {
                let _guard = guard;
                this.fetch_summary(task_blog, content, flight).await
            })
            .await
    }

    async fn fetch_summary(
        &self,
        blog_id: String,
        content: String,
        flight: RequestScope,
    ) -> Result<String> {
        if let Some(summary) = self.get_summary(&blog_id) {
            return Ok(summary);
        }

        tracing::debug!("Summarizing blog {}", blog_id);
        let result = flight
            .guard(transform_text(
                &self.service,
                &self.params,
                &content,
                TextOperation::Summarize,
            ))
            .await;

        let mut state = lock(&self.state);
        if flight.is_cancelled() {
            tracing::debug!("Summary of blog {} cancelled", blog_id);
            return Err(LensError::Cancelled);
        }
        match result {
            Ok(summary) => {
                state.last_error = None;
                // First write wins, so hand back whatever is stored now
                if let Some(existing) = state.summaries.get(&blog_id) {
                    return Ok(existing.clone());
                }
                state.summaries.insert(blog_id.clone(), summary.clone());
                self.persist_summary(&blog_id, &summary);
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!("Failed to summarize blog {}: {}", blog_id, e);
                state.last_error = Some(SUMMARY_FAILED.to_string());
                Err(e)
            }
        }
    }

    pub fn reset(&self) {
        self.flights.cancel_all();
        let mut state = lock(&self.state);
        state.summaries.clear();
        state.last_error = None;
        drop(state);
        self.loading.clear();
    }

    fn persist_summary(&self, blog_id: &str, summary: &str) {
        if !self.persist {
            return;
        }
        if let Err(e) = self.store.put_summary(blog_id, summary) {
            tracing::warn!("Failed to persist summary of {}: {}", blog_id, e);
        }
    }
}
