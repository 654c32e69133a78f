//! Interest selection and the recommended-articles search built from it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::app::Result;
use crate::cache::lock;
use crate::client::ParallelSearcher;
use crate::domain::settings::keys;
use crate::domain::{default_catalog, Interest, SearchResult};
use crate::store::{load_setting, save_setting, SharedStore};

pub const SEARCH_FAILED: &str = "Failed to fetch search results. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Loading,
    Populated,
    Errored,
}

struct InterestsState {
    selected: Vec<Interest>,
    has_selected: bool,
    descriptions: Vec<String>,
    results: Vec<SearchResult>,
    phase: SearchPhase,
    error: Option<String>,
    generation: u64,
}

pub struct InterestsStore {
    catalog: Vec<Interest>,
    searcher: ParallelSearcher,
    store: SharedStore,
    state: Arc<Mutex<InterestsState>>,
}

impl InterestsStore {
    pub fn load(searcher: ParallelSearcher, store: SharedStore) -> Result<Self> {
        let selected = store.get_selected_interests()?;
        let descriptions = store.get_blog_descriptions()?;
        let has_selected: bool =
            load_setting(&*store, keys::HAS_SELECTED_INTERESTS)?.unwrap_or(false);

        tracing::debug!(
            "Loaded {} selected interests and {} signals",
            selected.len(),
            descriptions.len()
        );

        Ok(Self {
            catalog: default_catalog(),
            searcher,
            store,
            state: Arc::new(Mutex::new(InterestsState {
                selected,
                has_selected,
                descriptions,
                results: Vec::new(),
                phase: SearchPhase::Idle,
                error: None,
                generation: 0,
            })),
        })
    }

    /// The fixed catalog readers choose from.
    pub fn interests(&self) -> &[Interest] {
        &self.catalog
    }

    pub fn selected_interests(&self) -> Vec<Interest> {
        lock(&self.state).selected.clone()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        lock(&self.state).selected.iter().any(|i| i.id == id)
    }

    pub fn add_interest(&self, interest: &Interest) {
        {
            let mut state = lock(&self.state);
            if state.selected.iter().any(|i| i.id == interest.id) {
                return;
            }
            state.selected.push(interest.clone());
        }
        if let Err(e) = self.store.add_selected_interest(interest) {
            tracing::warn!("Failed to persist interest {}: {}", interest.name, e);
        }
    }

    pub fn remove_interest(&self, id: &str) {
        {
            let mut state = lock(&self.state);
            let before = state.selected.len();
            state.selected.retain(|i| i.id != id);
            if state.selected.len() == before {
                return;
            }
        }
        if let Err(e) = self.store.remove_selected_interest(id) {
            tracing::warn!("Failed to remove persisted interest {}: {}", id, e);
        }
    }

    pub fn has_selected_interests(&self) -> bool {
        lock(&self.state).has_selected
    }

    /// Latch the onboarding gate. Once set it stays set until [`reset`].
    ///
    /// [`reset`]: Self::reset
    pub fn set_has_selected_interests(&self, value: bool) {
        {
            let mut state = lock(&self.state);
            if state.has_selected || !value {
                return;
            }
            state.has_selected = true;
        }
        if let Err(e) = save_setting(&*self.store, keys::HAS_SELECTED_INTERESTS, &true) {
            tracing::warn!("Failed to persist onboarding state: {}", e);
        }
    }

    pub fn blog_descriptions(&self) -> Vec<String> {
        lock(&self.state).descriptions.clone()
    }

    pub fn add_blog_description(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        {
            let mut state = lock(&self.state);
            if state.descriptions.iter().any(|d| d == text) {
                return;
            }
            state.descriptions.push(text.to_string());
        }
        if let Err(e) = self.store.add_blog_description(text) {
            tracing::warn!("Failed to persist signal: {}", e);
        }
    }

    pub fn remove_blog_description(&self, text: &str) {
        let text = text.trim();
        {
            let mut state = lock(&self.state);
            let before = state.descriptions.len();
            state.descriptions.retain(|d| d != text);
            if state.descriptions.len() == before {
                return;
            }
        }
        if let Err(e) = self.store.remove_blog_description(text) {
            tracing::warn!("Failed to remove persisted signal: {}", e);
        }
    }

    /// Selected interest names followed by signals, without duplicates.
    pub fn queries(&self) -> Vec<String> {
        let state = lock(&self.state);
        let mut seen = HashSet::new();
        state
            .selected
            .iter()
            .map(|i| i.name.as_str())
            .chain(state.descriptions.iter().map(String::as_str))
            .filter(|q| seen.insert(*q))
            .map(String::from)
            .collect()
    }

    pub fn search_results(&self) -> Vec<SearchResult> {
        lock(&self.state).results.clone()
    }

    pub fn phase(&self) -> SearchPhase {
        lock(&self.state).phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == SearchPhase::Loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Search once per query and replace the results with their
    /// deduplicated union.
    ///
    /// With nothing to search for this is a no-op. Failed queries are
    /// skipped; only when every result is missing because of a failure does
    /// the cycle error out, keeping the previous results. A cycle that was
    /// superseded by a newer one (or by [`reset`](Self::reset)) is discarded.
    pub async fn fetch_search_results(&self) -> Result<()> {
        let queries = self.queries();
        if queries.is_empty() {
            tracing::debug!("No interests or signals to search for");
            return Ok(());
        }

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.phase = SearchPhase::Loading;
            state.error = None;
            state.generation
        };

        tracing::info!("Searching {} queries", queries.len());
        let outcomes = self.searcher.search_all(queries).await;

        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        let mut first_error = None;
        for (query, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    for result in response.results {
                        if seen.insert(result.item_id().to_string()) {
                            merged.push(result);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Search for '{}' failed: {}", query, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut state = lock(&self.state);
        if state.generation != generation {
            tracing::debug!("Discarding superseded search cycle {}", generation);
            return Ok(());
        }

        match first_error {
            Some(e) if merged.is_empty() => {
                state.phase = SearchPhase::Errored;
                state.error = Some(SEARCH_FAILED.to_string());
                Err(e)
            }
            _ => {
                tracing::info!("Found {} recommended articles", merged.len());
                state.results = merged;
                state.phase = SearchPhase::Populated;
                Ok(())
            }
        }
    }

    /// Forget selections, signals and results, and reopen the onboarding
    /// gate. Persistent rows are cleared by the owner of the store.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.selected.clear();
        state.has_selected = false;
        state.descriptions.clear();
        state.results.clear();
        state.phase = SearchPhase::Idle;
        state.error = None;
        state.generation += 1;
    }
}
