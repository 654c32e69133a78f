//! In-process content service for tests and offline demos.
//!
//! Text operations are answered deterministically (`"[hindi] text"`,
//! `"Summary: text"`, ...). Calls are recorded before they are answered, and
//! any call can be held behind a gate until the test releases it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::app::{LensError, Result};
use crate::cache::lock;
use crate::client::{ContentService, ExtractedBlog, TextOperation, TextOperationRequest};
use crate::domain::{Feed, SearchResponse, SearchResult};

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ListFeeds,
    ExtractBlog(String),
    Search(String),
    TextOperation { operation: String, text: String },
}

#[derive(Default)]
pub struct MockContentService {
    feeds: Vec<Feed>,
    search_results: HashMap<String, Vec<SearchResult>>,
    extracted: HashMap<String, String>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<MockCall>>,
}

/// Gate/failure key of a text operation: `rewrite:advanced`,
/// `translate:hindi`, `summarize`, `explain`.
pub fn operation_key(operation: &TextOperation) -> String {
    match operation {
        TextOperation::Translate { target_language } => {
            format!("translate:{}", target_language.as_str())
        }
        TextOperation::Rewrite { level } => format!("rewrite:{}", level.mode()),
        other => other.name().to_string(),
    }
}

/// Gate/failure key of a search query.
pub fn search_key(query: &str) -> String {
    format!("search:{}", query)
}

impl MockContentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feeds(mut self, feeds: Vec<Feed>) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn with_search_results(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.search_results.insert(query.to_string(), results);
        self
    }

    pub fn with_extracted(mut self, url: &str, content: &str) -> Self {
        self.extracted.insert(url.to_string(), content.to_string());
        self
    }

    pub fn fail_query(self, query: &str) -> Self {
        self.set_failing(&search_key(query), true);
        self
    }

    pub fn fail_operation(self, key: &str) -> Self {
        self.set_failing(key, true);
        self
    }

    /// Make calls matching `key` fail (or succeed again).
    pub fn set_failing(&self, key: &str, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(key.to_string());
        } else {
            set.remove(key);
        }
    }

    /// Hold every call matching `key` until [`release`](Self::release).
    pub fn hold(&self, key: &str) {
        lock(&self.gates).insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Open the gate for `key`; held and future calls proceed.
    pub fn release(&self, key: &str) {
        if let Some(gate) = lock(&self.gates).remove(key) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn search_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, MockCall::Search(_)))
            .count()
    }

    pub fn operation_calls(&self, name: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, MockCall::TextOperation { operation, .. } if operation == name))
            .count()
    }

    /// Wait until at least `count` calls have been recorded.
    pub async fn wait_for_calls(&self, count: usize) -> bool {
        for _ in 0..500 {
            if lock(&self.calls).len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        false
    }

    async fn enter(&self, call: MockCall, key: &str) -> Result<()> {
        lock(&self.calls).push(call);

        let gate = lock(&self.gates).get(key).cloned();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        if lock(&self.failing).contains(key) {
            return Err(LensError::ServiceUnavailable(format!("mock failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentService for MockContentService {
    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.enter(MockCall::ListFeeds, "feeds").await?;
        Ok(self.feeds.clone())
    }

    async fn extract_blog(&self, url: &str) -> Result<ExtractedBlog> {
        self.enter(MockCall::ExtractBlog(url.to_string()), "extract")
            .await?;
        let content = self
            .extracted
            .get(url)
            .cloned()
            .ok_or_else(|| LensError::ServiceUnavailable(format!("nothing to extract at {}", url)))?;
        Ok(ExtractedBlog {
            url: url.to_string(),
            content,
        })
    }

    async fn search(&self, query: &str, _k: usize) -> Result<SearchResponse> {
        self.enter(MockCall::Search(query.to_string()), &search_key(query))
            .await?;
        Ok(SearchResponse {
            status: "success".into(),
            query: query.to_string(),
            results: self.search_results.get(query).cloned().unwrap_or_default(),
        })
    }

    async fn text_operation(&self, request: &TextOperationRequest) -> Result<String> {
        let call = MockCall::TextOperation {
            operation: request.operation.name().to_string(),
            text: request.text.clone(),
        };
        self.enter(call, &operation_key(&request.operation)).await?;

        let output = match &request.operation {
            TextOperation::Translate { target_language } => {
                format!("[{}] {}", target_language.as_str(), request.text)
            }
            TextOperation::Summarize => format!("Summary: {}", request.text),
            TextOperation::Explain => format!("Explanation: {}", request.text),
            TextOperation::Rewrite { level } => format!("[{}] {}", level.label(), request.text),
        };
        Ok(output)
    }
}
