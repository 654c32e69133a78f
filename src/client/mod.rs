pub mod http;
pub mod mock;
pub mod parallel;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::{LensError, Result};
use crate::domain::{ComplexityLevel, Feed, Language, SearchResponse};

pub use http::HttpContentService;
pub use mock::MockContentService;
pub use parallel::ParallelSearcher;

pub type SharedService = Arc<dyn ContentService + Send + Sync>;

/// Full article text returned by the extraction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedBlog {
    pub url: String,
    pub content: String,
}

/// Sampling parameters forwarded with every text operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// The NLP capabilities the remote service exposes through one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOperation {
    Translate { target_language: Language },
    Summarize,
    Explain,
    Rewrite { level: ComplexityLevel },
}

impl TextOperation {
    pub fn name(&self) -> &'static str {
        match self {
            TextOperation::Translate { .. } => "translate",
            TextOperation::Summarize => "summarize",
            TextOperation::Explain => "explain",
            TextOperation::Rewrite { .. } => "rewrite",
        }
    }

    /// Field of the response body that carries the output text.
    pub fn response_field(&self) -> &'static str {
        match self {
            TextOperation::Translate { .. } => "translation",
            TextOperation::Summarize => "summary",
            TextOperation::Explain => "explanation",
            TextOperation::Rewrite { .. } => "rewritten",
        }
    }

    pub fn mode(&self) -> Option<String> {
        match self {
            TextOperation::Rewrite { level } => Some(level.mode()),
            _ => None,
        }
    }

    pub fn target_language(&self) -> Option<&str> {
        match self {
            TextOperation::Translate { target_language } => Some(target_language.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOperationRequest {
    pub text: String,
    pub operation: TextOperation,
    pub params: GenerationParams,
}

impl TextOperationRequest {
    pub fn new(text: impl Into<String>, operation: TextOperation, params: GenerationParams) -> Self {
        Self {
            text: text.into(),
            operation,
            params,
        }
    }

    pub fn body(&self) -> TextOperationBody<'_> {
        TextOperationBody {
            text: &self.text,
            operation: self.operation.name(),
            mode: self.operation.mode(),
            target_language: self.operation.target_language(),
            params: &self.params,
        }
    }

    /// Pull the output text out of an operation response.
    pub fn extract_output(&self, response: &serde_json::Value) -> Result<String> {
        let field = self.operation.response_field();
        response
            .get(field)
            .or_else(|| response.get("result"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                LensError::MalformedResponse(format!(
                    "{} response is missing the '{}' field",
                    self.operation.name(),
                    field
                ))
            })
    }
}

/// Wire body of `POST /feeds/groq`.
#[derive(Debug, Serialize)]
pub struct TextOperationBody<'a> {
    pub text: &'a str,
    pub operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_language: Option<&'a str>,
    #[serde(flatten)]
    pub params: &'a GenerationParams,
}

#[async_trait]
pub trait ContentService {
    async fn list_feeds(&self) -> Result<Vec<Feed>>;

    async fn extract_blog(&self, url: &str) -> Result<ExtractedBlog>;

    async fn search(&self, query: &str, k: usize) -> Result<SearchResponse>;

    /// Run one text operation and return its output text.
    async fn text_operation(&self, request: &TextOperationRequest) -> Result<String>;
}
