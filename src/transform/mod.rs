//! Per-article content-transform caches.
//!
//! Each store keeps computed content keyed by article and transform
//! parameter. A lookup that misses calls the content service once per key
//! (concurrent callers join the outstanding request), marks the key as
//! loading for the duration, and writes the result back on success. Failures
//! leave the cache untouched and record a message for the reader.

pub mod complexity;
pub mod explain;
pub mod summary;
pub mod translation;

use crate::app::Result;
use crate::client::{GenerationParams, SharedService, TextOperation, TextOperationRequest};
use crate::domain::ArticleVersion;

pub use complexity::ComplexityStore;
pub use explain::ExplainStore;
pub use summary::SummaryStore;
pub use translation::TranslationStore;

async fn transform_text(
    service: &SharedService,
    params: &GenerationParams,
    text: &str,
    operation: TextOperation,
) -> Result<String> {
    let request = TextOperationRequest::new(text, operation, params.clone());
    service.text_operation(&request).await
}

/// Transform title and body with two concurrent operation calls.
async fn transform_article(
    service: &SharedService,
    params: &GenerationParams,
    source: &ArticleVersion,
    operation: TextOperation,
) -> Result<ArticleVersion> {
    let (title, content) = futures::try_join!(
        transform_text(service, params, &source.title, operation.clone()),
        transform_text(service, params, &source.content, operation),
    )?;
    Ok(ArticleVersion { title, content })
}
