use serde::{Deserialize, Serialize};

use crate::domain::MediaItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub description: String,
}

/// One hit from the semantic search endpoint. Opaque to the client apart
/// from the item id used for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub feed: FeedSummary,
    pub item: ItemSummary,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub matched_content: String,
}

impl SearchResult {
    pub fn item_id(&self) -> &str {
        &self.item.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub status: String,
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_response() {
        let json = r#"{
            "status": "success",
            "query": "AI",
            "results": [{
                "feed": {"id": "f1", "name": "OpenAI Blog", "category": "Technology"},
                "item": {"id": "i9", "title": "GPT", "link": "https://openai.com/gpt", "pub_date": "2024-02-01", "description": "Models"},
                "media": [],
                "relevance_score": 0.92,
                "matched_content": "large language models"
            }]
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].item_id(), "i9");
        assert!((response.results[0].relevance_score - 0.92).abs() < f64::EPSILON);
    }
}
