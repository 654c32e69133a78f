use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ArticleVersion;

/// A feed item normalized for reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub feed_id: String,
    pub feed_name: String,
    pub category: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            feed_id: feed_id.into(),
            feed_name: String::new(),
            category: String::new(),
            title: None,
            link: None,
            content: None,
            summary: None,
            image_url: None,
            published_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    /// Get the best available content for display
    pub fn display_content(&self) -> &str {
        self.content
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("")
    }

    /// The untransformed text every content transform starts from.
    pub fn original_version(&self) -> ArticleVersion {
        ArticleVersion::new(self.display_title(), self.display_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_without_title() {
        let article = Article::new("a1", "f1");
        assert_eq!(article.display_title(), "(Untitled)");
    }

    #[test]
    fn test_display_content_prefers_content() {
        let mut article = Article::new("a1", "f1");
        article.content = Some("Full content".into());
        article.summary = Some("Short summary".into());
        assert_eq!(article.display_content(), "Full content");
    }

    #[test]
    fn test_display_content_falls_back_to_summary() {
        let mut article = Article::new("a1", "f1");
        article.summary = Some("Short summary".into());
        assert_eq!(article.display_content(), "Short summary");
    }

    #[test]
    fn test_original_version() {
        let mut article = Article::new("a1", "f1");
        article.title = Some("Do Things That Don't Scale".into());
        article.content = Some("Recruit users manually.".into());

        let version = article.original_version();
        assert_eq!(version.title, "Do Things That Don't Scale");
        assert_eq!(version.content, "Recruit users manually.");
    }
}
