use serde::{Deserialize, Serialize};

/// Category label that stands for "every feed".
pub const ALL_CATEGORIES: &str = "Latest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub content_encoded: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl Feed {
    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    /// Case-insensitive category match; [`ALL_CATEGORIES`] matches every feed.
    pub fn in_category(&self, category: &str) -> bool {
        category.eq_ignore_ascii_case(ALL_CATEGORIES) || self.category.eq_ignore_ascii_case(category)
    }
}

/// Keep only the feeds belonging to `category`.
pub fn filter_by_category(feeds: Vec<Feed>, category: Option<&str>) -> Vec<Feed> {
    match category {
        Some(category) => feeds.into_iter().filter(|f| f.in_category(category)).collect(),
        None => feeds,
    }
}
