pub mod article;
pub mod feed;
pub mod interest;
pub mod search;
pub mod settings;
pub mod transform;

pub use article::Article;
pub use feed::{filter_by_category, Feed, FeedItem, MediaItem, ALL_CATEGORIES};
pub use interest::{default_catalog, find_in_catalog, Interest};
pub use search::{FeedSummary, ItemSummary, SearchResponse, SearchResult};
pub use settings::FontSize;
pub use transform::{ArticleVersion, ComplexityLevel, Language, Translation};
