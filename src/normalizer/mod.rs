use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;

use crate::domain::{Article, Feed, FeedItem, MediaItem, SearchResult};

const EXCERPT_CHARS: usize = 200;

/// Tags whose boundaries separate paragraphs.
const BLOCK_TAGS: [&str; 12] = [
    "p", "br", "div", "li", "ul", "ol", "blockquote", "h1", "h2", "h3", "h4", "pre",
];

/// Turns service feeds into display-ready [`Article`]s.
#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Articles of every feed, newest first. Undated articles go last.
    pub fn normalize_feeds(&self, feeds: &[Feed]) -> Vec<Article> {
        let mut articles: Vec<Article> = feeds
            .iter()
            .flat_map(|feed| self.normalize_feed(feed))
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles
    }

    pub fn normalize_feed(&self, feed: &Feed) -> Vec<Article> {
        feed.items
            .iter()
            .map(|item| self.normalize_item(feed, item))
            .collect()
    }

    pub fn normalize_item(&self, feed: &Feed, item: &FeedItem) -> Article {
        let mut article = Article::new(&item.id, &feed.id);
        article.feed_name = feed.display_title().to_string();
        article.category = feed.category.clone();
        article.title = non_empty(decode_html_entities(item.title.trim()).to_string());
        article.link = non_empty(item.link.trim().to_string());

        let description = html_to_text(&item.description);
        article.content = item
            .content_encoded
            .as_deref()
            .map(html_to_text)
            .and_then(non_empty)
            .or_else(|| non_empty(description.clone()));
        article.summary = non_empty(excerpt(&description));
        article.image_url = pick_image(&item.media);
        article.published_at = parse_date(&item.pub_date);

        article
    }

    /// A search hit carries only the item's headline fields.
    pub fn normalize_search_result(&self, result: &SearchResult) -> Article {
        let mut article = Article::new(&result.item.id, &result.feed.id);
        article.feed_name = result.feed.name.clone();
        article.category = result.feed.category.clone();
        article.title = non_empty(decode_html_entities(result.item.title.trim()).to_string());
        article.link = non_empty(result.item.link.trim().to_string());

        let description = html_to_text(&result.item.description);
        article.summary = non_empty(excerpt(&description));
        article.content = non_empty(description)
            .or_else(|| non_empty(html_to_text(&result.matched_content)));
        article.image_url = pick_image(&result.media);
        article.published_at = parse_date(&result.item.pub_date);

        article
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse an RSS (RFC 2822) or ISO (RFC 3339) publication date.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| tracing::debug!("Unparseable date '{}': {}", raw, e))
        .ok()
}

/// Plain text with paragraphs separated by blank lines.
pub fn html_to_text(html: &str) -> String {
    let mut flat = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                if is_block_tag(&tag) {
                    flat.push_str("\n\n");
                }
            }
            _ if in_tag => tag.push(c),
            _ => flat.push(c),
        }
    }

    let decoded = decode_html_entities(&flat).replace("\r\n", "\n");
    decoded
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_block_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
}

/// First paragraph, cut at a word boundary.
pub fn excerpt(text: &str) -> String {
    let first = text.split("\n\n").next().unwrap_or("");
    if first.chars().count() <= EXCERPT_CHARS {
        return first.to_string();
    }

    let cut: String = first.chars().take(EXCERPT_CHARS).collect();
    let trimmed = match cut.rfind(' ') {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end())
}

fn pick_image(media: &[MediaItem]) -> Option<String> {
    media
        .iter()
        .find(|m| {
            m.kind.starts_with("image") || m.medium.as_deref() == Some("image")
        })
        .or_else(|| media.first())
        .map(|m| m.url.clone())
        .filter(|url| !url.is_empty())
}
