use crate::app::{AppContext, LensError, Result};
use crate::domain::{
    filter_by_category, find_in_catalog, Article, ComplexityLevel, FontSize, Language,
    SearchResult,
};
use crate::normalizer::html_to_text;
use crate::reader::{locate, ArticleView};

async fn load_articles(ctx: &AppContext, category: Option<&str>) -> Result<Vec<Article>> {
    let feeds = ctx.service.list_feeds().await?;
    let feeds = filter_by_category(feeds, category);
    Ok(ctx.normalizer.normalize_feeds(&feeds))
}

pub async fn list_feeds(ctx: &AppContext, category: Option<&str>) -> Result<()> {
    let articles = load_articles(ctx, category).await?;

    if articles.is_empty() {
        println!("No articles");
        return Ok(());
    }

    for article in articles {
        let date = article
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!(
            "{} {}  {}\n  {} [{}]",
            date,
            article.id,
            article.display_title(),
            article.feed_name,
            article.category
        );
    }

    Ok(())
}

pub fn list_interests(ctx: &AppContext) {
    for interest in ctx.interests.interests() {
        let marker = if ctx.interests.is_selected(&interest.id) {
            "x"
        } else {
            " "
        };
        println!("[{}] {:>2} {}", marker, interest.id, interest.name);
    }
}

pub fn add_interest(ctx: &AppContext, key: &str) -> Result<()> {
    let interest = find_in_catalog(ctx.interests.interests(), key)
        .ok_or_else(|| LensError::Other(format!("Unknown interest: {}", key)))?;
    ctx.interests.add_interest(interest);
    println!("Selected {}", interest.name);
    Ok(())
}

pub fn remove_interest(ctx: &AppContext, key: &str) -> Result<()> {
    let interest = find_in_catalog(ctx.interests.interests(), key)
        .ok_or_else(|| LensError::Other(format!("Unknown interest: {}", key)))?;
    ctx.interests.remove_interest(&interest.id);
    println!("Deselected {}", interest.name);
    Ok(())
}

/// Close onboarding: fetch recommendations, then latch the gate.
pub async fn finish_interests(ctx: &AppContext) -> Result<()> {
    if ctx.interests.selected_interests().is_empty() {
        println!("Choose at least one topic first (lens interests add <name>)");
        return Ok(());
    }

    recommend(ctx).await?;
    ctx.interests.set_has_selected_interests(true);
    Ok(())
}

pub fn list_signals(ctx: &AppContext) {
    let signals = ctx.interests.blog_descriptions();
    if signals.is_empty() {
        println!("No signals");
        return;
    }
    for signal in signals {
        println!("- {}", signal);
    }
}

pub fn add_signal(ctx: &AppContext, text: &str) {
    if text.trim().is_empty() {
        println!("Ignoring empty signal");
        return;
    }
    ctx.interests.add_blog_description(text);
    println!("Added signal: {}", text.trim());
}

pub fn remove_signal(ctx: &AppContext, text: &str) {
    ctx.interests.remove_blog_description(text);
    println!("Removed signal: {}", text.trim());
}

pub async fn recommend(ctx: &AppContext) -> Result<()> {
    if ctx.interests.queries().is_empty() {
        println!("No interests or signals yet (lens interests add <name>)");
        return Ok(());
    }

    println!("Searching...");
    if ctx.interests.fetch_search_results().await.is_err() {
        if let Some(message) = ctx.interests.error() {
            eprintln!("{}", message);
        }
    }

    print_results(ctx, &ctx.interests.search_results());
    Ok(())
}

fn print_results(ctx: &AppContext, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No recommendations");
        return;
    }

    for result in results {
        let article = ctx.normalizer.normalize_search_result(result);
        println!(
            "{:.2} {}  {}\n  {} [{}]",
            result.relevance_score,
            article.id,
            article.display_title(),
            article.feed_name,
            article.category
        );
    }
}

#[derive(Debug, Default)]
pub struct ReadOptions {
    pub level: Option<u8>,
    pub original: bool,
    pub lang: Option<String>,
    pub summary: bool,
    pub full: bool,
}

async fn open_article(ctx: &AppContext, item_id: &str, full: bool) -> Result<ArticleView> {
    let articles = load_articles(ctx, None).await?;
    let mut article = locate(&articles, item_id)?.clone();

    if full {
        match article.link.clone() {
            Some(link) => match ctx.service.extract_blog(&link).await {
                Ok(blog) => article.content = Some(html_to_text(&blog.content)),
                Err(e) => eprintln!("Could not fetch the full text: {}", e),
            },
            None => eprintln!("Article has no link to fetch the full text from"),
        }
    }

    Ok(ArticleView::open(ctx, article))
}

/// Open an article and apply the requested transforms. Reading it records
/// its description as an interest signal.
pub async fn read(ctx: &AppContext, item_id: &str, options: ReadOptions) -> Result<()> {
    let mut view = open_article(ctx, item_id, options.full).await?;
    if let Some(description) = &view.article().summary {
        ctx.interests.add_blog_description(description);
    }

    if options.original {
        view.set_show_original(true);
    } else if let Some(level) = options.level {
        let level = ComplexityLevel::new(level)?;
        if view.set_level(level).await.is_err() {
            if let Some(message) = ctx.complexity.last_error() {
                eprintln!("{}", message);
            }
        }
    }

    if let Some(lang) = options.lang {
        if view.select_language(Language::new(&lang)).await.is_err() {
            if let Some(message) = ctx.translations.last_error() {
                eprintln!("{}", message);
            }
        }
    }

    if options.summary && view.toggle_summary().await.is_err() {
        if let Some(message) = ctx.summaries.last_error() {
            eprintln!("{}", message);
        }
    }

    print_view(ctx, &view);
    Ok(())
}

fn print_view(ctx: &AppContext, view: &ArticleView) {
    let title = view.title();
    let article = view.article();

    println!("{}", title);
    println!("{}", "=".repeat(title.chars().count().min(80)));
    let mut meta = vec![article.feed_name.clone()];
    if let Some(date) = article.published_at {
        meta.push(date.format("%Y-%m-%d").to_string());
    }
    if view.is_summary_mode() {
        meta.push("Summary".to_string());
    } else if !ctx.complexity.show_original() {
        meta.push(ctx.complexity.complexity_level().to_string());
    }
    if !view.language().is_english() {
        meta.push(view.language().to_string());
    }
    meta.push(format!("{} text", ctx.font_size()));
    println!("{}\n", meta.join(" | "));

    for (index, paragraph) in view.paragraphs().iter().enumerate() {
        println!("[{}] {}\n", index + 1, paragraph);
    }

    if let Some(link) = &article.link {
        println!("{}", link);
    }
}

pub async fn explain(ctx: &AppContext, item_id: &str, text: &str) -> Result<()> {
    let selection = text.trim();
    if selection.is_empty() {
        println!("Select some text to explain");
        return Ok(());
    }

    let view = open_article(ctx, item_id, false).await?;
    let index = view
        .paragraphs()
        .iter()
        .position(|p| p.contains(selection))
        .ok_or_else(|| LensError::Other(format!("Selection not found in article: {}", selection)))?;

    match view.explain(index, selection).await {
        Ok(Some(explanation)) => println!("{}", explanation),
        Ok(None) => println!("Select some text to explain"),
        Err(e) if e.is_network_failure() => {
            if let Some(message) = ctx.explain.last_error() {
                eprintln!("{}", message);
            }
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

pub fn font_size(ctx: &AppContext, size: Option<&str>) -> Result<()> {
    match size {
        None => println!("{}", ctx.font_size()),
        Some(raw) => match raw.parse::<FontSize>() {
            Ok(size) => {
                ctx.set_font_size(size)?;
                println!("Font size set to {}", size);
            }
            Err(e) => eprintln!("{} (keeping {})", e, ctx.font_size()),
        },
    }
    Ok(())
}

pub fn reset(ctx: &AppContext) -> Result<()> {
    ctx.reset()?;
    println!("Cleared interests, signals, settings and cached articles");
    Ok(())
}
