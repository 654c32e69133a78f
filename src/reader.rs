use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, LensError, Result};
use crate::cache::RequestScope;
use crate::domain::{Article, ArticleVersion, ComplexityLevel, Language, Translation};
use crate::transform::{ComplexityStore, ExplainStore, SummaryStore, TranslationStore};

/// Find the article with `id`.
pub fn locate<'a>(articles: &'a [Article], id: &str) -> Result<&'a Article> {
    articles
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| LensError::ArticleNotFound(id.to_string()))
}

/// One open article and the transforms applied to it.
///
/// Displayed text is resolved in this order: the summary while summary mode
/// is on, then the selected translation, then the version at the current
/// complexity level (unless the reader chose the original), then the
/// original text.
///
/// Requests issued through the view are tied to it: [`close`](Self::close)
/// cancels whatever is still outstanding. A request nobody else waits on is
/// abandoned without writing to the cache.
pub struct ArticleView {
    article: Article,
    complexity: ComplexityStore,
    translations: TranslationStore,
    summaries: SummaryStore,
    explain: ExplainStore,
    token: CancellationToken,
    scope: RequestScope,
    summary_mode: bool,
    language: Language,
    translated: Option<Translation>,
}

impl ArticleView {
    pub fn open(ctx: &AppContext, article: Article) -> Self {
        let token = CancellationToken::new();
        Self {
            article,
            complexity: ctx.complexity.clone(),
            translations: ctx.translations.clone(),
            summaries: ctx.summaries.clone(),
            explain: ctx.explain.clone(),
            scope: RequestScope::new(token.clone()),
            token,
            summary_mode: false,
            language: Language::english(),
            translated: None,
        }
    }

    pub fn article(&self) -> &Article {
        &self.article
    }

    fn original(&self) -> ArticleVersion {
        self.article.original_version()
    }

    fn displayed_version(&self) -> ArticleVersion {
        if let Some(translation) = &self.translated {
            return translation.clone().into();
        }
        self.complexity
            .get_article_version(&self.article.id)
            .unwrap_or_else(|| self.original())
    }

    pub fn title(&self) -> String {
        self.displayed_version().title
    }

    pub fn content(&self) -> String {
        if self.summary_mode {
            return self.summaries.get_summary(&self.article.id).unwrap_or_default();
        }
        self.displayed_version().content
    }

    /// Displayed content split on blank lines.
    pub fn paragraphs(&self) -> Vec<String> {
        self.content()
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn is_summary_mode(&self) -> bool {
        self.summary_mode
    }

    /// Flip between summary and full text. The summary is fetched the first
    /// time only. Returns the new mode.
    pub async fn toggle_summary(&mut self) -> Result<bool> {
        if self.summary_mode {
            self.summary_mode = false;
            return Ok(false);
        }

        let content = self.article.display_content().to_string();
        self.summaries
            .request_summary_scoped(&self.article.id, &content, &self.scope)
            .await?;
        self.summary_mode = true;
        Ok(true)
    }

    pub fn is_loading_summary(&self) -> bool {
        self.summaries.is_loading(&self.article.id)
    }

    pub async fn set_level(&self, level: ComplexityLevel) -> Result<ArticleVersion> {
        let source = self.original();
        self.complexity
            .request_version_scoped(&self.article.id, level, &source, &self.scope)
            .await
    }

    pub fn set_show_original(&self, show: bool) {
        self.complexity.set_show_original(show);
    }

    pub fn is_loading_level(&self, level: ComplexityLevel) -> bool {
        self.complexity.is_loading_version(&self.article.id, level)
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Show the article in `language`. English restores the untranslated
    /// text.
    pub async fn select_language(&mut self, language: Language) -> Result<()> {
        let original = Translation::from(self.original());
        let translation = self
            .translations
            .request_translation_scoped(&self.article.id, &language, &original, &self.scope)
            .await?;

        self.translated = if language.is_english() {
            None
        } else {
            Some(translation)
        };
        self.language = language;
        Ok(())
    }

    pub fn is_translating(&self) -> bool {
        self.translations.is_loading_language(&self.language)
    }

    /// Explain `selection` taken from the paragraph at `index`.
    pub async fn explain(&self, index: usize, selection: &str) -> Result<Option<String>> {
        if index >= self.paragraphs().len() {
            return Err(LensError::Other(format!("No paragraph {}", index + 1)));
        }

        self.explain
            .request_explanation_scoped(&self.article.id, selection, &self.scope)
            .await
    }

    /// Cancel this view's outstanding requests.
    pub fn close(&self) {
        self.token.cancel();
    }
}
