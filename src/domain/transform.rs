use std::fmt;

use serde::{Deserialize, Serialize};

use crate::app::{LensError, Result};

/// Title and body of an article rewritten at one complexity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleVersion {
    pub title: String,
    pub content: String,
}

impl ArticleVersion {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub title: String,
    pub content: String,
}

impl Translation {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

impl From<ArticleVersion> for Translation {
    fn from(version: ArticleVersion) -> Self {
        Self {
            title: version.title,
            content: version.content,
        }
    }
}

impl From<Translation> for ArticleVersion {
    fn from(translation: Translation) -> Self {
        Self {
            title: translation.title,
            content: translation.content,
        }
    }
}

/// Reading complexity, 1 (Basic) through 5 (Expert).
///
/// Slider positions are 0-based: position `p` selects level `p + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ComplexityLevel(u8);

impl ComplexityLevel {
    pub const MIN: ComplexityLevel = ComplexityLevel(1);
    pub const MAX: ComplexityLevel = ComplexityLevel(5);

    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(LensError::InvalidComplexityLevel(level))
        }
    }

    pub fn from_slider(position: u8) -> Result<Self> {
        Self::new(position.saturating_add(1))
    }

    pub fn slider_position(self) -> u8 {
        self.0 - 1
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Basic",
            2 => "Elementary",
            3 => "Intermediate",
            4 => "Advanced",
            _ => "Expert",
        }
    }

    /// Mode string sent to the rewrite operation.
    pub fn mode(self) -> String {
        self.label().to_lowercase()
    }
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for ComplexityLevel {
    type Error = LensError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ComplexityLevel> for u8 {
    fn from(level: ComplexityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {} ({})", self.0, self.label())
    }
}

/// Target language of a translation, stored lowercase ("english", "hindi").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Language(String);

impl From<String> for Language {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl Language {
    pub const ENGLISH: &'static str = "english";

    pub fn new(code: &str) -> Self {
        Self(code.trim().to_lowercase())
    }

    pub fn english() -> Self {
        Self(Self::ENGLISH.to_string())
    }

    /// English is the identity transform: never fetched, never cached.
    pub fn is_english(&self) -> bool {
        self.0 == Self::ENGLISH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}
