use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use sha2::{Digest, Sha256};

use crate::app::{LensError, Result};
use crate::domain::{ArticleVersion, ComplexityLevel, Interest, Language, Translation};
use crate::store::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| LensError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            LensError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Stable row id for a free-text signal.
    pub fn description_id(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Store for SqliteStore {
    fn get_selected_interests(&self) -> Result<Vec<Interest>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name FROM selected_interests ORDER BY position, id")?;

        let interests = stmt
            .query_map([], |row| {
                Ok(Interest {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(interests)
    }

    fn add_selected_interest(&self, interest: &Interest) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO selected_interests (id, name, position)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1 FROM selected_interests))",
            params![interest.id, interest.name],
        )?;
        Ok(())
    }

    fn remove_selected_interest(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM selected_interests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn get_blog_descriptions(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT text FROM blog_descriptions ORDER BY rowid")?;
        let texts = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(texts)
    }

    fn add_blog_description(&self, text: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO blog_descriptions (id, text, added_at) VALUES (?1, ?2, ?3)",
            params![Self::description_id(text), text, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_blog_description(&self, text: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM blog_descriptions WHERE id = ?1",
            params![Self::description_id(text)],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_article_versions(&self) -> Result<Vec<(String, ComplexityLevel, ArticleVersion)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT article_id, level, title, content FROM article_versions
             ORDER BY article_id, level",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let versions = rows
            .into_iter()
            .filter_map(|(article_id, level, title, content)| {
                let level = u8::try_from(level)
                    .ok()
                    .and_then(|l| ComplexityLevel::new(l).ok());
                match level {
                    Some(level) => Some((article_id, level, ArticleVersion { title, content })),
                    None => {
                        tracing::warn!("Skipping stored version of {} with bad level", article_id);
                        None
                    }
                }
            })
            .collect();

        Ok(versions)
    }

    fn put_article_version(
        &self,
        article_id: &str,
        level: ComplexityLevel,
        version: &ArticleVersion,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO article_versions (article_id, level, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(article_id, level) DO UPDATE SET title = ?3, content = ?4, created_at = ?5",
            params![
                article_id,
                level.value(),
                version.title,
                version.content,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn get_translations(&self) -> Result<Vec<(String, Language, Translation)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT blog_id, language, title, content FROM translations ORDER BY blog_id, language",
        )?;

        let translations = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Language::new(&row.get::<_, String>(1)?),
                    Translation {
                        title: row.get(2)?,
                        content: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(translations)
    }

    fn put_translation(
        &self,
        blog_id: &str,
        language: &Language,
        translation: &Translation,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO translations (blog_id, language, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(blog_id, language) DO UPDATE SET title = ?3, content = ?4, created_at = ?5",
            params![
                blog_id,
                language.as_str(),
                translation.title,
                translation.content,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn get_summaries(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT blog_id, summary FROM summaries ORDER BY blog_id")?;
        let summaries = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, String)>, _>>()?;
        Ok(summaries)
    }

    fn put_summary(&self, blog_id: &str, summary: &str) -> Result<()> {
        let conn = self.conn()?;
        // Summaries are created once and never overwritten
        conn.execute(
            "INSERT OR IGNORE INTO summaries (blog_id, summary, created_at) VALUES (?1, ?2, ?3)",
            params![blog_id, summary, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in [
            "selected_interests",
            "blog_descriptions",
            "settings",
            "article_versions",
            "translations",
            "summaries",
        ] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }
        tx.commit()?;
        Ok(())
    }
}
