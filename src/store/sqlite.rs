//! SQLite-backed [`UrlStore`] on an sqlx pool.

use super::{NewUrl, Selection, UrlListing, UrlRecord, UrlStore};
use crate::error::{RedirectorError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and run the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database,
        // so those get exactly one connection that is never recycled.
        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!("Connected to URL store at {}", database_url);
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                name TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS selection (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                selected_url_id INTEGER
            );",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[async_trait]
impl UrlStore for SqliteStore {
    async fn ensure_selection(&self) -> Result<Selection> {
        sqlx::query(
            "INSERT INTO selection (id, selected_url_id) VALUES (?, NULL)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(Selection::SINGLETON_ID)
        .execute(&self.pool)
        .await?;

        let selected =
            sqlx::query_scalar::<_, Option<i64>>("SELECT selected_url_id FROM selection WHERE id = ?")
                .bind(Selection::SINGLETON_ID)
                .fetch_one(&self.pool)
                .await?;

        Ok(Selection::singleton(selected))
    }

    async fn list_urls(&self) -> Result<Vec<UrlListing>> {
        let urls = sqlx::query_as::<_, UrlListing>(
            "SELECT u.id, u.url, u.name, (s.id IS NOT NULL) AS selected
             FROM urls u
             LEFT JOIN selection s ON s.id = ? AND s.selected_url_id = u.id
             ORDER BY u.id",
        )
        .bind(Selection::SINGLETON_ID)
        .fetch_all(&self.pool)
        .await?;

        Ok(urls)
    }

    async fn insert_url(&self, url: NewUrl) -> Result<UrlRecord> {
        let created = sqlx::query_as::<_, UrlRecord>(
            "INSERT INTO urls (url, name) VALUES (?, ?) RETURNING id, url, name",
        )
        .bind(&url.url)
        .bind(&url.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn delete_url(&self, id: i64) -> Result<UrlRecord> {
        let mut tx = self.pool.begin().await?;

        let cleared = sqlx::query(
            "UPDATE selection SET selected_url_id = NULL WHERE id = ? AND selected_url_id = ?",
        )
        .bind(Selection::SINGLETON_ID)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query_as::<_, UrlRecord>(
            "DELETE FROM urls WHERE id = ? RETURNING id, url, name",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the selection update.
        let deleted = deleted.ok_or(RedirectorError::NotFound { id })?;
        tx.commit().await?;

        if cleared.rows_affected() > 0 {
            tracing::info!("Deleted URL {} was selected; selection cleared", id);
        }
        Ok(deleted)
    }

    async fn select_url(&self, id: i64) -> Result<Selection> {
        let selected = sqlx::query_scalar::<_, Option<i64>>(
            "UPDATE selection SET selected_url_id = ? WHERE id = ? RETURNING selected_url_id",
        )
        .bind(id)
        .bind(Selection::SINGLETON_ID)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RedirectorError::Store {
            message: "selection record is missing".to_string(),
        })?;

        Ok(Selection::singleton(selected))
    }

    async fn selected_url(&self) -> Result<Option<UrlRecord>> {
        // One statement, so the pointer and the row it names are read together.
        let row: Option<(Option<i64>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT u.id, u.url, u.name
             FROM selection s
             LEFT JOIN urls u ON u.id = s.selected_url_id
             WHERE s.id = ?",
        )
        .bind(Selection::SINGLETON_ID)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Err(RedirectorError::Store {
                message: "selection record is missing".to_string(),
            }),
            Some((Some(id), Some(url), Some(name))) => Ok(Some(UrlRecord { id, url, name })),
            Some(_) => Ok(None),
        }
    }
}
