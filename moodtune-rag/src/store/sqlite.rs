//! SQLite track store
//!
//! Single `tracks` table keyed by document id. Title and artist are also stored
//! in normalized form so approximate lookups can match whole tokens.

use super::{MoodQuery, StoreError, StoreResult, TrackStore};
use crate::text::{normalize_for_matching, tokens};
use crate::types::TrackCandidate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;

const TABLE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id TEXT PRIMARY KEY,
        external_id TEXT,
        provider TEXT,
        source TEXT,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        title_norm TEXT NOT NULL,
        artist_norm TEXT NOT NULL,
        uri TEXT,
        preview_url TEXT,
        image_url TEXT,
        thumbnail_url TEXT,
        mood TEXT,
        valence REAL NOT NULL DEFAULT 0.0,
        energy REAL NOT NULL DEFAULT 0.0,
        embedding TEXT,
        llm_text TEXT,
        created_at TEXT
    )
"#;

const INDEX_DDL: &str = "CREATE INDEX IF NOT EXISTS idx_tracks_mood ON tracks (mood, valence, energy)";

const SELECT_COLUMNS: &str = "id, external_id, provider, source, title, artist, uri, preview_url, \
     image_url, thumbnail_url, mood, valence, energy, embedding, llm_text, created_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `db_path`
    pub async fn connect(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database (single connection so every query sees the same data)
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    async fn create_tables(&self) -> StoreResult<()> {
        sqlx::query(TABLE_DDL).execute(&self.pool).await?;
        sqlx::query(INDEX_DDL).execute(&self.pool).await?;
        Ok(())
    }
}

fn is_missing_table(err: &sqlx::Error) -> bool {
    err.to_string().contains("no such table")
}

fn row_to_track(row: &SqliteRow) -> StoreResult<TrackCandidate> {
    let embedding: Option<String> = row.try_get("embedding")?;
    let embedding = match embedding {
        Some(json) => Some(
            serde_json::from_str::<Vec<f32>>(&json)
                .map_err(|e| StoreError::Parse(format!("embedding: {}", e)))?,
        ),
        None => None,
    };

    Ok(TrackCandidate {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        provider: row.try_get("provider")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        uri: row.try_get("uri")?,
        preview_url: row.try_get("preview_url")?,
        image_url: row.try_get("image_url")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        mood: row.try_get("mood")?,
        valence: row.try_get("valence")?,
        energy: row.try_get("energy")?,
        embedding,
        llm_text: row.try_get("llm_text")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
    })
}

#[async_trait]
impl TrackStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn search(&self, query: &MoodQuery) -> StoreResult<Vec<TrackCandidate>> {
        let sql = format!(
            "SELECT {} FROM tracks \
             WHERE mood = ? AND valence BETWEEN ? AND ? AND energy BETWEEN ? AND ? \
             ORDER BY id LIMIT ?",
            SELECT_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(&query.mood)
            .bind(query.valence.lo)
            .bind(query.valence.hi)
            .bind(query.energy.lo)
            .bind(query.energy.hi)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await;

        match result {
            Ok(rows) => rows.iter().map(row_to_track).collect(),
            Err(e) if is_missing_table(&e) => {
                tracing::info!("tracks table missing, creating it");
                self.create_tables().await?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_many(&self, docs: &[TrackCandidate]) -> StoreResult<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        self.create_tables().await?;

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for doc in docs {
            let Some(id) = &doc.id else {
                continue;
            };
            let embedding = match &doc.embedding {
                Some(vector) => Some(
                    serde_json::to_string(vector)
                        .map_err(|e| StoreError::Parse(format!("embedding: {}", e)))?,
                ),
                None => None,
            };
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO tracks (
                    id, external_id, provider, source, title, artist, title_norm, artist_norm,
                    uri, preview_url, image_url, thumbnail_url, mood, valence, energy,
                    embedding, llm_text, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(&doc.external_id)
            .bind(&doc.provider)
            .bind(&doc.source)
            .bind(&doc.title)
            .bind(&doc.artist)
            .bind(normalize_for_matching(&doc.title))
            .bind(normalize_for_matching(&doc.artist))
            .bind(&doc.uri)
            .bind(&doc.preview_url)
            .bind(&doc.image_url)
            .bind(&doc.thumbnail_url)
            .bind(&doc.mood)
            .bind(doc.valence)
            .bind(doc.energy)
            .bind(embedding)
            .bind(&doc.llm_text)
            .bind(doc.created_at)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }
        tx.commit().await?;

        tracing::debug!(written, "SQLite upsert committed");
        Ok(written)
    }

    async fn find_by_title_artist(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> StoreResult<Vec<TrackCandidate>> {
        let title_tokens = tokens(title);
        let artist_tokens = tokens(artist);
        if title_tokens.is_empty() || artist_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM tracks WHERE 1 = 1", SELECT_COLUMNS));
        for token in &title_tokens {
            qb.push(" AND (' ' || title_norm || ' ') LIKE ");
            qb.push_bind(format!("% {} %", token));
        }
        for token in &artist_tokens {
            qb.push(" AND (' ' || artist_norm || ' ') LIKE ");
            qb.push_bind(format!("% {} %", token));
        }
        qb.push(" LIMIT ");
        qb.push_bind(limit.max(1) as i64);

        match qb.build().fetch_all(&self.pool).await {
            Ok(rows) => rows.iter().map(row_to_track).collect(),
            Err(e) if is_missing_table(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self) -> StoreResult<u64> {
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await
        {
            Ok(n) => Ok(n.max(0) as u64),
            Err(e) if is_missing_table(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        self.create_tables().await?;
        tracing::info!("Database tables initialized (tracks)");
        Ok(())
    }

    async fn recreate_collection(&self) -> StoreResult<()> {
        sqlx::query("DROP TABLE IF EXISTS tracks")
            .execute(&self.pool)
            .await?;
        self.create_tables().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::ValueRange;

    fn doc(id: &str, title: &str, artist: &str, mood: &str, v: f64, e: f64) -> TrackCandidate {
        TrackCandidate {
            id: Some(id.to_string()),
            mood: Some(mood.to_string()),
            valence: v,
            energy: e,
            ..TrackCandidate::new(title, artist)
        }
    }

    fn happy_query(limit: usize) -> MoodQuery {
        MoodQuery::new(
            "happy",
            ValueRange { lo: 0.6, hi: 1.0 },
            ValueRange { lo: 0.5, hi: 1.0 },
            limit,
        )
    }

    #[tokio::test]
    async fn test_missing_table_reads_as_empty() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.find_by_title_artist("a", "b", 1).await.unwrap().is_empty());
        assert!(store.search(&happy_query(10)).await.unwrap().is_empty());
        // search created the table
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_filters_mood_and_ranges() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_many(&[
                doc("1", "Walking on Sunshine", "Katrina and the Waves", "happy", 0.9, 0.8),
                doc("2", "Hurt", "Johnny Cash", "sad", 0.1, 0.2),
                doc("3", "Low Energy", "Somebody", "happy", 0.9, 0.2),
                doc("4", "Edge", "Boundary", "happy", 0.6, 0.5),
            ])
            .await
            .unwrap();

        let hits = store.search(&happy_query(10)).await.unwrap();
        let ids: Vec<_> = hits.iter().filter_map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["1".to_string(), "4".to_string()]);

        let limited = store.search(&happy_query(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id_and_keeps_embedding() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut first = doc("a", "Song", "Artist", "happy", 0.7, 0.7);
        first.embedding = Some(vec![0.25, -0.5]);
        first.created_at = Some(Utc::now());
        store.upsert_many(&[first.clone()]).await.unwrap();

        let mut second = first.clone();
        second.valence = 0.95;
        store.upsert_many(&[second]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&happy_query(5)).await.unwrap();
        assert_eq!(hits[0].valence, 0.95);
        assert_eq!(hits[0].embedding, Some(vec![0.25, -0.5]));
    }

    #[tokio::test]
    async fn test_find_matches_whole_tokens() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_many(&[
                doc("1", "Don't Stop Me Now", "Queen", "happy", 0.9, 0.9),
                doc("2", "Stopwatch", "Queens of Time", "happy", 0.9, 0.9),
            ])
            .await
            .unwrap();

        let hits = store.find_by_title_artist("don't stop", "QUEEN", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_recreate_drops_documents() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_many(&[doc("1", "A", "B", "sad", 0.1, 0.1)])
            .await
            .unwrap();
        store.recreate_collection().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
