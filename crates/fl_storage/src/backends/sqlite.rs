use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fl_core::{
    AlternativeHeadlines, AnalysisResult, AnalysisStatus, AnalysisStore, ArticleId, Claim, Error,
    ProgressPublisher, ProgressState, ProgressUpdate, Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

use crate::backends::memory::normalize_for_storage;
use crate::StorageBackend;

/// How long a writer waits on another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        analysis_status TEXT NOT NULL DEFAULT 'PENDING',
        analysis_progress REAL NOT NULL DEFAULT 0,
        status_message TEXT NOT NULL DEFAULT 'Not started',
        short_title TEXT,
        summary_easy TEXT,
        credibility_score INTEGER,
        bias TEXT,
        sentiment TEXT,
        risk_type TEXT,
        alt_headline_neutral TEXT,
        alt_headline_sensational TEXT,
        alt_headline_calm TEXT,
        latitude REAL,
        longitude REAL,
        analysis_raw TEXT,
        analyzed_at TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_tags (
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        tag TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS red_flags (
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        flag TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trust_signals (
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        signal TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS claims (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        credibility_score INTEGER,
        confidence TEXT,
        reason TEXT,
        historical_context TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS claim_sources (
        claim_id INTEGER NOT NULL REFERENCES claims(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        url TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fact_check_sites (
        claim_id INTEGER NOT NULL REFERENCES claims(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        url TEXT NOT NULL
    )
    "#,
];

/// Tables holding one text value per row, keyed by post.
const POST_LISTS: &[(&str, &str)] = &[
    ("post_tags", "tag"),
    ("red_flags", "flag"),
    ("trust_signals", "signal"),
];

/// Tables holding one text value per row, keyed by claim.
const CLAIM_LISTS: &[&str] = &["claim_sources", "fact_check_sites"];

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Storage(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SQLiteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SQLiteStorage")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("articles.db")).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }
        info!("🗄️ SQLite storage ready at {}", db_path.display());

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn replace_children(
        tx: &mut Transaction<'_, Sqlite>,
        id: ArticleId,
        result: &AnalysisResult,
    ) -> Result<()> {
        for table in CLAIM_LISTS {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE claim_id IN (SELECT id FROM claims WHERE post_id = ?)",
                table
            ))
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_error("Failed to clear claim children"))?;
        }
        sqlx::query("DELETE FROM claims WHERE post_id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_error("Failed to clear claims"))?;

        let lists: [&[String]; 3] = [&result.tags, &result.red_flags, &result.trust_signals];
        for ((table, column), values) in POST_LISTS.iter().zip(lists) {
            sqlx::query(&format!("DELETE FROM {} WHERE post_id = ?", table))
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(db_error("Failed to clear list"))?;
            for (position, value) in values.iter().enumerate() {
                sqlx::query(&format!(
                    "INSERT INTO {} (post_id, position, {}) VALUES (?, ?, ?)",
                    table, column
                ))
                .bind(id)
                .bind(position as i64)
                .bind(value)
                .execute(&mut **tx)
                .await
                .map_err(db_error("Failed to insert list value"))?;
            }
        }

        for (position, claim) in result.claims.iter().enumerate() {
            let claim_id = sqlx::query(
                r#"
                INSERT INTO claims
                (post_id, position, text, credibility_score, confidence, reason, historical_context)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(position as i64)
            .bind(&claim.text)
            .bind(claim.credibility_score)
            .bind(claim.confidence.map(|c| c.to_string()))
            .bind(claim.reason.as_deref())
            .bind(claim.historical_context.as_deref())
            .execute(&mut **tx)
            .await
            .map_err(db_error("Failed to insert claim"))?
            .last_insert_rowid();

            let lists: [&[String]; 2] = [&claim.sources, &claim.fact_check_sites];
            for (table, urls) in CLAIM_LISTS.iter().zip(lists) {
                for (position, url) in urls.iter().enumerate() {
                    sqlx::query(&format!(
                        "INSERT INTO {} (claim_id, position, url) VALUES (?, ?, ?)",
                        table
                    ))
                    .bind(claim_id)
                    .bind(position as i64)
                    .bind(url)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_error("Failed to insert claim link"))?;
                }
            }
        }
        Ok(())
    }

    async fn post_list(&self, table: &str, column: &str, id: ArticleId) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE post_id = ? ORDER BY position",
            column, table
        ))
        .bind(id)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to read list"))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(db_error("Failed to decode list value")))
            .collect()
    }

    async fn claim_list(&self, table: &str, claim_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!(
            "SELECT url FROM {} WHERE claim_id = ? ORDER BY position",
            table
        ))
        .bind(claim_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to read claim links"))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(db_error("Failed to decode claim link")))
            .collect()
    }

    async fn claims(&self, id: ArticleId) -> Result<Vec<Claim>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, credibility_score, confidence, reason, historical_context
            FROM claims WHERE post_id = ? ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to read claims"))?;

        let mut claims = Vec::with_capacity(rows.len());
        for row in rows {
            let decode = || db_error("Failed to decode claim");
            let claim_id: i64 = row.try_get("id").map_err(decode())?;
            let confidence: Option<String> = row.try_get("confidence").map_err(decode())?;
            claims.push(Claim {
                text: row.try_get("text").map_err(decode())?,
                credibility_score: row.try_get("credibility_score").map_err(decode())?,
                confidence: confidence.and_then(|c| c.parse().ok()),
                reason: row.try_get("reason").map_err(decode())?,
                historical_context: row.try_get("historical_context").map_err(decode())?,
                sources: self.claim_list("claim_sources", claim_id).await?,
                fact_check_sites: self.claim_list("fact_check_sites", claim_id).await?,
            });
        }
        Ok(claims)
    }
}

fn progress_from_row(row: &SqliteRow) -> Result<ProgressState> {
    let decode = || db_error("Failed to decode progress");
    let status: String = row.try_get("analysis_status").map_err(decode())?;
    let percent: f64 = row.try_get("analysis_progress").map_err(decode())?;
    let updated_at: String = row.try_get("updated_at").map_err(decode())?;
    Ok(ProgressState {
        percent: percent as f32,
        message: row.try_get("status_message").map_err(decode())?,
        status: status.parse::<AnalysisStatus>()?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| Error::Storage(format!("Failed to parse date: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl ProgressPublisher for SQLiteStorage {
    /// Folds the update into the stored state in a single statement: the
    /// percent only moves up and finished rows are left alone.
    async fn publish_progress(&self, id: ArticleId, update: ProgressUpdate) -> Result<()> {
        let percent = if update.percent.is_finite() {
            update.percent.clamp(0.0, 100.0) as f64
        } else {
            0.0
        };
        let updated = sqlx::query(
            r#"
            UPDATE posts SET
                analysis_progress = MAX(analysis_progress, ?),
                status_message = ?,
                analysis_status = COALESCE(?, analysis_status),
                updated_at = ?
            WHERE id = ? AND analysis_status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(percent)
        .bind(&update.message)
        .bind(update.status.map(|status| status.as_str()))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to write progress"))?
        .rows_affected();

        if updated == 0 {
            debug!("Ignoring progress for unknown or finished article {}", id);
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for SQLiteStorage {
    async fn register_article(&self, title: &str, body: &str) -> Result<ArticleId> {
        let state = ProgressState::pending();
        let id = sqlx::query(
            r#"
            INSERT INTO posts
                (title, body, analysis_status, analysis_progress, status_message, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(body)
        .bind(state.status.as_str())
        .bind(state.percent as f64)
        .bind(&state.message)
        .bind(state.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to register article"))?
        .last_insert_rowid();
        Ok(id)
    }

    async fn reset_progress(&self, id: ArticleId) -> Result<()> {
        let state = ProgressState::pending();
        sqlx::query(
            r#"
            UPDATE posts SET
                analysis_status = ?, analysis_progress = ?, status_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.status.as_str())
        .bind(state.percent as f64)
        .bind(&state.message)
        .bind(state.updated_at.to_rfc3339())
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to reset progress"))?;
        Ok(())
    }

    async fn store_result(&self, id: ArticleId, result: &AnalysisResult) -> Result<()> {
        let stored = normalize_for_storage(result, None);
        let headlines: &AlternativeHeadlines = &stored.alternative_headlines;
        let raw = serde_json::to_string(&stored)?;

        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;
        let updated = sqlx::query(
            r#"
            UPDATE posts SET
                short_title = ?, summary_easy = ?, credibility_score = ?,
                bias = ?, sentiment = ?, risk_type = ?,
                alt_headline_neutral = ?, alt_headline_sensational = ?, alt_headline_calm = ?,
                latitude = COALESCE(?, latitude), longitude = COALESCE(?, longitude),
                analysis_raw = ?, analyzed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&stored.short_title)
        .bind(&stored.summary_easy)
        .bind(stored.credibility_score)
        .bind(&stored.bias)
        .bind(&stored.sentiment)
        .bind(&stored.risk_type)
        .bind(headlines.neutral.as_deref())
        .bind(headlines.sensational.as_deref())
        .bind(headlines.calm.as_deref())
        .bind(stored.latitude)
        .bind(stored.longitude)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store result"))?
        .rows_affected();

        if updated == 0 {
            debug!("Dropping result for unknown article {}", id);
            return Ok(());
        }

        Self::replace_children(&mut tx, id, &stored).await?;
        tx.commit().await.map_err(db_error("Failed to commit result"))?;
        Ok(())
    }

    async fn progress(&self, id: ArticleId) -> Result<Option<ProgressState>> {
        let row = sqlx::query(
            "SELECT analysis_status, analysis_progress, status_message, updated_at FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error("Failed to read progress"))?;
        row.map(|row| progress_from_row(&row)).transpose()
    }

    async fn result(&self, id: ArticleId) -> Result<Option<AnalysisResult>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ? AND analyzed_at IS NOT NULL")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("Failed to read result"))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let decode = || db_error("Failed to decode result");
        let text = |column: &str| -> Result<String> {
            Ok(row
                .try_get::<Option<String>, _>(column)
                .map_err(decode())?
                .unwrap_or_default())
        };

        let mut result = AnalysisResult {
            short_title: text("short_title")?,
            summary_easy: text("summary_easy")?,
            credibility_score: row
                .try_get::<Option<i64>, _>("credibility_score")
                .map_err(decode())?
                .unwrap_or_default(),
            bias: text("bias")?,
            sentiment: text("sentiment")?,
            risk_type: text("risk_type")?,
            alternative_headlines: AlternativeHeadlines {
                neutral: row.try_get("alt_headline_neutral").map_err(decode())?,
                sensational: row.try_get("alt_headline_sensational").map_err(decode())?,
                calm: row.try_get("alt_headline_calm").map_err(decode())?,
            },
            latitude: row.try_get("latitude").map_err(decode())?,
            longitude: row.try_get("longitude").map_err(decode())?,
            ..AnalysisResult::default()
        };
        result.tags = self.post_list("post_tags", "tag", id).await?;
        result.red_flags = self.post_list("red_flags", "flag", id).await?;
        result.trust_signals = self.post_list("trust_signals", "signal", id).await?;
        result.claims = self.claims(id).await?;
        Ok(Some(result))
    }
}
