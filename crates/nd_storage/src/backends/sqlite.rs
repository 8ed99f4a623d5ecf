use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nd_core::{Article, ArticleQuery, ArticleStorage, Error, Result, RunStatus, ScrapeRun, Statistics};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

/// Applied in order; `PRAGMA user_version` records how many have run.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        url TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        title TEXT NOT NULL,
        author TEXT,
        published_date TEXT,
        category TEXT NOT NULL,
        body_text TEXT NOT NULL,
        summary TEXT,
        image_url TEXT,
        word_count INTEGER NOT NULL DEFAULT 0,
        sentiment_score REAL NOT NULL DEFAULT 0,
        collected_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source)",
    "CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published_date ON articles(published_date)",
    "CREATE INDEX IF NOT EXISTS idx_articles_collected_at ON articles(collected_at)",
    r#"
    CREATE TABLE IF NOT EXISTS scrape_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL,
        articles_found INTEGER NOT NULL DEFAULT 0,
        articles_scraped INTEGER NOT NULL DEFAULT 0,
        articles_saved INTEGER NOT NULL DEFAULT 0,
        articles_updated INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        error_message TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scrape_runs_started_at ON scrape_runs(started_at)",
    // Lowercased copies for filtering; SQLite's LOWER() only folds ASCII.
    "ALTER TABLE articles ADD COLUMN title_lower TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE articles ADD COLUMN body_lower TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE articles ADD COLUMN category_lower TEXT NOT NULL DEFAULT ''",
    "CREATE INDEX IF NOT EXISTS idx_articles_category_lower ON articles(category_lower)",
];

/// Schema version after which the lowercased columns exist.
const LOWERCASE_COLUMNS_VERSION: usize = 10;

const ARTICLE_COLUMNS: &str = "url, source, title, author, published_date, category, body_text, \
     summary, image_url, word_count, sentiment_score, collected_at, updated_at";

fn db_err(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

/// `%`, `_` and `\` taken literally inside a LIKE pattern.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let read = db_err("Failed to read article row");
    Ok(Article {
        url: row.try_get("url").map_err(&read)?,
        source: row.try_get("source").map_err(&read)?,
        title: row.try_get("title").map_err(&read)?,
        author: row.try_get("author").map_err(&read)?,
        published_date: row.try_get("published_date").map_err(&read)?,
        category: row.try_get("category").map_err(&read)?,
        body_text: row.try_get("body_text").map_err(&read)?,
        summary: row.try_get("summary").map_err(&read)?,
        image_url: row.try_get("image_url").map_err(&read)?,
        word_count: row.try_get::<i64, _>("word_count").map_err(&read)? as u32,
        sentiment_score: row.try_get("sentiment_score").map_err(&read)?,
        collected_at: row.try_get("collected_at").map_err(&read)?,
        updated_at: row.try_get("updated_at").map_err(&read)?,
    })
}

fn row_to_run(row: &SqliteRow) -> Result<ScrapeRun> {
    let read = db_err("Failed to read scrape run row");
    let count = |column: &str| row.try_get::<i64, _>(column).map(|n| n as u32).map_err(&read);
    Ok(ScrapeRun {
        source: row.try_get("source").map_err(&read)?,
        started_at: row.try_get("started_at").map_err(&read)?,
        finished_at: row.try_get("finished_at").map_err(&read)?,
        articles_found: count("articles_found")?,
        articles_scraped: count("articles_scraped")?,
        articles_saved: count("articles_saved")?,
        articles_updated: count("articles_updated")?,
        status: row.try_get::<String, _>("status").map_err(&read)?.parse::<RunStatus>()?,
        error_message: row.try_get("error_message").map_err(&read)?,
    })
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        let storage = Self {
            pool,
            db_path: db_path.to_path_buf(),
        };
        storage.migrate().await?;
        info!(path = %db_path.display(), "💾 SQLite database ready");
        Ok(storage)
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn migrate(&self) -> Result<()> {
        let applied: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to read schema version"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(applied.max(0) as usize) {
            let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin migration"))?;
            sqlx::query(migration)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
            // PRAGMA does not accept bound parameters
            sqlx::query(&format!("PRAGMA user_version = {}", i + 1))
                .execute(&mut *tx)
                .await
                .map_err(db_err("Failed to record schema version"))?;
            tx.commit().await.map_err(db_err("Failed to commit migration"))?;
            debug!(migration = i, "Applied migration");
        }

        if (applied.max(0) as usize) < LOWERCASE_COLUMNS_VERSION {
            self.backfill_lowercase_columns().await?;
        }
        Ok(())
    }

    /// Fills the lowercased columns for rows written before they existed.
    async fn backfill_lowercase_columns(&self) -> Result<()> {
        let rows = sqlx::query("SELECT url, title, body_text, category FROM articles")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to read articles for backfill"))?;
        if rows.is_empty() {
            return Ok(());
        }

        let read = db_err("Failed to read article row");
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin backfill"))?;
        for row in &rows {
            let url: String = row.try_get("url").map_err(&read)?;
            let title: String = row.try_get("title").map_err(&read)?;
            let body: String = row.try_get("body_text").map_err(&read)?;
            let category: String = row.try_get("category").map_err(&read)?;
            sqlx::query(
                "UPDATE articles SET title_lower = ?, body_lower = ?, category_lower = ? WHERE url = ?",
            )
            .bind(title.to_lowercase())
            .bind(body.to_lowercase())
            .bind(category.to_lowercase())
            .bind(url)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to backfill article"))?;
        }
        tx.commit().await.map_err(db_err("Failed to commit backfill"))?;
        info!(rows = rows.len(), "Backfilled lowercased article columns");
        Ok(())
    }

    async fn count_where_since(&self, column: &str, since: DateTime<Utc>) -> Result<BTreeMap<String, u64>> {
        let sql = format!(
            "SELECT {col} AS key, COUNT(*) AS n FROM articles WHERE collected_at >= ? GROUP BY {col}",
            col = column
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to aggregate articles"))?;
        collect_counts(&rows)
    }
}

fn collect_counts(rows: &[SqliteRow]) -> Result<BTreeMap<String, u64>> {
    let read = db_err("Failed to read aggregate row");
    rows.iter()
        .map(|row| {
            let key: String = row.try_get("key").map_err(&read)?;
            let n: i64 = row.try_get("n").map_err(&read)?;
            Ok((key, n as u64))
        })
        .collect()
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (url, source, title, author, published_date, category, body_text,
             summary, image_url, word_count, sentiment_score, collected_at, updated_at,
             title_lower, body_lower, category_lower)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                source = excluded.source,
                title = excluded.title,
                author = excluded.author,
                published_date = excluded.published_date,
                category = excluded.category,
                body_text = excluded.body_text,
                summary = excluded.summary,
                image_url = excluded.image_url,
                word_count = excluded.word_count,
                sentiment_score = excluded.sentiment_score,
                updated_at = excluded.updated_at,
                title_lower = excluded.title_lower,
                body_lower = excluded.body_lower,
                category_lower = excluded.category_lower
            "#,
        )
        .bind(&article.url)
        .bind(&article.source)
        .bind(&article.title)
        .bind(article.author.as_deref())
        .bind(article.published_date)
        .bind(&article.category)
        .bind(&article.body_text)
        .bind(article.summary.as_deref())
        .bind(article.image_url.as_deref())
        .bind(article.word_count as i64)
        .bind(article.sentiment_score)
        .bind(article.collected_at)
        .bind(article.updated_at)
        .bind(article.title.to_lowercase())
        .bind(article.body_text.to_lowercase())
        .bind(article.category.to_lowercase())
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to store article"))?;

        tx.commit().await.map_err(db_err("Failed to commit article"))?;
        Ok(())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {} FROM articles WHERE url = ?", ARTICLE_COLUMNS))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to get article"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn query_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM articles WHERE 1 = 1", ARTICLE_COLUMNS));

        if !query.sources.is_empty() {
            builder.push(" AND source IN (");
            let mut list = builder.separated(", ");
            for source in &query.sources {
                list.push_bind(source.clone());
            }
            list.push_unseparated(")");
        }

        let categories = query.normalized_categories();
        if !categories.is_empty() {
            builder.push(" AND category_lower IN (");
            let mut list = builder.separated(", ");
            for category in categories {
                list.push_bind(category);
            }
            list.push_unseparated(")");
        }

        let keywords = query.normalized_keywords();
        if !keywords.is_empty() {
            builder.push(" AND (");
            for (i, keyword) in keywords.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                let pattern = like_pattern(keyword);
                builder
                    .push("title_lower LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\' OR body_lower LIKE ")
                    .push_bind(pattern)
                    .push(" ESCAPE '\\'");
            }
            builder.push(")");
        }

        builder
            .push(" ORDER BY collected_at DESC, url ASC LIMIT ")
            .push_bind(query.effective_limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.effective_offset() as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to query articles"))?;
        rows.iter().map(row_to_article).collect()
    }

    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles WHERE source = ? ORDER BY collected_at DESC, url ASC",
            ARTICLE_COLUMNS
        ))
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to get articles by source"))?;
        rows.iter().map(row_to_article).collect()
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count articles"))?;
        Ok(n as u64)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let cutoff = Utc::now() - Duration::hours(24);

        let recent: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE collected_at >= ?")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count recent articles"))?;

        let all_rows = sqlx::query("SELECT source AS key, COUNT(*) AS n FROM articles GROUP BY source")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to aggregate articles"))?;

        let last_updated: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM articles ORDER BY updated_at DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err("Failed to read last update"))?;

        Ok(Statistics {
            total_articles: self.count().await?,
            recent_articles: recent as u64,
            all_articles_by_source: collect_counts(&all_rows)?,
            articles_by_source: self.count_where_since("source", cutoff).await?,
            articles_by_category: self.count_where_since("category", cutoff).await?,
            last_updated,
        })
    }

    async fn record_scrape_run(&self, run: &ScrapeRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_runs
            (source, started_at, finished_at, articles_found, articles_scraped,
             articles_saved, articles_updated, status, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.source)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.articles_found as i64)
        .bind(run.articles_scraped as i64)
        .bind(run.articles_saved as i64)
        .bind(run.articles_updated as i64)
        .bind(run.status.as_str())
        .bind(run.error_message.as_deref())
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to record scrape run"))?;
        Ok(())
    }

    async fn recent_scrape_runs(&self, limit: u32) -> Result<Vec<ScrapeRun>> {
        let rows = sqlx::query(
            "SELECT source, started_at, finished_at, articles_found, articles_scraped, \
             articles_saved, articles_updated, status, error_message \
             FROM scrape_runs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list scrape runs"))?;
        rows.iter().map(row_to_run).collect()
    }
}
