//! 数据存储模块
//!
//! 只追加写入：表不存在时创建，已有数据从不覆盖或删除。

use crate::types::{
    is_sql_identifier, CleanRecord, Dataset, ETLConfig, ETLError, ETLResult, SentimentLabel, Stage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// 写入目标接口
#[async_trait]
pub trait DataTarget: Send + Sync {
    type Record: Send;

    /// 目标名称，用于日志
    fn name(&self) -> &str;

    /// 整批写入，要么全部成功要么全部不写；返回写入行数
    async fn load(&self, data: Dataset<Self::Record>) -> ETLResult<usize>;
}

/// SQLite 写入器
pub struct SqliteLoader {
    database_path: PathBuf,
    table_name: String,
    span: tracing::Span,
}

impl SqliteLoader {
    pub fn new(database_path: impl Into<PathBuf>, table_name: impl Into<String>) -> ETLResult<Self> {
        let database_path = database_path.into();
        let table_name = table_name.into();

        if !is_sql_identifier(&table_name) {
            return Err(ETLError::Config(format!("非法表名: {:?}", table_name)));
        }

        let span = tracing::info_span!(
            "sink",
            database = %database_path.display(),
            table = %table_name
        );

        Ok(Self {
            database_path,
            table_name,
            span,
        })
    }

    pub fn from_config(config: &ETLConfig) -> ETLResult<Self> {
        Self::new(&config.database_path, &config.table_name)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// 打开连接池；数据库文件及其目录不存在时创建
    async fn connect(&self) -> ETLResult<SqlitePool> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true);

        Ok(SqlitePool::connect_with(options).await?)
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                user_id INTEGER NOT NULL,
                external_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                sentiment_score REAL,
                sentiment_label TEXT
            )
            "#,
            self.table_name
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO "{}"
            (user_id, external_id, title, content, processed_at, sentiment_score, sentiment_label)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            self.table_name
        )
    }

    async fn write_batch(&self, records: &[CleanRecord]) -> ETLResult<usize> {
        let pool = self.connect().await?;

        let result = async {
            let mut tx = pool.begin().await?;

            sqlx::query(&self.create_table_sql()).execute(&mut *tx).await?;

            let insert = self.insert_sql();
            for record in records {
                sqlx::query(&insert)
                    .bind(record.user_id)
                    .bind(record.external_id)
                    .bind(&record.title)
                    .bind(&record.content)
                    .bind(record.processed_at.to_rfc3339())
                    .bind(record.sentiment_score)
                    .bind(record.sentiment_label.map(|label| label.as_str()))
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok::<_, ETLError>(records.len())
        }
        .await;

        pool.close().await;
        result
    }

    /// 表中已有行数；表不存在时为 0
    pub async fn row_count(&self) -> ETLResult<usize> {
        let pool = self.connect().await?;
        let result = async {
            let exists: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(&self.table_name)
            .fetch_one(&pool)
            .await?;
            if exists == 0 {
                return Ok::<_, ETLError>(0);
            }

            let total: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.table_name))
                .fetch_one(&pool)
                .await?;
            Ok::<_, ETLError>(total as usize)
        }
        .await;

        pool.close().await;
        result
    }

    /// 按写入顺序读出全部记录
    pub async fn query_all(&self) -> ETLResult<Vec<CleanRecord>> {
        let pool = self.connect().await?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT user_id, external_id, title, content, processed_at, sentiment_score, sentiment_label
            FROM "{}"
            ORDER BY rowid
            "#,
            self.table_name
        ))
        .fetch_all(&pool)
        .await;
        pool.close().await;

        rows?
            .iter()
            .map(|row| -> ETLResult<CleanRecord> {
                let processed_at: String = row.try_get("processed_at")?;
                let label: Option<String> = row.try_get("sentiment_label")?;

                Ok(CleanRecord {
                    user_id: row.try_get("user_id")?,
                    external_id: row.try_get("external_id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    processed_at: DateTime::parse_from_rfc3339(&processed_at)
                        .map_err(|e| ETLError::Sink(format!("processed_at: {e}")))?
                        .with_timezone(&Utc),
                    sentiment_score: row.try_get("sentiment_score")?,
                    sentiment_label: label.as_deref().and_then(parse_label),
                })
            })
            .collect()
    }
}

#[async_trait]
impl DataTarget for SqliteLoader {
    type Record = CleanRecord;

    fn name(&self) -> &str {
        &self.table_name
    }

    async fn load(&self, data: Dataset<CleanRecord>) -> ETLResult<usize> {
        async {
            if data.is_empty() {
                tracing::warn!("Received an empty dataset, nothing to save");
                return Err(ETLError::EmptyBatch { stage: Stage::Load });
            }

            tracing::info!(rows = data.len(), "Saving rows");
            match self.write_batch(data.rows()).await {
                Ok(saved) => {
                    tracing::info!(rows = saved, "Load succeeded");
                    Ok(saved)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Database write failed");
                    Err(e)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}

fn parse_label(label: &str) -> Option<SentimentLabel> {
    match label {
        "POSITIVE" => Some(SentimentLabel::Positive),
        "NEGATIVE" => Some(SentimentLabel::Negative),
        "NEUTRAL" => Some(SentimentLabel::Neutral),
        _ => None,
    }
}
