//! 核心类型定义

use crate::schema::SchemaViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type ETLResult<T> = Result<T, ETLError>;

/// 上游接口返回的原始记录（未经校验）
pub type RawRecord = serde_json::Value;

#[derive(Debug, Error)]
pub enum ETLError {
    #[error("HTTP 请求失败: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP 状态异常: {status} ({url})")]
    HttpStatus { status: u16, url: String },

    #[error("请求超时: id={id}, 超过 {timeout:?}")]
    Timeout { id: u64, timeout: Duration },

    #[error("数据校验失败: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("JSON 解析失败: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("{stage} 阶段结果为空")]
    EmptyBatch { stage: Stage },

    #[error("数据库错误: {0}")]
    Sink(String),

    #[error("转换失败: {0}")]
    Transform(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for ETLError {
    fn from(e: sqlx::Error) -> Self {
        ETLError::Sink(e.to_string())
    }
}

/// 管道阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Transform => write!(f, "transform"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// 通过校验的新闻记录
///
/// 只能经由 [`NewsPost::new`] 或 [`crate::schema::validate`] 构造，
/// 字段创建后不可变。序列化时使用上游接口的字段名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsPost {
    #[serde(rename = "userId")]
    pub(crate) owner_id: i64,
    #[serde(rename = "id")]
    pub(crate) external_id: i64,
    pub(crate) title: String,
    pub(crate) body: String,
}

impl NewsPost {
    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    pub fn external_id(&self) -> i64 {
        self.external_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// 情感分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// 阈值 ±0.1，边界值本身归为 NEUTRAL
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s > 0.1 => SentimentLabel::Positive,
            s if s < -0.1 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 清洗后、可直接入库的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub user_id: i64,
    pub external_id: i64,
    pub title: String,
    /// 换行已折叠为单个空格
    pub content: String,
    /// 转换时刻，同一批次内所有行相同
    pub processed_at: DateTime<Utc>,
    /// 情感分数 [-1.0, 1.0]
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
}

/// 阶段之间传递的数据集
///
/// 要么为空（下游视为“无事可做”），要么是一组同构的行。
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    rows: Vec<T>,
}

impl<T> Dataset<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for Dataset<T> {
    fn from(rows: Vec<T>) -> Self {
        Self::new(rows)
    }
}

impl<T> FromIterator<T> for Dataset<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Dataset<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Dataset<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// ETL 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ETLConfig {
    /// 数据源基础 URL，实际请求为 `{source_url}/{id}`
    pub source_url: String,
    /// 抓取数量，同时也是并发度
    pub fetch_limit: usize,
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
    /// SQLite 数据库文件路径
    pub database_path: String,
    /// 目标表名
    pub table_name: String,
    /// 是否计算情感分数
    pub enable_sentiment: bool,
}

impl ETLConfig {
    pub fn validate(&self) -> ETLResult<()> {
        if self.source_url.trim().is_empty() {
            return Err(ETLError::Config("source_url 不能为空".to_string()));
        }
        if self.fetch_limit == 0 {
            return Err(ETLError::Config("fetch_limit 必须 >= 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ETLError::Config("request_timeout_secs 必须 >= 1".to_string()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ETLError::Config("database_path 不能为空".to_string()));
        }
        if !is_sql_identifier(&self.table_name) {
            return Err(ETLError::Config(format!(
                "非法表名: {:?}",
                self.table_name
            )));
        }
        Ok(())
    }
}

impl Default for ETLConfig {
    fn default() -> Self {
        Self {
            source_url: "https://jsonplaceholder.typicode.com/posts".to_string(),
            fetch_limit: 100,
            request_timeout_secs: 10,
            database_path: "data/auroria_noticias.db".to_string(),
            table_name: "news".to_string(),
            enable_sentiment: true,
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.5), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.1000001), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.1000001), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_score(-1.0), SentimentLabel::Negative);
    }

    #[test]
    fn test_label_serializes_uppercase() {
        let json = serde_json::to_string(&SentimentLabel::Positive).unwrap();
        assert_eq!(json, "\"POSITIVE\"");
        assert_eq!(SentimentLabel::Negative.to_string(), "NEGATIVE");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ETLConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let mut config = ETLConfig::default();
        config.fetch_limit = 0;
        assert!(matches!(config.validate(), Err(ETLError::Config(_))));

        let mut config = ETLConfig::default();
        config.table_name = "news; DROP TABLE news".to_string();
        assert!(matches!(config.validate(), Err(ETLError::Config(_))));

        let mut config = ETLConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("news"));
        assert!(is_sql_identifier("_news_2024"));
        assert!(!is_sql_identifier(""));
        assert!(!is_sql_identifier("2news"));
        assert!(!is_sql_identifier("news-items"));
    }

    #[test]
    fn test_dataset_basics() {
        let ds: Dataset<i32> = vec![1, 2, 3].into();
        assert_eq!(ds.len(), 3);
        assert!(!ds.is_empty());
        assert_eq!(ds.rows(), &[1, 2, 3]);

        let empty: Dataset<i32> = Dataset::default();
        assert!(empty.is_empty());

        let doubled: Dataset<i32> = ds.into_iter().map(|x| x * 2).collect();
        assert_eq!(doubled.into_rows(), vec![2, 4, 6]);
    }
}
