//! 清洗与增强
//!
//! 步骤依次为：字段改名 → 丢弃缺少 title/content 的行 → 正文换行折叠 →
//! （可选）情感打分 → 统一打上 `processed_at`。
//! 任何一步失败，整个批次返回空数据集，不向下游暴露部分结果。

use crate::sentiment::SentimentAnalyzer;
use crate::types::{CleanRecord, Dataset, ETLError, ETLResult, NewsPost};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// 中间表示：一行数据，列名 → 值
pub type Row = Map<String, Value>;

/// 上游字段名 → 入库字段名
pub const COLUMN_MAPPING: [(&str, &str); 4] = [
    ("userId", "user_id"),
    ("id", "external_id"),
    ("title", "title"),
    ("body", "content"),
];

/// 丢弃行时检查的列
pub const REQUIRED_COLUMNS: [&str; 2] = ["title", "content"];

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("line break pattern is valid"));

/// 转换接口
pub trait DataTransformer: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// 策略名称，用于日志
    fn name(&self) -> &str;

    /// 失败时返回空数据集
    fn transform(&self, input: Dataset<Self::Input>) -> Dataset<Self::Output>;
}

/// 按 [`COLUMN_MAPPING`] 改名，重复调用结果不变
pub fn rename_columns(mut row: Row) -> Row {
    for (from, to) in COLUMN_MAPPING {
        if from == to {
            continue;
        }
        if let Some(value) = row.remove(from) {
            row.insert(to.to_string(), value);
        }
    }
    row
}

/// 行中是否包含所有必需列（null 视为缺失）
pub fn has_required_columns(row: &Row) -> bool {
    REQUIRED_COLUMNS
        .iter()
        .all(|column| !matches!(row.get(*column), None | Some(Value::Null)))
}

/// 连续的换行折叠为一个空格
pub fn normalize_content(content: &str) -> String {
    LINE_BREAKS.replace_all(content, " ").into_owned()
}

#[derive(Debug, Deserialize)]
struct RenamedRow {
    user_id: i64,
    external_id: i64,
    title: String,
    content: String,
}

/// 不含情感打分的清洗器
pub struct NewsCleaner {
    span: tracing::Span,
}

impl NewsCleaner {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("transformer", strategy = "plain"),
        }
    }

    /// 改名、过滤、规范化，不打时间戳
    fn clean(&self, input: Dataset<NewsPost>) -> ETLResult<Vec<RenamedRow>> {
        let initial = input.len();

        let mut rows = Vec::with_capacity(initial);
        for post in input {
            let row = match serde_json::to_value(&post)? {
                Value::Object(row) => row,
                other => {
                    return Err(ETLError::Transform(format!(
                        "expected an object row, got {other}"
                    )))
                }
            };
            rows.push(rename_columns(row));
        }

        rows.retain(has_required_columns);
        if rows.len() < initial {
            tracing::info!(dropped = initial - rows.len(), "Dropped rows with missing fields");
        }

        rows.into_iter()
            .map(|row| -> ETLResult<RenamedRow> {
                let mut row: RenamedRow = serde_json::from_value(Value::Object(row))?;
                row.content = normalize_content(&row.content);
                Ok(row)
            })
            .collect()
    }

    /// 清洗并逐行增强；任一行增强失败即整体失败
    fn build<F>(
        &self,
        input: Dataset<NewsPost>,
        processed_at: DateTime<Utc>,
        enrich: &F,
    ) -> ETLResult<Dataset<CleanRecord>>
    where
        F: Fn(&mut CleanRecord) -> ETLResult<()>,
    {
        self.clean(input)?
            .into_iter()
            .map(|row| -> ETLResult<CleanRecord> {
                let mut record = CleanRecord {
                    user_id: row.user_id,
                    external_id: row.external_id,
                    title: row.title,
                    content: row.content,
                    processed_at,
                    sentiment_score: None,
                    sentiment_label: None,
                };
                enrich(&mut record)?;
                Ok(record)
            })
            .collect()
    }

    fn run<F>(&self, input: Dataset<NewsPost>, enrich: F) -> Dataset<CleanRecord>
    where
        F: Fn(&mut CleanRecord) -> ETLResult<()>,
    {
        let _enter = self.span.enter();

        if input.is_empty() {
            tracing::warn!("Received an empty dataset, nothing to transform");
            return Dataset::empty();
        }

        tracing::info!(rows = input.len(), "Starting transformation");
        let processed_at: DateTime<Utc> = Utc::now();

        match self.build(input, processed_at, &enrich) {
            Ok(dataset) => {
                tracing::info!(rows = dataset.len(), "Transformation finished");
                dataset
            }
            Err(e) => {
                tracing::error!(error = %e, "Transformation failed, discarding batch");
                Dataset::empty()
            }
        }
    }
}

impl Default for NewsCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTransformer for NewsCleaner {
    type Input = NewsPost;
    type Output = CleanRecord;

    fn name(&self) -> &str {
        "plain"
    }

    fn transform(&self, input: Dataset<NewsPost>) -> Dataset<CleanRecord> {
        self.run(input, |_| Ok(()))
    }
}

/// 在清洗基础上附加 `sentiment_score` / `sentiment_label`
pub struct SentimentCleaner {
    cleaner: NewsCleaner,
    analyzer: SentimentAnalyzer,
}

impl SentimentCleaner {
    pub fn new() -> Self {
        Self::with_analyzer(SentimentAnalyzer::new())
    }

    pub fn with_analyzer(analyzer: SentimentAnalyzer) -> Self {
        Self {
            cleaner: NewsCleaner {
                span: tracing::info_span!("transformer", strategy = "sentiment"),
            },
            analyzer,
        }
    }
}

impl Default for SentimentCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTransformer for SentimentCleaner {
    type Input = NewsPost;
    type Output = CleanRecord;

    fn name(&self) -> &str {
        "sentiment"
    }

    fn transform(&self, input: Dataset<NewsPost>) -> Dataset<CleanRecord> {
        self.cleaner.run(input, |record| {
            let analysis = self.analyzer.analyze_article(&record.title, &record.content);
            if !analysis.score.is_finite() {
                return Err(ETLError::Transform(format!(
                    "non-finite sentiment score for record {}",
                    record.external_id
                )));
            }
            record.sentiment_score = Some(analysis.score);
            record.sentiment_label = Some(analysis.label);
            Ok(())
        })
    }
}
