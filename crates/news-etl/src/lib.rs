//! # News ETL - Extract, Transform, Load
//!
//! 从分页 REST 接口抓取新闻记录，校验、清洗、可选情感打分后追加写入 SQLite。
//!
//! ## 功能
//!
//! - 按 id 并发抓取，单个请求带超时，失败条目直接丢弃
//! - 严格的数据契约校验
//! - 字段改名、正文规范化、情感分析
//! - 只追加写入的 SQLite 目标表
//! - 可替换数据源 / 转换器 / 写入目标的通用管道

pub mod types;
pub mod schema;
pub mod extractor;
pub mod sentiment;
pub mod transformer;
pub mod storage;
pub mod pipeline;
pub mod logging;

pub use extractor::{AsyncApiExtractor, DataSource};
pub use pipeline::{run_with_config, Pipeline, PipelineOutcome, PipelineState};
pub use schema::{validate, SchemaViolation};
pub use storage::{DataTarget, SqliteLoader};
pub use transformer::{DataTransformer, NewsCleaner, SentimentCleaner};
pub use types::{
    CleanRecord, Dataset, ETLConfig, ETLError, ETLResult, NewsPost, RawRecord, SentimentLabel,
    Stage,
};
