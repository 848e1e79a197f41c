//! 数据抽取模块

pub mod api;

pub use api::AsyncApiExtractor;

use crate::types::{Dataset, ETLResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// 数据源接口
///
/// 空数据集是合法结果，表示“没有可处理的数据”；
/// `Err` 只用于数据源整体不可用（例如客户端无法创建）。
#[async_trait]
pub trait DataSource: Send + Sync {
    type Record: Send;

    /// 数据源名称，用于日志
    fn name(&self) -> &str;

    /// 抽取一个批次
    async fn extract(&self) -> ETLResult<Dataset<Self::Record>>;
}

/// 通用 HTTP 客户端配置
pub fn create_http_client(timeout: Duration) -> ETLResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("news-etl/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(Into::into)
}

/// 拼接 `{base_url}/{id}`
pub fn join_url(base_url: &str, id: u64) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), id)
}

/// 判断响应体是否表示“资源不存在”：null、false、0、""、[]、{}
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
