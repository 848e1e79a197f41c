//! REST 接口并发抽取器
//!
//! 对 `1..=limit` 中的每个 id 发起一次 GET `{base_url}/{id}`，所有请求同时发出，
//! 全部结束后再汇总；失败、不存在、校验不通过的条目直接丢弃。

use super::{create_http_client, is_falsy, join_url, DataSource};
use crate::schema::{self, SchemaViolation};
use crate::types::{Dataset, ETLConfig, ETLError, ETLResult, NewsPost, RawRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::Instrument;

/// 单次抓取的结果分类
#[derive(Debug)]
pub enum FetchOutcome {
    /// 通过校验的记录
    Record(NewsPost),
    /// 2xx 但响应体为空
    Absent,
    /// 响应体不满足数据契约
    Invalid(SchemaViolation),
    /// 网络错误、超时或非 2xx
    Failed(ETLError),
}

impl FetchOutcome {
    pub fn into_record(self) -> Option<NewsPost> {
        match self {
            FetchOutcome::Record(post) => Some(post),
            _ => None,
        }
    }
}

/// 各类结果的计数，仅用于日志
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub fetched: usize,
    pub absent: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl FetchSummary {
    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Record(_) => self.fetched += 1,
            FetchOutcome::Absent => self.absent += 1,
            FetchOutcome::Invalid(_) => self.invalid += 1,
            FetchOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.fetched + self.absent + self.invalid + self.failed
    }
}

pub struct AsyncApiExtractor {
    base_url: String,
    limit: usize,
    timeout: Duration,
    span: tracing::Span,
}

impl AsyncApiExtractor {
    pub fn new(base_url: impl Into<String>, limit: usize, timeout: Duration) -> Self {
        let base_url = base_url.into();
        let span = tracing::info_span!("extractor", source = %base_url);

        Self {
            base_url,
            limit,
            timeout,
            span,
        }
    }

    pub fn from_config(config: &ETLConfig) -> Self {
        Self::new(
            config.source_url.clone(),
            config.fetch_limit,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 抓取一条记录，所有失败都在这里消化为 `None`
    pub async fn fetch_one(&self, client: &reqwest::Client, id: u64) -> Option<NewsPost> {
        self.fetch_logged(client, id).await.into_record()
    }

    async fn fetch_logged(&self, client: &reqwest::Client, id: u64) -> FetchOutcome {
        let outcome = self.fetch_outcome(client, id).await;
        log_outcome(id, &outcome);
        outcome
    }

    /// 抓取一条记录并分类，带超时
    pub async fn fetch_outcome(&self, client: &reqwest::Client, id: u64) -> FetchOutcome {
        let url = join_url(&self.base_url, id);

        let raw = match tokio::time::timeout(self.timeout, request_raw(client, &url)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => return FetchOutcome::Absent,
            Ok(Err(e)) => return FetchOutcome::Failed(e),
            Err(_) => {
                return FetchOutcome::Failed(ETLError::Timeout {
                    id,
                    timeout: self.timeout,
                })
            }
        };

        match schema::validate(&raw) {
            Ok(post) => FetchOutcome::Record(post),
            Err(violation) => FetchOutcome::Invalid(violation),
        }
    }

    async fn extract_inner(&self) -> ETLResult<Dataset<NewsPost>> {
        tracing::info!(limit = self.limit, "Starting concurrent download");

        // 客户端（连接池）只在本次抽取内共享，函数返回即释放
        let client = create_http_client(self.timeout)?;

        let fetches = (1..=self.limit as u64).map(|id| self.fetch_logged(&client, id));
        let outcomes = futures::future::join_all(fetches).await;
        drop(client);

        let mut summary = FetchSummary::default();
        let dataset: Dataset<NewsPost> = outcomes
            .into_iter()
            .inspect(|outcome| summary.record(outcome))
            .filter_map(FetchOutcome::into_record)
            .collect();

        tracing::info!(
            attempted = summary.attempted(),
            rows = dataset.len(),
            absent = summary.absent,
            invalid = summary.invalid,
            failed = summary.failed,
            "Download finished"
        );
        Ok(dataset)
    }
}

#[async_trait]
impl DataSource for AsyncApiExtractor {
    type Record = NewsPost;

    fn name(&self) -> &str {
        &self.base_url
    }

    async fn extract(&self) -> ETLResult<Dataset<NewsPost>> {
        self.extract_inner().instrument(self.span.clone()).await
    }
}

/// 发起 GET 请求；2xx 且响应体为空时返回 `None`
async fn request_raw(client: &reqwest::Client, url: &str) -> ETLResult<Option<RawRecord>> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ETLError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: RawRecord = serde_json::from_slice(&bytes)?;
    if is_falsy(&value) {
        return Ok(None);
    }

    Ok(Some(value))
}

fn log_outcome(id: u64, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Record(_) => tracing::debug!(id, "Record fetched"),
        FetchOutcome::Absent => tracing::info!(id, "Resource absent, skipping"),
        FetchOutcome::Invalid(violation) => {
            tracing::warn!(id, rule = %violation, "Record failed schema validation")
        }
        FetchOutcome::Failed(e) => tracing::error!(id, error = %e, "Error downloading record"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(id: u64) -> serde_json::Value {
        json!({
            "userId": 1,
            "id": id,
            "title": format!("Post number {id}"),
            "body": "line one\nline two",
        })
    }

    async fn mount(server: &MockServer, id: u64, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/posts/{id}")))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn extractor(server: &MockServer, limit: usize) -> AsyncApiExtractor {
        AsyncApiExtractor::new(format!("{}/posts", server.uri()), limit, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_fetch_outcome_classification() {
        let server = MockServer::start().await;
        mount(&server, 1, ResponseTemplate::new(200).set_body_json(post(1))).await;
        mount(&server, 2, ResponseTemplate::new(200).set_body_json(json!({}))).await;
        mount(
            &server,
            3,
            ResponseTemplate::new(200).set_body_json(json!({"userId": 1, "id": 3, "title": "Hi", "body": ""})),
        )
        .await;
        mount(&server, 4, ResponseTemplate::new(500)).await;
        mount(&server, 5, ResponseTemplate::new(200)).await;
        mount(&server, 6, ResponseTemplate::new(200).set_body_string("not json")).await;

        let extractor = extractor(&server, 6);
        let client = create_http_client(Duration::from_secs(2)).unwrap();

        assert!(matches!(extractor.fetch_outcome(&client, 1).await, FetchOutcome::Record(_)));
        assert!(matches!(extractor.fetch_outcome(&client, 2).await, FetchOutcome::Absent));
        assert!(matches!(
            extractor.fetch_outcome(&client, 3).await,
            FetchOutcome::Invalid(SchemaViolation::TitleTooShort { len: 2 })
        ));
        assert!(matches!(
            extractor.fetch_outcome(&client, 4).await,
            FetchOutcome::Failed(ETLError::HttpStatus { status: 500, .. })
        ));
        assert!(matches!(extractor.fetch_outcome(&client, 5).await, FetchOutcome::Absent));
        assert!(matches!(
            extractor.fetch_outcome(&client, 6).await,
            FetchOutcome::Failed(ETLError::JsonParsing(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_one_times_out() {
        let server = MockServer::start().await;
        mount(
            &server,
            1,
            ResponseTemplate::new(200)
                .set_body_json(post(1))
                .set_delay(Duration::from_millis(1500)),
        )
        .await;

        let extractor = AsyncApiExtractor::new(
            format!("{}/posts", server.uri()),
            1,
            Duration::from_millis(200),
        );
        let client = create_http_client(Duration::from_secs(10)).unwrap();

        let outcome = extractor.fetch_outcome(&client, 1).await;
        match outcome {
            FetchOutcome::Failed(err @ ETLError::Timeout { id: 1, .. }) => {
                assert!(err.to_string().contains("200ms"), "{err}");
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(extractor.fetch_one(&client, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_extract_launches_exactly_limit_requests() {
        let server = MockServer::start().await;
        for id in 1..=5 {
            mount(&server, id, ResponseTemplate::new(200).set_body_json(post(id))).await;
        }

        let dataset = extractor(&server, 5).extract().await.unwrap();

        assert_eq!(dataset.len(), 5);
        let ids: Vec<i64> = dataset.iter().map(NewsPost::external_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 5);
    }

    #[tokio::test]
    async fn test_extract_drops_failures() {
        let server = MockServer::start().await;
        mount(&server, 1, ResponseTemplate::new(200).set_body_json(post(1))).await;
        mount(&server, 2, ResponseTemplate::new(404).set_body_json(json!({}))).await;
        mount(&server, 3, ResponseTemplate::new(200).set_body_json(json!(null))).await;
        mount(&server, 4, ResponseTemplate::new(200).set_body_json(post(4))).await;

        let dataset = extractor(&server, 4).extract().await.unwrap();

        let ids: Vec<i64> = dataset.iter().map(NewsPost::external_id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_extract_all_invalid_yields_empty_dataset() {
        let server = MockServer::start().await;
        mount(
            &server,
            1,
            ResponseTemplate::new(200).set_body_json(json!({"userId": 1, "id": 1, "title": "Hi", "body": "x"})),
        )
        .await;

        let dataset = extractor(&server, 1).extract().await.unwrap();
        assert!(dataset.is_empty());
    }

    #[tokio::test]
    async fn test_requests_run_concurrently() {
        let server = MockServer::start().await;
        for id in 1..=4 {
            mount(
                &server,
                id,
                ResponseTemplate::new(200)
                    .set_body_json(post(id))
                    .set_delay(Duration::from_millis(400)),
            )
            .await;
        }

        let started = std::time::Instant::now();
        let dataset = extractor(&server, 4).extract().await.unwrap();

        assert_eq!(dataset.len(), 4);
        // 串行至少需要 1.6s
        assert!(started.elapsed() < Duration::from_millis(1400));
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_empty_dataset() {
        // 绑定后立即释放，拿到一个当前无人监听的端口
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let extractor = AsyncApiExtractor::new(
            format!("http://127.0.0.1:{port}/posts"),
            3,
            Duration::from_millis(500),
        );
        let dataset = extractor.extract().await.unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = ETLConfig {
            source_url: "http://example.com/posts".to_string(),
            fetch_limit: 7,
            request_timeout_secs: 3,
            ..ETLConfig::default()
        };
        let extractor = AsyncApiExtractor::from_config(&config);
        assert_eq!(extractor.base_url(), "http://example.com/posts");
        assert_eq!(extractor.limit(), 7);
        assert_eq!(extractor.name(), "http://example.com/posts");
    }
}
