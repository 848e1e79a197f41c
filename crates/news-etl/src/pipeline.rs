//! ETL 管道
//!
//! 状态机: `Idle → Extracting → Transforming → Loading → Done`，
//! 任一中间结果为空时进入 `Aborted`。管道只依赖三个接口，不了解具体实现。

use crate::extractor::{AsyncApiExtractor, DataSource};
use crate::storage::{DataTarget, SqliteLoader};
use crate::transformer::{DataTransformer, NewsCleaner, SentimentCleaner};
use crate::types::{ETLConfig, ETLError, ETLResult, Stage};
use tracing::Instrument;

/// 管道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Aborted,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Extracting => "extracting",
            PipelineState::Transforming => "transforming",
            PipelineState::Loading => "loading",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// 一次运行的结果
#[derive(Debug)]
pub enum PipelineOutcome {
    /// 全部阶段成功
    Completed {
        extracted: usize,
        transformed: usize,
        loaded: usize,
    },
    /// 中间结果为空（或数据源不可用），后续阶段未执行
    Aborted { stage: Stage, reason: ETLError },
    /// 抽取和转换成功，写入失败
    LoadFailed {
        extracted: usize,
        transformed: usize,
        error: ETLError,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    pub fn final_state(&self) -> PipelineState {
        match self {
            PipelineOutcome::Aborted { .. } => PipelineState::Aborted,
            _ => PipelineState::Done,
        }
    }

    /// 进程退出码: 0 成功，1 中止，2 写入失败
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineOutcome::Completed { .. } => 0,
            PipelineOutcome::Aborted { .. } => 1,
            PipelineOutcome::LoadFailed { .. } => 2,
        }
    }
}

/// ETL 管道
pub struct Pipeline<S, T, L> {
    source: S,
    transformer: T,
    target: L,
    span: tracing::Span,
}

impl<S, T, L> Pipeline<S, T, L>
where
    S: DataSource,
    T: DataTransformer<Input = S::Record>,
    L: DataTarget<Record = T::Output>,
{
    pub fn new(source: S, transformer: T, target: L) -> Self {
        Self {
            source,
            transformer,
            target,
            span: tracing::info_span!("pipeline"),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    pub fn target(&self) -> &L {
        &self.target
    }

    /// 运行一个批次
    pub async fn run(&self) -> PipelineOutcome {
        self.run_inner().instrument(self.span.clone()).await
    }

    async fn run_inner(&self) -> PipelineOutcome {
        let mut state = PipelineState::Idle;
        tracing::info!(
            source = self.source.name(),
            transformer = self.transformer.name(),
            target = self.target.name(),
            "Pipeline starting"
        );

        transition(&mut state, PipelineState::Extracting);
        let raw = match self.source.extract().await {
            Ok(raw) if raw.is_empty() => {
                return abort(&mut state, Stage::Extract, ETLError::EmptyBatch { stage: Stage::Extract });
            }
            Ok(raw) => raw,
            Err(e) => return abort(&mut state, Stage::Extract, e),
        };
        let extracted = raw.len();

        transition(&mut state, PipelineState::Transforming);
        let clean = self.transformer.transform(raw);
        if clean.is_empty() {
            return abort(&mut state, Stage::Transform, ETLError::EmptyBatch { stage: Stage::Transform });
        }
        let transformed = clean.len();

        transition(&mut state, PipelineState::Loading);
        let result = self.target.load(clean).await;
        transition(&mut state, PipelineState::Done);

        match result {
            Ok(loaded) => {
                tracing::info!(extracted, transformed, loaded, "Pipeline completed successfully");
                PipelineOutcome::Completed {
                    extracted,
                    transformed,
                    loaded,
                }
            }
            Err(error) => {
                tracing::error!(extracted, transformed, error = %error, "Pipeline failed at load stage");
                PipelineOutcome::LoadFailed {
                    extracted,
                    transformed,
                    error,
                }
            }
        }
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    tracing::debug!(from = %state, to = %next, "State transition");
    *state = next;
}

fn abort(state: &mut PipelineState, stage: Stage, reason: ETLError) -> PipelineOutcome {
    transition(state, PipelineState::Aborted);
    tracing::error!(stage = %stage, reason = %reason, "Pipeline aborted");
    PipelineOutcome::Aborted { stage, reason }
}

/// 按配置组装并运行默认管道：REST 接口 → 清洗（可选情感分析）→ SQLite
pub async fn run_with_config(config: &ETLConfig) -> ETLResult<PipelineOutcome> {
    config.validate()?;

    let source = AsyncApiExtractor::from_config(config);
    let target = SqliteLoader::from_config(config)?;

    let outcome = if config.enable_sentiment {
        Pipeline::new(source, SentimentCleaner::new(), target).run().await
    } else {
        Pipeline::new(source, NewsCleaner::new(), target).run().await
    };
    Ok(outcome)
}
