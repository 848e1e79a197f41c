use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use news_etl::{logging, run_with_config, ETLConfig, PipelineOutcome};

/// 启动失败（日志、配置）时的退出码
const EXIT_STARTUP_FAILURE: u8 = 3;

/// News ETL - fetch, clean and store news records
#[derive(Parser, Debug)]
#[command(name = "news-etl", version, about, long_about = None)]
struct Cli {
    /// Base URL of the source; records are fetched from `{url}/{id}`
    #[arg(long, env = "ETL_SOURCE_URL", default_value_t = ETLConfig::default().source_url)]
    source_url: String,

    /// Number of records to fetch (also the number of concurrent requests)
    #[arg(long, env = "ETL_FETCH_LIMIT", default_value_t = ETLConfig::default().fetch_limit)]
    fetch_limit: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "ETL_REQUEST_TIMEOUT_SECS", default_value_t = ETLConfig::default().request_timeout_secs)]
    request_timeout_secs: u64,

    /// SQLite database file
    #[arg(long, env = "ETL_DATABASE_PATH", default_value_t = ETLConfig::default().database_path)]
    database_path: String,

    /// Destination table
    #[arg(long, env = "ETL_TABLE_NAME", default_value_t = ETLConfig::default().table_name)]
    table_name: String,

    /// Attach sentiment score and label to every row
    #[arg(
        long,
        env = "ETL_ENABLE_SENTIMENT",
        default_value_t = ETLConfig::default().enable_sentiment,
        action = clap::ArgAction::Set
    )]
    enable_sentiment: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ETL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// File that log lines are appended to
    #[arg(long, env = "ETL_LOG_FILE", default_value = "logs/pipeline.log")]
    log_file: PathBuf,

    /// Log to the terminal only
    #[arg(long)]
    no_log_file: bool,
}

impl Cli {
    fn config(&self) -> ETLConfig {
        ETLConfig {
            source_url: self.source_url.clone(),
            fetch_limit: self.fetch_limit,
            request_timeout_secs: self.request_timeout_secs,
            database_path: self.database_path.clone(),
            table_name: self.table_name.clone(),
            enable_sentiment: self.enable_sentiment,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("news-etl: {e:#}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<PipelineOutcome> {
    let log_file = (!cli.no_log_file).then_some(cli.log_file.as_path());
    logging::init(&cli.log_level, log_file).context("failed to initialize logging")?;

    let config = cli.config();
    tracing::debug!(?config, "Loaded configuration");

    let outcome = run_with_config(&config)
        .await
        .context("failed to start pipeline")?;
    Ok(outcome)
}
