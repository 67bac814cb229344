use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fl_core::{AnalysisStore, Metadata, ProgressState, SearchResult, WebSearch};
use fl_inference::prelude::*;
use fl_search::{SearchConfig, StaticSearch, TavilySearch};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Credibility analysis for news articles", long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "sqlite", help = "Storage backend: memory or sqlite")]
    storage: String,
    #[arg(long, env = "FACTLINE_DB", default_value = "articles.db")]
    db_path: PathBuf,
    #[arg(long, default_value = "gemini", help = "Model to use for inference. Available models: gemini (default), scripted")]
    model: String,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    tavily_api_key: Option<String>,
    #[arg(long, env = "FACTLINE_LITE_MODEL", default_value = fl_inference::DEFAULT_LITE_MODEL)]
    lite_model: String,
    #[arg(long, env = "FACTLINE_DEEP_MODEL", default_value = fl_inference::DEFAULT_DEEP_MODEL)]
    deep_model: String,
    #[arg(long, env = "FACTLINE_MAX_ROUND_TRIPS", default_value_t = fl_inference::DEFAULT_MAX_ROUND_TRIPS)]
    max_round_trips: usize,
    /// Per-call timeout in seconds for model and search requests
    #[arg(long, default_value_t = 60)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register an article and analyze it, printing the result as JSON
    Analyze {
        #[arg(long)]
        title: String,
        /// File holding the article body; `-` reads stdin
        #[arg(long)]
        body_file: PathBuf,
        /// Extra metadata forwarded to the model, as key=value
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, Value)>,
    },
    /// Show the stored progress and result of an article
    Status { id: i64 },
}

fn parse_meta(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metadata key in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn read_body(path: &PathBuf) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin())
            .context("Failed to read article body from stdin");
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read article body from {}", path.display()))
}

fn offline_results() -> Vec<SearchResult> {
    vec![
        SearchResult::new(
            "Offline reference",
            "https://example.org/offline-reference",
            "Canned search result served without network access.",
        ),
        SearchResult::new(
            "Offline fact check",
            "https://example.org/offline-fact-check",
            "A second canned result so the model sees more than one source.",
        ),
    ]
}

fn print_progress(state: &ProgressState) {
    println!("[{:>5.1}%] {} ({})", state.percent, state.message, state.status);
}

async fn build_pipeline(
    cli: &Cli,
    store: Arc<dyn AnalysisStore>,
) -> anyhow::Result<AnalysisPipeline> {
    let kind: ModelKind = cli.model.parse()?;
    let timeout = Duration::from_secs(cli.timeout);
    let inference_config = InferenceConfig {
        api_key: cli.gemini_api_key.clone(),
        lite_model: cli.lite_model.clone(),
        deep_model: cli.deep_model.clone(),
        request_timeout: timeout,
        max_round_trips: cli.max_round_trips,
        ..InferenceConfig::default()
    };
    let inference = create_model(kind, &inference_config)?;
    info!("🧠 Inference model initialized successfully (using {})", inference.name());

    let search: Arc<dyn WebSearch> = match kind {
        ModelKind::Scripted => Arc::new(StaticSearch::new(offline_results())),
        ModelKind::Gemini => Arc::new(TavilySearch::new(SearchConfig {
            api_key: cli.tavily_api_key.clone(),
            request_timeout: timeout,
            ..SearchConfig::default()
        })?),
    };
    info!("🔎 Web search initialized successfully (using {})", search.name());

    let analyzer = CredibilityAnalyzer::new(
        inference,
        search,
        AnalyzerConfig::from_inference_config(&inference_config),
    );
    Ok(AnalysisPipeline::new(analyzer, store))
}

async fn analyze(
    cli: &Cli,
    store: Arc<dyn AnalysisStore>,
    title: String,
    body: String,
    metadata: Metadata,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(cli, store.clone()).await?;
    let id = store.register_article(&title, &body).await?;
    info!("📰 Registered article {}: {}", id, title);

    let cancel = CancellationToken::new();
    let mut task = {
        let pipeline = pipeline.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run(id, &title, &body, metadata, &cancel).await })
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut last_seen: Option<(String, String)> = None;
    let outcome = loop {
        tokio::select! {
            joined = &mut task => break joined.context("Analysis task panicked")?,
            _ = ticker.tick() => {
                if let Some(state) = store.progress(id).await? {
                    let key = (state.message.clone(), state.status.to_string());
                    if last_seen.as_ref() != Some(&key) {
                        print_progress(&state);
                        last_seen = Some(key);
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                warn!("Interrupted, cancelling analysis of article {}", id);
                cancel.cancel();
            }
        }
    };

    if let Some(state) = store.progress(id).await? {
        print_progress(&state);
    }
    let result = outcome.with_context(|| format!("Analysis of article {} failed", id))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn status(store: Arc<dyn AnalysisStore>, id: i64) -> anyhow::Result<()> {
    let Some(state) = store.progress(id).await? else {
        bail!("No article with id {}", id);
    };
    print_progress(&state);
    match store.result(id).await? {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("No analysis result stored yet"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let location = cli.db_path.to_string_lossy().into_owned();
    let store = fl_storage::create_storage(&cli.storage, Some(&location)).await?;
    info!("💾 Storage initialized successfully (using {})", cli.storage);

    match &cli.command {
        Commands::Analyze {
            title,
            body_file,
            meta,
        } => {
            let body = read_body(body_file)?;
            let metadata: Metadata = meta.iter().cloned().collect();
            analyze(&cli, store, title.clone(), body, metadata).await
        }
        Commands::Status { id } => status(store, *id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("source=Daily Example").unwrap(),
            ("source".to_string(), Value::String("Daily Example".to_string()))
        );
        assert_eq!(
            parse_meta("pages=3").unwrap(),
            ("pages".to_string(), serde_json::json!(3))
        );
        assert!(parse_meta("no-separator").is_err());
        assert!(parse_meta("=value").is_err());
    }

    #[test]
    fn test_analyze_arguments() {
        let cli = Cli::try_parse_from([
            "factline",
            "--model",
            "scripted",
            "--storage",
            "memory",
            "analyze",
            "--title",
            "Mayor resigns",
            "--body-file",
            "article.txt",
            "--meta",
            "source=Daily Example",
        ])
        .unwrap();
        assert_eq!(cli.model, "scripted");
        match cli.command {
            Commands::Analyze { title, meta, .. } => {
                assert_eq!(title, "Mayor resigns");
                assert_eq!(meta.len(), 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scripted_analysis_end_to_end() {
        let cli = Cli::try_parse_from([
            "factline", "--model", "scripted", "--storage", "memory", "status", "1",
        ])
        .unwrap();
        let store = fl_storage::create_storage("memory", None).await.unwrap();
        let pipeline = build_pipeline(&cli, store.clone()).await.unwrap();

        let id = store.register_article("Mayor resigns", "The mayor resigned.").await.unwrap();
        let result = pipeline
            .run_analysis(id, "Mayor resigns", "The mayor resigned.")
            .await
            .unwrap();
        assert_eq!(result.credibility_score, 50);
        assert_eq!(result.tags, vec!["offline".to_string(), "demo".to_string()]);

        let progress = store.progress(id).await.unwrap().unwrap();
        assert_eq!(progress.percent, 100.0);
        assert_eq!(progress.message, "Analysis complete");
    }
}
