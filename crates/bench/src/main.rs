//! Membench benchmark runner
//!
//! Evaluates memory providers against standardized benchmarks and reports
//! accuracy per category or per context-length bucket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm::LlmClient;

use bench::{
    load_config, resolve_results_dir, AnsweringEngine, CheckpointStore, JudgeEngine, PhaseFlags,
    PhaseOrchestrator,
};
use datasets::{Benchmark, BENCHMARK_NAMES};
use providers::{create_provider, PROVIDER_NAMES};

#[derive(Parser)]
#[command(name = "membench")]
#[command(about = "Benchmark harness for memory providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark against a provider
    Run {
        /// Benchmark family (longmemeval, needle)
        #[arg(short, long)]
        benchmark: String,

        /// Path to the benchmark dataset (JSON)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Provider backend to evaluate
        #[arg(short, long)]
        provider: String,

        /// Run identifier; reuse one to resume a partial run
        #[arg(long)]
        run_id: Option<String>,

        /// Evaluate at most this many items
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip ingestion (requires a completed ingest checkpoint)
        #[arg(long)]
        skip_ingest: bool,

        /// Skip search (requires a completed search checkpoint)
        #[arg(long)]
        skip_search: bool,

        /// Model used to generate answers
        #[arg(long)]
        answer_model: Option<String>,

        /// Model used to judge answers
        #[arg(long)]
        judge_model: Option<String>,

        /// Directory for checkpoints and reports
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// List supported benchmarks and providers
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            benchmark,
            dataset,
            provider,
            run_id,
            limit,
            skip_ingest,
            skip_search,
            answer_model,
            judge_model,
            results_dir,
        } => {
            run_benchmark(RunArgs {
                benchmark,
                dataset,
                provider,
                run_id,
                limit,
                skip_ingest,
                skip_search,
                answer_model,
                judge_model,
                results_dir,
            })
            .await
        }
        Commands::List => {
            list();
            Ok(())
        }
    }
}

struct RunArgs {
    benchmark: String,
    dataset: PathBuf,
    provider: String,
    run_id: Option<String>,
    limit: Option<usize>,
    skip_ingest: bool,
    skip_search: bool,
    answer_model: Option<String>,
    judge_model: Option<String>,
    results_dir: Option<PathBuf>,
}

async fn run_benchmark(args: RunArgs) -> Result<()> {
    let config = load_config()?;

    let benchmark = Benchmark::from_name(&args.benchmark).with_context(|| {
        format!(
            "Unknown benchmark '{}'. Supported: {}",
            args.benchmark,
            BENCHMARK_NAMES.join(", ")
        )
    })?;

    let items = datasets::load(benchmark, &args.dataset, args.limit)?;
    anyhow::ensure!(!items.is_empty(), "Dataset contains no items");

    let provider = create_provider(&args.provider, &config.provider_settings(&args.provider))?;
    provider
        .initialize()
        .await
        .context("Provider initialization failed")?;

    let answer_model = args
        .answer_model
        .or_else(|| config.models.answer_model.clone())
        .unwrap_or_else(|| "gpt-4o-mini".to_string());
    let judge_model = args
        .judge_model
        .or_else(|| config.models.judge_model.clone())
        .unwrap_or_else(|| "gpt-4o".to_string());

    let answer_llm = Arc::new(LlmClient::from_env()?.with_model(&answer_model));
    let judge_llm = Arc::new(LlmClient::from_env()?.with_model(&judge_model));

    let run_id = args.run_id.unwrap_or_else(|| {
        format!(
            "{}-{}",
            benchmark.name(),
            &uuid::Uuid::new_v4().to_string()[..8]
        )
    });
    let results_dir = resolve_results_dir(&config, args.results_dir);
    let store = CheckpointStore::new(&results_dir, &run_id)?;

    println!("Run {} against {}", run_id, provider.name());
    println!("Results directory: {}", store.run_dir().display());

    let mut orchestrator = PhaseOrchestrator::new(
        run_id,
        benchmark,
        provider,
        AnsweringEngine::new(answer_llm, config.context_budget()),
        JudgeEngine::new(judge_llm),
        store,
        &config,
    );

    let flags = PhaseFlags {
        skip_ingest: args.skip_ingest,
        skip_search: args.skip_search,
    };
    let report = orchestrator.run(&items, flags).await?;

    report.print_summary();
    report.print_failures();

    Ok(())
}

fn list() {
    println!("Benchmarks:");
    for name in BENCHMARK_NAMES {
        println!("  {}", name);
    }
    println!("\nProviders:");
    for name in PROVIDER_NAMES {
        println!("  {}", name);
    }
}
