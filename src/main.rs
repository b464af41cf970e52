//! Sheet Agent - command line entry point.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use sheet_agent::agent::{Agent, AgentTask};
use sheet_agent::benchmark::{BenchmarkOptions, BenchmarkRunner, CommandComparator, Evaluator};
use sheet_agent::llm::{analyze_chart, CompletionOptions, LlmClient, Message, OpenRouterClient, RetryPolicy};
use sheet_agent::tools::ToolRegistry;
use sheet_agent::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sheet-agent", version, about = "LLM agent for Excel workbooks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent on a natural-language request
    Run {
        request: String,
        /// Workbook the request refers to
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        max_steps: Option<usize>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Stream a plain chat completion
    Chat {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Describe a chart image with a vision model
    AnalyzeImage {
        path: PathBuf,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Run the agent over a SpreadsheetBench dataset
    Bench {
        #[arg(long, default_value = "sample_data_200")]
        dataset: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_steps: Option<usize>,
        /// Skip tasks already logged as successful
        #[arg(long)]
        resume: bool,
        /// Comma-separated task ids
        #[arg(long, value_delimiter = ',')]
        task_ids: Option<Vec<String>>,
        #[arg(long, default_value = "agent")]
        setting: String,
    },
    /// Score benchmark outputs against the answers
    Eval {
        #[arg(long, default_value = "sample_data_200")]
        dataset: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value = "agent")]
        setting: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    match cli.command {
        Command::Run {
            request,
            file,
            max_steps,
            model,
        } => {
            let llm = Arc::new(OpenRouterClient::from_config(&config)?);
            let tools = Arc::new(ToolRegistry::spreadsheet(&config));
            let agent = Agent::new(llm, tools)
                .with_max_steps(max_steps.unwrap_or(config.max_steps))
                .with_model(model);
            let task = AgentTask::Interactive {
                request,
                file_path: file.map(|f| f.display().to_string()),
            };

            let result = agent.run(&task).await?;
            if result.exhausted {
                tracing::warn!("Stopped after {} steps", result.steps);
            }
            println!("{}", result.response);
        }
        Command::Chat { prompt, model } => {
            let llm = OpenRouterClient::from_config(&config)?;
            let mut stream = llm
                .stream(&[Message::user(prompt)], &CompletionOptions::with_model(model))
                .await?;
            let mut stdout = std::io::stdout();
            while let Some(fragment) = stream.next().await {
                write!(stdout, "{}", fragment?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
        Command::AnalyzeImage {
            path,
            context,
            model,
        } => {
            let llm = OpenRouterClient::from_config(&config)?;
            let reply = analyze_chart(&llm, &path, context.as_deref(), model).await?;
            println!("{}", reply);
        }
        Command::Bench {
            dataset,
            model,
            max_steps,
            resume,
            task_ids,
            setting,
        } => {
            let llm = Arc::new(OpenRouterClient::from_config(&config)?);
            let tools = Arc::new(ToolRegistry::spreadsheet(&config));
            let runner = BenchmarkRunner::new(llm, tools, &config);
            let options = BenchmarkOptions {
                dataset,
                model,
                max_steps: max_steps.unwrap_or(config.bench_max_steps),
                resume,
                task_ids,
                setting,
                retry: RetryPolicy::default(),
            };

            let summary = runner.run(&options).await?;
            println!(
                "Done: {} success, {} error, {} skipped",
                summary.success, summary.error, summary.skipped
            );
            println!("Outputs: {}", summary.output_dir.display());
            println!("Log: {}", summary.log_path.display());
        }
        Command::Eval {
            dataset,
            model,
            setting,
        } => {
            let comparator = CommandComparator::parse(config.require_comparator()?)?;
            let evaluator = Evaluator::new(
                Arc::new(comparator),
                config.bench_data_root.clone(),
                config.bench_log_dir.clone(),
            );
            let report = evaluator.evaluate(&dataset, &setting, &model).await?;
            println!("{}", report.render_summary());
        }
    }

    Ok(())
}
