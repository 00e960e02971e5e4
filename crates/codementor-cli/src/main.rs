//! CodeMentor CLI
//!
//! Main entry point for serving the CodeMentor learning API.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use codementor_llm::{CompletionBackend, GeminiClient, GeminiOptions};
use codementor_orchestrator::{create_router, AppState, Config, Language, LlmContentGenerator};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 8000;

/// Default bind address for the HTTP API server.
const DEFAULT_HOST: &str = "127.0.0.1";

/// CodeMentor - Interactive Programming Tutor
///
/// Serves generated lessons, quizzes, coding challenges, and tutoring
/// over HTTP for learners working through a fixed curriculum.
#[derive(Parser, Debug)]
#[command(name = "codementor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: codementor.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Address to bind the HTTP API server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Override the generation model from the config file
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("CodeMentor starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads config, builds the generation backend, and serves until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref model) = args.model {
        config.generator.model.clone_from(model);
    }

    config.validate()?;

    print_config(&config);

    let api_key = read_api_key(&config.generator.api_key_env)?;
    let options = GeminiOptions::new(api_key, config.generator.model.clone())
        .with_temperature(config.generator.temperature)
        .with_timeout(Duration::from_secs(config.generator.request_timeout_secs));
    let client = GeminiClient::new(options)
        .map_err(|e| anyhow::anyhow!("Failed to create generation client: {e}"))?;
    tracing::info!(model = %client.model(), "Generation backend ready");

    let generator = LlmContentGenerator::from_config(client, &config);
    let router = create_router(AppState::new(config, Arc::new(generator)));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {e}", args.host))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("CodeMentor API running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("CodeMentor stopped");
    Ok(())
}

/// Loads the config from an explicit path or the working directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Reads the generation API key from the named environment variable.
fn read_api_key(var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!(
            "Environment variable {var} is not set\n\nSuggestion: Export your generation API key as {var} or change generator.apiKeyEnv"
        ),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.generator.model);
    println!("  Content language: {}", config.content_language);
    println!("  Quiz questions: {}", config.quiz_question_count);
    println!("  Pass threshold: {:.0}%", config.pass_threshold * 100.0);
    println!("  Missing sessions: {}", config.missing_session);
    println!(
        "  Languages: {}",
        Language::ALL.map(Language::name).join(", ")
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    println!();
    println!("Shutting down...");
}
