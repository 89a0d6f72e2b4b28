//! RagShield CLI binary.
//!
//! Guardrails for retrieval-augmented generation.
//!
//! # Commands
//!
//! - `scan` - Check text for prompt injection attempts
//! - `sanitize` - Strip embedded instructions from document text
//! - `trust` - Score content trustworthiness
//! - `serve` - Start the HTTP API server

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragshield::{
    config::Config,
    guard::{DocumentSanitizer, InputGuard, TrustScorer},
    server::{run, ServerConfig},
    VERSION,
};

#[derive(Parser)]
#[command(name = "ragshield")]
#[command(version = VERSION)]
#[command(about = "RagShield - guardrails for RAG pipelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check text for prompt injection attempts
    Scan {
        /// Text to scan (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Strip embedded instructions from document text
    Sanitize {
        /// Text to sanitize (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a removal report to stderr
        #[arg(short, long)]
        report: bool,
    },

    /// Score content trustworthiness
    Trust {
        /// Text to score (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Retrieval similarity to assume (0.0 - 1.0)
        #[arg(short, long, default_value = "0.5")]
        similarity: f32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Listen port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Config file path (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable CORS
        #[arg(long)]
        no_cors: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, file, json } => cmd_scan(input, file, json),

        Commands::Sanitize {
            input,
            file,
            output,
            report,
        } => cmd_sanitize(input, file, output, report),

        Commands::Trust {
            input,
            file,
            similarity,
            json,
        } => cmd_trust(input, file, similarity, json),

        Commands::Serve {
            port,
            host,
            bind_all,
            config,
            no_cors,
            verbose,
        } => cmd_serve(port, host, bind_all, config, no_cors, verbose),
    }
}

fn cmd_scan(input: Option<String>, file: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let guard = InputGuard::new();
    let result = guard.check(&content);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", guard.threat_summary(&result));
        if result.blocked {
            println!("Verdict: BLOCKED ({})", result.reason);
        } else if !result.warnings.is_empty() {
            println!("Verdict: allowed with warnings");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        } else {
            println!("Verdict: allowed");
        }
    }

    if result.blocked {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_sanitize(
    input: Option<String>,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
    report: bool,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let sanitizer = DocumentSanitizer::new();
    let sanitized = sanitizer.sanitize(&content);

    write_output(output, &sanitized)?;

    if report {
        let report = sanitizer.sanitization_report(&content, &sanitized);
        eprintln!();
        eprintln!("Sanitization Report:");
        eprintln!("  Original:     {} chars", report.original_length);
        eprintln!("  Sanitized:    {} chars", report.sanitized_length);
        eprintln!(
            "  Removed:      {} chars ({:.1}%)",
            report.characters_removed, report.removal_percentage
        );
        for finding in &report.instructions_found {
            eprintln!("  Found:        {} x{}", finding.category, finding.count);
        }
    }

    Ok(())
}

fn cmd_trust(
    input: Option<String>,
    file: Option<PathBuf>,
    similarity: f32,
    json: bool,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let scorer = TrustScorer::default();
    let report = scorer.trust_report(&content, similarity.clamp(0.0, 1.0));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Trust score:   {:.2}", report.trust_score);
        println!("Recommendation: {}", report.recommendation);
        println!("Context budget: {} chars", report.max_context_allowed);
        for pattern in &report.suspicious_patterns {
            println!("  suspicious: {} ({:+.2}) x{}", pattern.category, pattern.impact, pattern.count);
        }
        for pattern in &report.trust_patterns {
            println!("  trusted:    {} ({:+.2}) x{}", pattern.category, pattern.impact, pattern.count);
        }
    }

    Ok(())
}

fn cmd_serve(
    port: u16,
    host: String,
    bind_all: bool,
    config_path: Option<PathBuf>,
    no_cors: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Layered config: file if given, env vars otherwise
    let app_config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    let mut server_config = ServerConfig::default().with_port(port);
    if bind_all {
        server_config = server_config.bind_all();
    } else {
        let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
        server_config = server_config.with_addr(addr);
    }
    if no_cors {
        server_config = server_config.without_cors();
    }

    tracing::info!("Starting RagShield server on {}", server_config.addr);
    tracing::info!(
        "Ollama backend: {} ({})",
        app_config.ollama.base_url,
        app_config.ollama.model
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        run(app_config, server_config).await?;
        Ok::<_, anyhow::Error>(())
    })
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}
