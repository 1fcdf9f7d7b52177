//! # Scheme Navigator CLI (`schemenav`)
//!
//! ## Usage
//!
//! ```bash
//! schemenav --config ./config/schemenav.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `schemenav serve` | Start the HTTP server |
//! | `schemenav ask "<query>"` | Answer one query in a fresh session |
//! | `schemenav chat` | Interactive session on stdin |
//! | `schemenav check` | Validate config and report collaborators |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scheme_nav::config::{self, Config};
use scheme_nav::retriever::CorpusRetriever;
use scheme_nav::service::ChatService;
use scheme_nav::server;

/// Scheme Navigator: ask questions about agriculture schemes, grounded in
/// a document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/schemenav.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "schemenav",
    about = "Scheme Navigator: conversational retrieval-augmented answers over scheme documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/schemenav.toml`. When the file is missing,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/schemenav.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/status`, `/health`, `/start`
    /// and `/continue`.
    Serve,

    /// Answer a single query in a fresh session.
    Ask {
        /// The question to ask.
        query: String,
    },

    /// Chat interactively.
    ///
    /// The first line opens a session and later lines continue it.
    /// Type `/exit` or send EOF to quit.
    Chat,

    /// Validate the configuration and report which collaborators are enabled.
    Check,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    init_tracing(&cfg.logging.level);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { query } => {
            let service = ChatService::from_config(&cfg).await?;
            let reply = service.start(&query).await?;
            println!("{}", reply.answer);
            println!();
            println!("session: {}", reply.session_id);
        }
        Commands::Chat => {
            let service = ChatService::from_config(&cfg).await?;
            run_chat(&service).await?;
        }
        Commands::Check => {
            run_check(&cfg)?;
        }
    }

    Ok(())
}

async fn run_chat(service: &ChatService) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut session_id: Option<String> = None;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query == "/exit" {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let result = match &session_id {
            None => service.start(query).await,
            Some(id) => service.continue_session(id, query).await,
        };
        match result {
            Ok(reply) => {
                if session_id.is_none() {
                    eprintln!("session: {}", reply.session_id);
                }
                session_id = Some(reply.session_id);
                stdout.write_all(format!("{}\n\n", reply.answer).as_bytes()).await?;
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

fn run_check(cfg: &Config) -> anyhow::Result<()> {
    println!("server.bind        {}", cfg.server.bind);
    println!("interaction_log    {}", cfg.interaction_log.path.display());
    println!(
        "sessions           ttl={} max={}",
        cfg.sessions
            .ttl_secs
            .map_or("none".to_string(), |s| format!("{}s", s)),
        cfg.sessions
            .max_sessions
            .map_or("none".to_string(), |n| n.to_string())
    );

    match cfg.retriever.provider.as_str() {
        "local" => {
            let corpus = CorpusRetriever::load(&cfg.retriever)
                .context("Failed to load local corpus")?;
            println!(
                "retriever          local ({} passages from {} documents)",
                corpus.len(),
                corpus.documents()
            );
        }
        "harness" => println!(
            "retriever          harness ({})",
            cfg.retriever.url.as_deref().unwrap_or_default()
        ),
        _ => println!("retriever          disabled"),
    }

    if cfg.generator.is_enabled() {
        println!(
            "generator          {} ({})",
            cfg.generator.provider,
            cfg.generator.model.as_deref().unwrap_or("default model")
        );
        if cfg.generator.provider == "openai" && std::env::var(&cfg.generator.api_key_env).is_err()
        {
            println!(
                "                   warning: {} is not set",
                cfg.generator.api_key_env
            );
        }
    } else {
        println!("generator          disabled");
    }

    Ok(())
}
