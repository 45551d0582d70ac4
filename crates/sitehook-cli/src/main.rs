//! Sitehook - webhook-triggered site builds and contact-form verification
//!
//! The `sitehook` command warms up one handler and serves events with it.
//!
//! ## Commands
//!
//! - `bootstrap`: provision the toolchain and workspace, then report them
//! - `build`: handle one webhook event with the build pipeline
//! - `contact`: handle one contact-form event
//! - `serve`: warm up once, then handle one event per stdin line

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};

use sitehook_build::{BuildPipeline, WarmEnvironment};
use sitehook_core::{
    BuildConfig, ContactConfig, ContactHandler, HttpKeyDecryptor, HttpSiteVerifyClient,
    ResponseEnvelope,
};

#[derive(Parser)]
#[command(name = "sitehook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Webhook-triggered static site builds and contact-form verification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (also SITEHOOK_LOG_FORMAT=json)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the build toolchain and workspace, then report them
    Bootstrap,

    /// Handle one webhook event with the build pipeline
    Build {
        /// Gateway event JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
    },

    /// Handle one contact-form event
    Contact {
        /// Gateway event JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
    },

    /// Warm up once, then handle one event per stdin line until EOF
    Serve {
        #[arg(long, value_enum)]
        handler: HandlerKind,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HandlerKind {
    Build,
    Contact,
}

/// A warmed-up handler of either kind.
enum Handler {
    Build(BuildPipeline),
    Contact(ContactHandler),
}

impl Handler {
    async fn warm_up(kind: HandlerKind) -> Result<Self> {
        match kind {
            HandlerKind::Build => {
                let config = BuildConfig::from_env().context("Invalid build configuration")?;
                let environment = WarmEnvironment::warm_up(&config)
                    .await
                    .context("Build environment warm-up failed")?;
                Ok(Handler::Build(BuildPipeline::from_config(
                    &config,
                    Arc::new(environment),
                )))
            }
            HandlerKind::Contact => {
                let config = ContactConfig::from_env().context("Invalid contact configuration")?;
                let decryptor = HttpKeyDecryptor::new(&config.decrypt_endpoint)
                    .context("Failed to create key-decryption client")?;
                let client = HttpSiteVerifyClient::new(&config.captcha_verify_url)
                    .context("Failed to create verification client")?;
                let handler = ContactHandler::warm_up(&config, &decryptor, Arc::new(client))
                    .await
                    .context("Contact handler warm-up failed")?;
                Ok(Handler::Contact(handler))
            }
        }
    }

    async fn handle_raw(&self, raw: &str) -> ResponseEnvelope {
        match self {
            Handler::Build(pipeline) => pipeline.handle_raw(raw).await,
            Handler::Contact(handler) => handler.handle_raw(raw).await,
        }
    }
}

#[derive(Serialize)]
struct BootstrapReport {
    scratch_dir: PathBuf,
    tools: Vec<ToolReport>,
    search_path: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ToolReport {
    tool: String,
    install_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    sitehook_core::init_tracing(cli.json || sitehook_core::telemetry::json_requested(), level);

    match cli.command {
        Commands::Bootstrap => cmd_bootstrap().await,
        Commands::Build { event } => cmd_once(HandlerKind::Build, &event).await,
        Commands::Contact { event } => cmd_once(HandlerKind::Contact, &event).await,
        Commands::Serve { handler } => cmd_serve(handler).await,
    }
}

async fn cmd_bootstrap() -> Result<()> {
    let config = BuildConfig::from_env().context("Invalid build configuration")?;
    let environment = WarmEnvironment::warm_up(&config)
        .await
        .context("Build environment warm-up failed")?;

    let toolchain = environment.toolchain();
    let report = BootstrapReport {
        scratch_dir: config.scratch_dir.clone(),
        tools: toolchain
            .tools()
            .map(|(tool, dir)| ToolReport {
                tool: tool.to_string(),
                install_dir: dir.to_path_buf(),
            })
            .collect(),
        search_path: toolchain.bin_dirs().to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_once(kind: HandlerKind, event: &str) -> Result<()> {
    let raw = read_event(event).await?;
    let handler = Handler::warm_up(kind).await?;
    let envelope = handler.handle_raw(&raw).await;
    println!("{}", serde_json::to_string(&envelope)?);
    Ok(())
}

async fn cmd_serve(kind: HandlerKind) -> Result<()> {
    let handler = Handler::warm_up(kind).await?;
    info!(event = "serve.ready", handler = ?kind);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut served = 0u64;
    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope = handler.handle_raw(&line).await;
        let mut out = serde_json::to_string(&envelope)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
        served += 1;
    }

    info!(event = "serve.finished", served);
    Ok(())
}

async fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read event file {source}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_requires_handler() {
        assert!(Cli::try_parse_from(["sitehook", "serve"]).is_err());
        let cli = Cli::try_parse_from(["sitehook", "--json", "serve", "--handler", "contact"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                handler: HandlerKind::Contact
            }
        ));
    }

    #[test]
    fn build_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["sitehook", "build"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { ref event } if event == "-"));
    }

    #[tokio::test]
    async fn read_event_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"body":"{}"}"#).unwrap();

        let raw = read_event(path.to_str().unwrap()).await.unwrap();
        assert_eq!(raw, r#"{"body":"{}"}"#);
        assert!(read_event("/nonexistent/sitehook/event.json").await.is_err());
    }
}
