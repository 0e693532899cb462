//! `ragchat`: ask questions about your text files.

mod config;
mod repl;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use ragchat_rag::{ChatSession, RagPipeline};
use ragchat_telemetry::{LogFormat, TelemetryConfig, init_telemetry};

use crate::config::{ServiceArgs, ingest_files};

#[derive(Parser)]
#[command(name = "ragchat", version, about = "Chat with your documents")]
struct Cli {
    #[command(flatten)]
    services: ServiceArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log filter, e.g. `debug` or `ragchat_rag=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a single question and exit
    Ask {
        question: String,

        /// Text file to ingest first (repeatable)
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,
    },
    /// Start an interactive conversation
    Chat {
        /// Text file to ingest first (repeatable)
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn telemetry(&self) -> TelemetryConfig {
        let mut telemetry = TelemetryConfig::default();
        if self.json_logs {
            telemetry = telemetry.with_format(LogFormat::Json);
        }
        if let Some(level) = &self.log_level {
            telemetry = telemetry.with_directive(level.clone());
        }
        telemetry
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_telemetry(&cli.telemetry())?;

    let pipeline = cli.services.build_pipeline().await?;
    match cli.command {
        Command::Ask { question, files } => {
            ingest_files(&pipeline, &files).await?;
            ask_once(&pipeline, &question).await
        }
        Command::Chat { files } => {
            let documents = ingest_files(&pipeline, &files).await?;
            repl::run(ChatSession::new(pipeline)?, documents).await
        }
    }
}

async fn ask_once(pipeline: &RagPipeline, question: &str) -> Result<()> {
    let mut stdout = io::stdout();
    let mut answer = pipeline.answer(question, "");
    while let Some(fragment) = answer.next().await {
        write!(stdout, "{fragment}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
