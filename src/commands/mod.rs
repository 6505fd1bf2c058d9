mod ask;
mod config;
mod sources;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "chat-verify",
    about = "Answer a question from a chat export by filtering, summarizing and cross-verifying messages"
)]
pub struct Cli {
    /// Chat export JSON written by the history exporter
    #[arg(long, default_value = "data.json")]
    pub data: PathBuf,

    /// Log per-document detail
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a question about the loaded chat export
    Ask {
        /// Your question
        query: String,

        /// Print the response body as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List loaded documents, newest first, grouped by author
    Sources {
        /// Max documents to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the effective pipeline configuration
    Config,
}

impl Command {
    pub fn needs_corpus(&self) -> bool {
        !matches!(self, Command::Config)
    }
}

pub async fn dispatch(state: &AppState, command: Command) -> Result<ExitCode> {
    match command {
        Command::Ask { query, json } => ask::ask(state, &query, json).await,
        Command::Sources { limit } => sources::sources(state, limit).map(|_| ExitCode::SUCCESS),
        Command::Config => config::config(state).map(|_| ExitCode::SUCCESS),
    }
}

/// Leading characters of a document id, for compact listings.
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
