//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "Local-first chat sync CLI: send, refresh, analyze, list, watch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Overrides CHAT_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Overrides DATABASE_URL.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message as the configured author (AUTHOR_ID / AUTHOR_NAME).
    Send {
        conversation: String,
        text: String,
    },
    /// Replace the cached history of a conversation with the server's.
    Refresh { conversation: String },
    /// Ask the AI assistant to analyze a conversation and append its reply.
    Analyze { conversation: String },
    /// Print the cached messages of a conversation, in order.
    List {
        conversation: String,
        /// Refresh from the server before printing.
        #[arg(short, long)]
        refresh: bool,
    },
    /// Print every update of a conversation until Ctrl-C.
    Watch {
        conversation: String,
        /// Refresh from the server once after subscribing.
        #[arg(short, long)]
        refresh: bool,
    },
}
