//! CLI module for Kurs.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kurs - Question answering over course materials
///
/// Indexes course outlines and lesson content, then answers questions with a
/// tool-using language model that cites the lessons it drew from.
#[derive(Parser, Debug)]
#[command(name = "kurs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question about the indexed courses
    Ask {
        /// The question to ask
        question: String,

        /// Session id to record the exchange under (sessions are kept in memory)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start an interactive chat session
    Chat,

    /// Search course content without the language model
    Search {
        /// Search query
        query: String,

        /// Restrict to a course (partial names work)
        #[arg(short = 'C', long)]
        course: Option<String>,

        /// Restrict to a lesson number
        #[arg(short, long)]
        lesson: Option<u32>,
    },

    /// List indexed courses
    Courses,

    /// Show a course outline
    Outline {
        /// Course title (partial names work)
        course: String,
    },

    /// Index course documents (a JSON file or a folder of them)
    Index {
        /// Path to a course JSON file or a folder of course JSON files
        path: String,

        /// Clear all indexed courses before indexing a folder
        #[arg(long)]
        clear: bool,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Folder of course documents to index before serving
        #[arg(long)]
        docs: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
