//! Command-line interface definition for DocChat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot questions,
//! conversation creation, and transcript display.

use crate::error::{DocChatError, Result};
use crate::navigation::Route;
use clap::{Args, Parser, Subcommand};

/// DocChat - converse with your uploaded documents
///
/// Every submission fans out a battery of questions to the backend in
/// parallel and reloads the transcript once all answers are in.
#[derive(Parser, Debug, Clone)]
#[command(name = "docchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to the per-user config directory)
    #[arg(short, long, env = "DOCCHAT_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the backend base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the question strategy (battery, prompt, both)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Identifies a conversation either by route or by explicit ids
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteArgs {
    /// Route in the form /doc/<document>/<conversation>
    #[arg(short, long, conflicts_with_all = ["document", "conversation"])]
    pub route: Option<String>,

    /// Document identifier
    #[arg(short, long)]
    pub document: Option<String>,

    /// Conversation identifier
    #[arg(long)]
    pub conversation: Option<String>,
}

impl RouteArgs {
    /// Resolve the arguments into a validated route
    ///
    /// # Errors
    ///
    /// Returns `DocChatError::InvalidRoute` when neither form is complete
    pub fn resolve(&self) -> Result<Route> {
        match (&self.route, &self.document, &self.conversation) {
            (Some(route), _, _) => route.parse(),
            (None, Some(document), Some(conversation)) => Route::new(document, conversation),
            _ => Err(DocChatError::InvalidRoute(
                "provide --route /doc/<document>/<conversation> or both --document and --conversation"
                    .to_string(),
            )
            .into()),
        }
    }
}

/// Available commands for DocChat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive conversation
    Chat {
        #[command(flatten)]
        target: RouteArgs,
    },

    /// Submit a single prompt and print the reconciled transcript
    Ask {
        #[command(flatten)]
        target: RouteArgs,

        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Print the dispatch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new conversation for a document and print its route
    New {
        /// Document identifier
        #[arg(short, long)]
        document: String,
    },

    /// Print a conversation transcript
    Show {
        #[command(flatten)]
        target: RouteArgs,

        /// Print the raw conversation as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            verbose: false,
            base_url: None,
            strategy: None,
            command: Commands::Show {
                target: RouteArgs::default(),
                json: false,
            },
        }
    }
}
