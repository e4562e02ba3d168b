//! CLI module for Docent.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Docent - conversational research over your documents
///
/// A local-first CLI for asking questions about an ingested document corpus.
/// Conversations are stored as sessions and can be resumed at any time.
#[derive(Parser, Debug)]
#[command(name = "docent")]
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
    /// Ask one question and print the answer
    Ask {
        /// The message to send
        message: String,

        /// Session to continue (a new session is started if omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Keep the session in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Finish the unfinished turn of a session after a failure
    Retry {
        /// Session whose last turn failed
        session_id: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// Session to continue (a new session is started if omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// List documents in the corpus
    Documents,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List stored sessions
    List,

    /// Print the transcript of a session
    Show {
        /// Session ID
        session_id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        session_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "docent", "-vv", "ask", "What is the torque?", "-s", "abc", "--ephemeral",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                message,
                session,
                model,
                ephemeral,
            } => {
                assert_eq!(message, "What is the torque?");
                assert_eq!(session.as_deref(), Some("abc"));
                assert!(model.is_none());
                assert!(ephemeral);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_retry() {
        let cli = Cli::try_parse_from(["docent", "retry", "abc", "-m", "llama3.1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Retry { ref session_id, ref model }
                if session_id == "abc" && model.as_deref() == Some("llama3.1")
        ));

        assert!(Cli::try_parse_from(["docent", "retry"]).is_err());
    }

    #[test]
    fn test_parse_sessions() {
        let cli = Cli::try_parse_from(["docent", "sessions", "delete", "abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                action: SessionsAction::Delete { ref session_id }
            } if session_id == "abc"
        ));

        assert!(Cli::try_parse_from(["docent", "sessions", "show"]).is_err());
    }
}
