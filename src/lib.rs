//! Docent - conversational research over an ingested document corpus
//!
//! A local-first CLI and library for a tool-augmented conversational agent.
//! The model answers questions by calling tools that search the passages an
//! ingestion pipeline has written to a SQLite store.
//!
//! # Overview
//!
//! Docent allows you to:
//! - Ask questions about your documents and get answers with citations
//! - Hold resumable conversations, checkpointed after every step
//! - Plug in your own tools and model backends
//! - Serve conversations over HTTP
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `agent` - Transcript, tool registry, model invoker and tool dispatcher
//! - `orchestrator` - The turn state machine
//! - `checkpoint` - Session persistence
//! - `corpus` - Read side of the passage store
//! - `embedding` - Query embeddings
//! - `tools` - Built-in document tools
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use docent::config::Settings;
//! use docent::orchestrator::Orchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let outcome = orchestrator
//!         .run_turn("maintenance", "How often should the seals be replaced?", &CancellationToken::new())
//!         .await?;
//!     println!("{}", outcome.reply);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod tools;

pub use error::{DocentError, Result};
