//! Configuration module for Docent.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    AgentSettings, CheckpointSettings, CorpusSettings, EmbeddingSettings, GeneralSettings,
    ModelSettings, PromptSettings, Settings,
};
