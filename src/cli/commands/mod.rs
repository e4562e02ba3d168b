//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod documents;
mod serve;
mod sessions;

pub use ask::{run_ask, run_retry};
pub use chat::run_chat;
pub use config::run_config;
pub use documents::run_documents;
pub use serve::run_serve;
pub use sessions::run_sessions;

use crate::config::Settings;
use tokio_util::sync::CancellationToken;

/// Token cancelled on Ctrl+C. Cancelling the token also stops the listener.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let listener = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => listener.cancel(),
            _ = listener.cancelled() => {}
        }
    });
    token
}

/// Apply a `--model` override.
fn with_model(mut settings: Settings, model: Option<String>) -> Settings {
    if let Some(model) = model {
        settings.model.name = model;
    }
    settings
}

/// A fresh session id.
fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model_override() {
        let settings = with_model(Settings::default(), Some("llama3.1".to_string()));
        assert_eq!(settings.model.name, "llama3.1");

        let settings = with_model(Settings::default(), None);
        assert_eq!(settings.model.name, Settings::default().model.name);
    }

    #[test]
    fn test_new_session_ids_differ() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
