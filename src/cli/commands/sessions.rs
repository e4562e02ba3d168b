//! Sessions command implementation.

use crate::checkpoint::open_store;
use crate::cli::{Output, SessionsAction};
use crate::config::Settings;
use anyhow::{bail, Result};

/// Run the sessions command.
pub async fn run_sessions(action: &SessionsAction, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;

    match action {
        SessionsAction::List => {
            let sessions = store.list().await?;
            if sessions.is_empty() {
                Output::info("No sessions yet. Use 'docent ask' or 'docent chat' to start one.");
            } else {
                Output::header(&format!("Sessions ({})", sessions.len()));
                println!();
                for session in &sessions {
                    Output::session_info(session);
                }
            }
        }

        SessionsAction::Show { session_id } => {
            let Some(transcript) = store.load(session_id).await? else {
                bail!("Session not found: {}", session_id);
            };

            Output::header(&format!("Session {}", session_id));
            for message in &transcript {
                Output::message(message);
            }
            println!();
        }

        SessionsAction::Delete { session_id } => {
            if store.delete(session_id).await? {
                Output::success(&format!("Deleted session {}", session_id));
            } else {
                bail!("Session not found: {}", session_id);
            }
        }
    }

    Ok(())
}
