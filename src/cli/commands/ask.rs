//! Ask and retry command implementations.

use super::{interrupt_token, new_session_id, with_model};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::DocentError;
use crate::orchestrator::{Orchestrator, TurnOutcome};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    message: &str,
    session: Option<String>,
    model: Option<String>,
    ephemeral: bool,
    settings: Settings,
) -> Result<()> {
    let mut settings = with_model(settings, model);
    if ephemeral {
        settings.checkpoint.provider = "memory".to_string();
    }

    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let session_id = session.unwrap_or_else(new_session_id);

    let cancel = interrupt_token();
    let _stop_listener = cancel.clone().drop_guard();

    let spinner = Output::spinner("Thinking...");
    let result = orchestrator.run_turn(&session_id, message, &cancel).await;
    spinner.finish_and_clear();

    report(result, &session_id, !ephemeral)
}

/// Run the retry command: finish the unfinished turn of a stored session.
pub async fn run_retry(session_id: &str, model: Option<String>, settings: Settings) -> Result<()> {
    let settings = with_model(settings, model);

    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;

    let cancel = interrupt_token();
    let _stop_listener = cancel.clone().drop_guard();

    let spinner = Output::spinner("Retrying...");
    let result = orchestrator.resume_turn(session_id, &cancel).await;
    spinner.finish_and_clear();

    report(result, session_id, true)
}

fn report(
    result: crate::Result<TurnOutcome>,
    session_id: &str,
    persistent: bool,
) -> Result<()> {
    match result {
        Ok(outcome) => {
            println!("\n{}\n", outcome.reply);

            if !outcome.tool_calls.is_empty() {
                Output::header(&format!("Tool calls ({})", outcome.tool_calls.len()));
                for call in &outcome.tool_calls {
                    Output::tool_call(call);
                }
                println!();
            }

            Output::info(&format!(
                "Completed in {} model call(s)",
                outcome.model_calls
            ));
            if persistent {
                Output::kv("Session", &outcome.session_id);
            }
            Ok(())
        }
        Err(DocentError::Cancelled) => {
            Output::warning("Interrupted. The session was saved up to the last completed step.");
            Ok(())
        }
        Err(e) => {
            if let DocentError::CheckpointWriteFailed {
                transcript, reason, ..
            } = &e
            {
                if let Some(reply) = transcript.final_reply() {
                    println!("\n{}\n", reply);
                }
                Output::warning(&format!(
                    "The session was not saved past its last checkpoint: {}",
                    reason
                ));
            } else {
                Output::error(&format!("Turn failed: {}", e));
            }
            if let Some(hint) = retry_hint(&e, session_id, persistent) {
                Output::info(&hint);
            }
            Err(e.into())
        }
    }
}

/// How to retry a failed turn, when a retry can pick it up.
fn retry_hint(error: &DocentError, session_id: &str, persistent: bool) -> Option<String> {
    (persistent && error.is_retryable()).then(|| format!("Retry with: docent retry {}", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_hint() {
        let down = DocentError::ModelUnavailable("connection refused".to_string());

        assert_eq!(
            retry_hint(&down, "abc", true).as_deref(),
            Some("Retry with: docent retry abc")
        );
        assert_eq!(retry_hint(&down, "abc", false), None);
        assert_eq!(
            retry_hint(&DocentError::TurnBudgetExceeded("15 calls".to_string()), "abc", true),
            None
        );
    }
}
