//! Interactive chat command.

use super::{interrupt_token, new_session_id, with_model};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::DocentError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(
    session: Option<String>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let settings = with_model(settings, model);

    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let mut session_id = session.unwrap_or_else(new_session_id);

    if let Ok(transcript) = orchestrator.session(&session_id).await {
        Output::info(&format!(
            "Resuming session {} ({} messages)",
            session_id,
            transcript.len()
        ));
    }

    println!("\n{}", style("Docent Chat").bold().cyan());
    println!(
        "{}",
        style("Type your questions, 'new' to start a fresh session, 'retry' after a failed turn, or 'exit' to quit.").dim()
    );
    println!(
        "{}\n",
        style(format!("Tools: {}", orchestrator.registry().names().join(", "))).dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("new") {
            session_id = new_session_id();
            Output::info(&format!("Started session {}", session_id));
            continue;
        }

        let cancel = interrupt_token();
        let _stop_listener = cancel.clone().drop_guard();

        let result = if input.eq_ignore_ascii_case("retry") {
            orchestrator.resume_turn(&session_id, &cancel).await
        } else {
            orchestrator.run_turn(&session_id, input, &cancel).await
        };

        match result {
            Ok(outcome) => {
                for call in &outcome.tool_calls {
                    println!("{}", style(format!("  [{}]", call.name)).dim());
                }
                println!("\n{} {}\n", style("Docent:").cyan().bold(), outcome.reply);
            }
            Err(DocentError::Cancelled) => {
                Output::warning("Interrupted.");
            }
            Err(DocentError::CheckpointWriteFailed {
                transcript, reason, ..
            }) => {
                if let Some(reply) = transcript.final_reply() {
                    println!("\n{} {}\n", style("Docent:").cyan().bold(), reply);
                }
                Output::warning(&format!("Not saved: {}. Type 'retry' to try again.", reason));
            }
            Err(e) if e.is_retryable() => {
                Output::error(&format!("Error: {}. Type 'retry' to try again.", e));
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Output::kv("Session", &session_id);
    Ok(())
}
