//! CLI output formatting utilities.

use crate::agent::{Message, Role};
use crate::checkpoint::SessionSummary;
use crate::corpus::DocumentInfo;
use crate::orchestrator::ToolCallRecord;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print document info.
    pub fn document_info(document: &DocumentInfo) {
        let pages = document
            .page_count
            .map(|p| format!(", {} pages", p))
            .unwrap_or_default();
        println!(
            "  {} {} ({}, {} passages{})",
            style("*").cyan(),
            style(&document.document_title).bold(),
            style(&document.document_id).dim(),
            document.passage_count,
            pages
        );
    }

    /// Print session info.
    pub fn session_info(session: &SessionSummary) {
        println!(
            "  {} {} ({} messages, updated {})",
            style("*").cyan(),
            style(&session.session_id).bold(),
            session.message_count,
            session.updated_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(preview) = &session.preview {
            println!("    {}", style(preview).dim());
        }
    }

    /// Print a tool call made during a turn.
    pub fn tool_call(call: &ToolCallRecord) {
        println!(
            "  {} {} {}",
            style("*").cyan(),
            style(&call.name).bold(),
            style(content_preview(&call.arguments, 60)).dim()
        );
    }

    /// Print one transcript message.
    pub fn message(message: &Message) {
        match message.role() {
            Role::User => println!("\n{} {}", style("You:").green().bold(), message.content()),
            Role::Assistant => {
                if !message.content().is_empty() {
                    println!("\n{} {}", style("Docent:").cyan().bold(), message.content());
                }
                for request in message.tool_requests() {
                    println!("  {}", style(format!("[{}] {}", request.id, request)).dim());
                }
            }
            Role::ToolResult => println!(
                "  {} {}",
                style(format!("[{}]", message.responds_to().unwrap_or("?"))).dim(),
                content_preview(message.content(), 120)
            ),
            Role::System => println!("\n{}", style(message.content()).dim()),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        format!("{}...", content.chars().take(max_chars).collect::<String>())
    }
}
