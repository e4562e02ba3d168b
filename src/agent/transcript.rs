//! Append-only conversation transcript.
//!
//! A transcript only ever grows. Assistant messages that request tools are
//! committed together with their results, so a stored transcript never holds
//! an assistant request without the matching tool-result messages.

use crate::error::{DocentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::ToolResult => write!(f, "tool"),
        }
    }
}

/// An assistant-issued request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id, unique within the requesting message.
    pub id: String,
    /// Name of the requested tool.
    pub tool_name: String,
    /// Structured arguments.
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolRequest {
    /// Create a new tool request.
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Arguments rendered as a compact JSON string.
    pub fn arguments_json(&self) -> String {
        serde_json::Value::Object(self.arguments.clone()).to_string()
    }
}

impl std::fmt::Display for ToolRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.tool_name, self.arguments_json())
    }
}

/// One turn in a transcript. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_requests: Vec<ToolRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    responds_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_requests: Vec::new(),
            responds_to: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// An assistant message, optionally requesting tools.
    pub fn assistant(content: impl Into<String>, tool_requests: Vec<ToolRequest>) -> Self {
        let mut message = Self::new(Role::Assistant, content.into());
        message.tool_requests = tool_requests;
        message
    }

    /// A tool-result message answering `request`.
    pub fn tool_result(request: &ToolRequest, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::ToolResult, content.into());
        message.responds_to = Some(request.id.clone());
        message.tool_name = Some(request.tool_name.clone());
        message
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tool_requests(&self) -> &[ToolRequest] {
        &self.tool_requests
    }

    pub fn responds_to(&self) -> Option<&str> {
        self.responds_to.as_deref()
    }

    /// Name of the tool a tool-result message answers.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether this is an assistant message requesting at least one tool.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_requests.is_empty()
    }
}

/// Ordered, append-only log of messages for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from stored messages, rejecting invalid histories.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        validate(&messages, &[])?;
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Messages appended at or after `index`.
    pub fn since(&self, index: usize) -> &[Message] {
        &self.messages[index.min(self.messages.len())..]
    }

    /// Content of the last message when it is an assistant reply that
    /// requests no tools, which is how every finished turn ends.
    pub fn final_reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant && m.tool_requests.is_empty())
            .map(|m| m.content.as_str())
    }

    /// Append a user message.
    pub fn append_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant reply that requests no tools.
    pub fn append_reply(&mut self, reply: Message) -> Result<()> {
        if reply.role != Role::Assistant {
            return Err(DocentError::InvalidTranscript(format!(
                "expected an assistant reply, got a {} message",
                reply.role
            )));
        }
        if !reply.tool_requests.is_empty() {
            return Err(DocentError::InvalidTranscript(
                "assistant tool requests must be appended with their results".to_string(),
            ));
        }
        self.messages.push(reply);
        Ok(())
    }

    /// Append an assistant message together with its tool results.
    ///
    /// `results` must answer every request of `assistant`, in request order.
    pub fn append_exchange(&mut self, assistant: Message, results: Vec<Message>) -> Result<()> {
        if !assistant.requests_tools() {
            return Err(DocentError::InvalidTranscript(
                "exchange must start with an assistant message requesting tools".to_string(),
            ));
        }

        let mut exchange = Vec::with_capacity(results.len() + 1);
        exchange.push(assistant);
        exchange.extend(results);
        validate(&[], &exchange)?;

        self.messages.extend(exchange);
        Ok(())
    }

    /// Append every message of `other` after this transcript's messages.
    ///
    /// Returns the number of appended messages.
    pub fn merge(&mut self, other: Transcript) -> Result<usize> {
        validate(&self.messages, &other.messages)?;
        let added = other.messages.len();
        self.messages.extend(other.messages);
        Ok(added)
    }
}

impl TryFrom<Vec<Message>> for Transcript {
    type Error = DocentError;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::from_messages(messages)
    }
}

impl From<Transcript> for Vec<Message> {
    fn from(transcript: Transcript) -> Self {
        transcript.messages
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Check the tool exchange invariant over `head` followed by `tail`.
///
/// `head` must already be valid on its own; only the boundary and `tail`
/// can introduce violations, but walking the chain keeps the rule in one place.
fn validate(head: &[Message], tail: &[Message]) -> Result<()> {
    let messages: Vec<&Message> = head.iter().chain(tail.iter()).collect();
    let mut i = 0;

    while i < messages.len() {
        let message = messages[i];

        if message.role != Role::Assistant && !message.tool_requests.is_empty() {
            return Err(DocentError::InvalidTranscript(format!(
                "message {} ({}) carries tool requests",
                i, message.role
            )));
        }

        match message.role {
            Role::ToolResult => {
                return Err(DocentError::InvalidTranscript(format!(
                    "tool result at {} does not follow an assistant tool request",
                    i
                )));
            }
            Role::Assistant if !message.tool_requests.is_empty() => {
                let mut seen = HashSet::new();
                for (offset, request) in message.tool_requests.iter().enumerate() {
                    if !seen.insert(request.id.as_str()) {
                        return Err(DocentError::InvalidTranscript(format!(
                            "duplicate tool request id '{}' at {}",
                            request.id, i
                        )));
                    }

                    let position = i + 1 + offset;
                    match messages.get(position) {
                        Some(result)
                            if result.role == Role::ToolResult
                                && result.responds_to.as_deref() == Some(request.id.as_str()) => {}
                        Some(_) => {
                            return Err(DocentError::InvalidTranscript(format!(
                                "message {} does not answer tool request '{}'",
                                position, request.id
                            )));
                        }
                        None => {
                            return Err(DocentError::InvalidTranscript(format!(
                                "tool request '{}' at {} has no result",
                                request.id, i
                            )));
                        }
                    }
                }
                i += 1 + message.tool_requests.len();
                continue;
            }
            _ => {
                if message.responds_to.is_some() {
                    return Err(DocentError::InvalidTranscript(format!(
                        "message {} ({}) answers a tool request",
                        i, message.role
                    )));
                }
            }
        }

        i += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(id: &str, name: &str) -> ToolRequest {
        let args = json!({ "text": id }).as_object().cloned().unwrap_or_default();
        ToolRequest::new(id, name, args)
    }

    #[test]
    fn test_exchange_keeps_request_order() {
        let requests = vec![request("r1", "echo"), request("r2", "echo"), request("r3", "echo")];
        let results: Vec<Message> = requests.iter().map(|r| Message::tool_result(r, "ok")).collect();

        let mut transcript = Transcript::new();
        transcript.append_user("hi");
        transcript
            .append_exchange(Message::assistant("", requests), results)
            .unwrap();

        let answered: Vec<&str> = transcript
            .since(2)
            .iter()
            .filter_map(|m| m.responds_to())
            .collect();
        assert_eq!(answered, vec!["r1", "r2", "r3"]);
        assert_eq!(transcript.len(), 5);
    }

    #[test]
    fn test_exchange_rejects_misordered_results() {
        let requests = vec![request("a", "echo"), request("b", "echo")];
        let results = vec![
            Message::tool_result(&requests[1], "b"),
            Message::tool_result(&requests[0], "a"),
        ];

        let mut transcript = Transcript::new();
        transcript.append_user("hi");
        let err = transcript
            .append_exchange(Message::assistant("", requests), results)
            .unwrap_err();

        assert!(matches!(err, DocentError::InvalidTranscript(_)));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_exchange_rejects_missing_result() {
        let requests = vec![request("a", "echo"), request("b", "echo")];
        let results = vec![Message::tool_result(&requests[0], "a")];

        let mut transcript = Transcript::new();
        assert!(transcript
            .append_exchange(Message::assistant("", requests), results)
            .is_err());
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_append_reply_rejects_tool_messages() {
        let req = request("a", "echo");
        let mut transcript = Transcript::new();

        assert!(transcript.append_reply(Message::tool_result(&req, "x")).is_err());
        assert!(transcript.append_reply(Message::user("x")).is_err());
        assert!(transcript
            .append_reply(Message::assistant("", vec![req.clone()]))
            .is_err());
        transcript.append_reply(Message::assistant("Done", vec![])).unwrap();
        assert_eq!(transcript.last().map(|m| m.content()), Some("Done"));
    }

    #[test]
    fn test_final_reply_only_after_finished_turn() {
        let req = request("a", "echo");
        let mut transcript = Transcript::new();
        assert_eq!(transcript.final_reply(), None);

        transcript.append_user("hi");
        assert_eq!(transcript.final_reply(), None);

        transcript
            .append_exchange(
                Message::assistant("Looking", vec![req.clone()]),
                vec![Message::tool_result(&req, "a")],
            )
            .unwrap();
        assert_eq!(transcript.final_reply(), None);

        transcript.append_reply(Message::assistant("Done", vec![])).unwrap();
        assert_eq!(transcript.final_reply(), Some("Done"));
    }

    #[test]
    fn test_from_messages_rejects_dangling_request() {
        let req = request("a", "echo");
        let messages = vec![Message::user("hi"), Message::assistant("", vec![req])];
        assert!(Transcript::from_messages(messages).is_err());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let req = request("a", "echo");
        let mut transcript = Transcript::new();
        transcript.append_user("hi");
        transcript
            .append_exchange(
                Message::assistant("", vec![req.clone()]),
                vec![Message::tool_result(&req, "a")],
            )
            .unwrap();

        let json = serde_json::to_string(&transcript).unwrap();
        let restored: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, transcript);

        let dangling = serde_json::to_string(&vec![Message::tool_result(&req, "a")]).unwrap();
        assert!(serde_json::from_str::<Transcript>(&dangling).is_err());
    }

    #[test]
    fn test_merge_only_grows() {
        let mut base = Transcript::new();
        base.append_user("one");
        let before: Vec<Message> = base.messages().to_vec();

        let mut more = Transcript::new();
        more.append_reply(Message::assistant("two", vec![])).unwrap();
        more.append_user("three");

        assert_eq!(base.merge(more).unwrap(), 2);
        assert_eq!(base.len(), 3);
        assert_eq!(&base.messages()[..1], before.as_slice());
    }

    #[test]
    fn test_tool_request_display() {
        let req = ToolRequest::new(
            "1",
            "search_documents",
            json!({"query": "test"}).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(format!("{}", req), r#"search_documents({"query":"test"})"#);
    }
}
