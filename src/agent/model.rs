//! Model invocation: one transcript in, one assistant message out.

use super::registry::ToolDefinition;
use super::transcript::{Message, Role, ToolRequest, Transcript};
use crate::error::{DocentError, Result};
use crate::openai::{create_client_with_config, ClientConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Something that can turn a transcript into the next assistant message.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Produce exactly one assistant message for `transcript`.
    ///
    /// The directive is sent ahead of the transcript and is not stored in it.
    async fn invoke(&self, system_directive: &str, transcript: &Transcript) -> Result<Message>;
}

/// Chat-completions backed model with function calling.
pub struct OpenAiModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
    tools: Vec<ChatCompletionTool>,
}

impl OpenAiModel {
    /// Create a model client offering `tools` on every call.
    pub fn new(config: &ClientConfig, model: &str, tools: &[ToolDefinition]) -> Result<Self> {
        Ok(Self {
            client: create_client_with_config(config)?,
            model: model.to_string(),
            temperature: None,
            tools: tools.iter().map(tool_to_openai).collect(),
        })
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ModelInvoker for OpenAiModel {
    #[instrument(skip_all, fields(model = %self.model, messages = transcript.len()))]
    async fn invoke(&self, system_directive: &str, transcript: &Transcript) -> Result<Message> {
        let messages = encode_transcript(system_directive, transcript)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !self.tools.is_empty() {
            args.tools(self.tools.clone());
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args
            .build()
            .map_err(|e| DocentError::Config(format!("Failed to build chat request: {}", e)))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocentError::ModelResponseInvalid("No choices in response".to_string()))?;

        let message = decode_response(choice.message.content, choice.message.tool_calls)?;
        debug!("Model returned {} tool request(s)", message.tool_requests().len());
        Ok(message)
    }
}

fn map_openai_error(err: OpenAIError) -> DocentError {
    match err {
        OpenAIError::JSONDeserialize(e) => {
            DocentError::ModelResponseInvalid(format!("Could not decode response: {}", e))
        }
        other => DocentError::ModelUnavailable(other.to_string()),
    }
}

fn tool_to_openai(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.parameters.clone()),
            strict: None,
        },
    }
}

fn build_error(e: OpenAIError) -> DocentError {
    DocentError::Config(format!("Failed to encode message: {}", e))
}

/// Encode the directive and transcript in chat-completions wire format.
pub fn encode_transcript(
    system_directive: &str,
    transcript: &Transcript,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);

    if !system_directive.is_empty() {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_directive)
                .build()
                .map_err(build_error)?
                .into(),
        );
    }

    for message in transcript {
        let encoded: ChatCompletionRequestMessage = match message.role() {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content())
                .build()
                .map_err(build_error)?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content())
                .build()
                .map_err(build_error)?
                .into(),
            Role::Assistant => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !message.content().is_empty() || message.tool_requests().is_empty() {
                    args.content(message.content());
                }
                if !message.tool_requests().is_empty() {
                    args.tool_calls(
                        message
                            .tool_requests()
                            .iter()
                            .map(request_to_openai)
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map_err(build_error)?.into()
            }
            Role::ToolResult => ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(message.responds_to().unwrap_or_default())
                .content(message.content())
                .build()
                .map_err(build_error)?
                .into(),
        };
        messages.push(encoded);
    }

    Ok(messages)
}

fn request_to_openai(request: &ToolRequest) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: request.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: request.tool_name.clone(),
            arguments: request.arguments_json(),
        },
    }
}

/// Decode a response message into an assistant message.
pub fn decode_response(
    content: Option<String>,
    tool_calls: Option<Vec<ChatCompletionMessageToolCall>>,
) -> Result<Message> {
    let tool_calls = tool_calls.unwrap_or_default();

    if content.is_none() && tool_calls.is_empty() {
        return Err(DocentError::ModelResponseInvalid(
            "Response carried neither content nor tool calls".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut requests = Vec::with_capacity(tool_calls.len());

    for call in tool_calls {
        if call.id.is_empty() {
            return Err(DocentError::ModelResponseInvalid(
                "Tool call without an id".to_string(),
            ));
        }
        if call.function.name.is_empty() {
            return Err(DocentError::ModelResponseInvalid(format!(
                "Tool call '{}' without a function name",
                call.id
            )));
        }
        if !seen.insert(call.id.clone()) {
            return Err(DocentError::ModelResponseInvalid(format!(
                "Duplicate tool call id '{}'",
                call.id
            )));
        }

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Map::new()
        } else {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(other) => {
                    return Err(DocentError::ModelResponseInvalid(format!(
                        "Arguments for '{}' are not an object: {}",
                        call.function.name, other
                    )))
                }
                Err(e) => {
                    return Err(DocentError::ModelResponseInvalid(format!(
                        "Malformed arguments for '{}': {}",
                        call.function.name, e
                    )))
                }
            }
        };

        requests.push(ToolRequest::new(call.id, call.function.name, arguments));
    }

    Ok(Message::assistant(content.unwrap_or_default(), requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str, arguments: &str) -> ChatCompletionMessageToolCall {
        ChatCompletionMessageToolCall {
            id: id.to_string(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn test_decode_plain_reply() {
        let message = decode_response(Some("Done".to_string()), None).unwrap();
        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.content(), "Done");
        assert!(message.tool_requests().is_empty());
    }

    #[test]
    fn test_decode_tool_calls_in_order() {
        let message = decode_response(
            None,
            Some(vec![
                call("call_1", "echo", r#"{"text": "hello"}"#),
                call("call_2", "list_documents", ""),
            ]),
        )
        .unwrap();

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, "call_1");
        assert_eq!(requests[0].arguments.get("text"), Some(&json!("hello")));
        assert_eq!(requests[1].tool_name, "list_documents");
        assert!(requests[1].arguments.is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_arguments() {
        let err = decode_response(None, Some(vec![call("c", "echo", "{not json")])).unwrap_err();
        assert!(matches!(err, DocentError::ModelResponseInvalid(_)));

        let err = decode_response(None, Some(vec![call("c", "echo", "[1, 2]")])).unwrap_err();
        assert!(matches!(err, DocentError::ModelResponseInvalid(_)));
    }

    #[test]
    fn test_decode_rejects_duplicate_ids_and_empty_response() {
        let err = decode_response(
            None,
            Some(vec![call("c", "echo", "{}"), call("c", "echo", "{}")]),
        )
        .unwrap_err();
        assert!(matches!(err, DocentError::ModelResponseInvalid(_)));

        assert!(decode_response(None, Some(vec![])).is_err());
    }

    #[test]
    fn test_encode_prepends_directive_only() {
        let request = ToolRequest::new(
            "call_1",
            "echo",
            json!({"text": "hello"}).as_object().cloned().unwrap(),
        );
        let mut transcript = Transcript::new();
        transcript.append_user("call echo with hello");
        transcript
            .append_exchange(
                Message::assistant("", vec![request.clone()]),
                vec![Message::tool_result(&request, "hello")],
            )
            .unwrap();

        let encoded = encode_transcript("Be brief.", &transcript).unwrap();
        assert_eq!(encoded.len(), 4);
        assert!(matches!(encoded[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(encoded[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(encoded[2], ChatCompletionRequestMessage::Assistant(_)));
        match &encoded[3] {
            ChatCompletionRequestMessage::Tool(tool) => assert_eq!(tool.tool_call_id, "call_1"),
            other => panic!("expected tool message, got {:?}", other),
        }

        let bare = encode_transcript("", &transcript).unwrap();
        assert_eq!(bare.len(), 3);
        assert_eq!(transcript.len(), 3);
    }
}
