//! Tool dispatch: resolve requests against the registry and run them.
//!
//! Dispatch never fails as a whole. Unknown tools and tool failures become
//! ordinary tool-result content so the model can react on its next call.

use super::registry::{Tool, ToolError, ToolLookup, ToolRegistry};
use super::transcript::{Message, ToolRequest};
use crate::error::DocentError;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Content returned for a request naming an unregistered tool.
pub const INVALID_TOOL_MESSAGE: &str = "Invalid tool called. Please retry";

/// Runs batches of tool requests against a closed registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    parallel: bool,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    /// Create a dispatcher that runs a batch concurrently, without a timeout.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            parallel: true,
            timeout: None,
        }
    }

    /// Run requests of a batch concurrently (`true`) or one after another.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Bound each tool invocation.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `requests` and return one tool-result message per request,
    /// in request order.
    #[instrument(skip_all, fields(count = requests.len(), parallel = self.parallel))]
    pub async fn dispatch(&self, requests: &[ToolRequest]) -> Vec<Message> {
        if self.parallel {
            join_all(requests.iter().map(|request| self.execute(request))).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.execute(request).await);
            }
            results
        }
    }

    async fn execute(&self, request: &ToolRequest) -> Message {
        let content = match self.registry.lookup(&request.tool_name) {
            ToolLookup::NotFound => {
                warn!("{}", DocentError::UnknownTool(request.tool_name.clone()));
                INVALID_TOOL_MESSAGE.to_string()
            }
            ToolLookup::Found(tool) => {
                info!("Calling tool: {}", request);
                match self.invoke(tool.as_ref(), request).await {
                    Ok(output) => {
                        debug!("Tool {} returned {} bytes", request.tool_name, output.len());
                        output
                    }
                    Err(e) => {
                        warn!(
                            "{}",
                            DocentError::ToolExecution {
                                tool: request.tool_name.clone(),
                                reason: e.to_string(),
                            }
                        );
                        format!("Tool error: {}", e)
                    }
                }
            }
        };

        Message::tool_result(request, content)
    }

    async fn invoke(&self, tool: &dyn Tool, request: &ToolRequest) -> Result<String, ToolError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, tool.invoke(&request.arguments))
                .await
                .map_err(|_| ToolError::Timeout(limit.as_secs()))?,
            None => tool.invoke(&request.arguments).await,
        }
    }
}
