//! Tool registry
//!
//! Holds the closed set of tools the model may invoke and dispatches calls
//! to the matching handler. Registration order is preserved because some
//! models rank candidates by position in the schema.

use crate::tools::context::TurnContext;
use crate::tools::schema::{ToolArgs, ToolDecl};
use crate::{NatterError, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// A registered tool handler. Receives validated arguments and the active
/// turn context; side effects are entirely the handler's business.
pub type ToolHandler =
    Arc<dyn Fn(ToolArgs, TurnContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct RegisteredTool {
    decl: ToolDecl,
    handler: ToolHandler,
}

/// Registry of callable tools. Read-only after initialization; share it
/// across sessions behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register<F, Fut>(&mut self, decl: ToolDecl, handler: F) -> Result<()>
    where
        F: Fn(ToolArgs, TurnContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.index.contains_key(&decl.name) {
            return Err(NatterError::DuplicateTool(decl.name.clone()));
        }

        debug!(tool = %decl.name, "registered tool");
        self.index.insert(decl.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            decl,
            handler: Arc::new(move |args, cx| Box::pin(handler(args, cx))),
        });
        Ok(())
    }

    /// Schema entries for structured calling, in registration order
    pub fn list_tools(&self) -> Vec<serde_json::Value> {
        self.tools.iter().map(|t| t.decl.schema()).collect()
    }

    /// Whether a tool with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch one tool call against the active turn context.
    ///
    /// Fails with `UnknownTool` for unregistered names and `InvalidArgument`
    /// when an argument does not coerce to its declared type.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        context: &TurnContext,
    ) -> Result<()> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| NatterError::UnknownTool(name.to_string()))?;

        let args = tool.decl.coerce_args(arguments)?;
        debug!(tool = %name, ?arguments, "dispatching tool call");
        (tool.handler)(args, context.clone())
            .await
            .map_err(|e| match e {
                e @ (NatterError::InvalidArgument { .. } | NatterError::ToolFailed { .. }) => e,
                other => NatterError::ToolFailed {
                    tool: name.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}
