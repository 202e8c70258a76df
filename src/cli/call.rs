use anyhow::Result;

use crate::openai::BoxedToolCall;

/// Dispatch `args` to the tool published as `name`. `None` when no tool
/// has that name.
pub async fn run(tools: &[BoxedToolCall], name: &str, args: &str) -> Result<Option<String>> {
    let Some(tool) = tools.iter().find(|t| t.function_name() == name) else {
        return Ok(None);
    };
    tracing::info!("Calling tool {}", name);
    tool.call(args).await.map(Some)
}
