//! File read tool — read file contents with path validation.

use async_trait::async_trait;

use ferrite_core::error::ToolError;
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext};

use crate::path_guard;

pub struct FileReadTool {
    forbidden_paths: Vec<String>,
}

impl FileReadTool {
    pub fn new(forbidden_paths: Vec<String>) -> Self {
        Self { forbidden_paths }
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new(path_guard::default_forbidden())
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("path")
                .describe("The file path to read")
                .required()
                .min(1.0),
        ]
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        if let Err(reason) = path_guard::check_path(path, &self.forbidden_paths) {
            return Err(ToolError::NotAllowed {
                tool_name: "file_read".into(),
                reason,
            });
        }

        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_read".into(),
                reason: format!("Failed to read '{path}': {e}"),
            })
    }
}
