//! File write tool — write or create files with path validation.

use async_trait::async_trait;

use ferrite_core::error::ToolError;
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext};

use crate::path_guard;

pub struct FileWriteTool {
    forbidden_paths: Vec<String>,
}

impl FileWriteTool {
    pub fn new(forbidden_paths: Vec<String>) -> Self {
        Self { forbidden_paths }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new(path_guard::default_forbidden())
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("path")
                .describe("The file path to write to")
                .required()
                .min(1.0),
            ParamSpec::string("content")
                .describe("The content to write")
                .required(),
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
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        if let Err(reason) = path_guard::check_path(path, &self.forbidden_paths) {
            return Err(ToolError::NotAllowed {
                tool_name: "file_write".into(),
                reason,
            });
        }

        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "file_write".into(),
                    reason: format!("Failed to create directory: {e}"),
                })?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_write".into(),
                reason: format!("Failed to write '{path}': {e}"),
            })?;

        Ok(format!("Wrote {} bytes to {path}", content.len()))
    }
}
