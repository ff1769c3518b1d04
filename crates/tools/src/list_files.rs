//! List-files tool: name the entries of a directory.

use async_trait::async_trait;
use capstan_core::error::ToolError;
use capstan_core::tool::{Tool, ToolResult};

#[derive(Debug, Default)]
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory. Use this to discover available scripts or files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (default: current directory).",
                    "default": "."
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => return Ok(ToolResult::failure(format!("List Error: {e}"))),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(e) => return Ok(ToolResult::failure(format!("List Error: {e}"))),
            }
        }
        names.sort();

        Ok(ToolResult::success(names.join("\n")))
    }
}
