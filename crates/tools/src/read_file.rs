//! Read-file tool: return a file's contents as text.

use std::io::ErrorKind;

use async_trait::async_trait;
use capstan_core::error::ToolError;
use capstan_core::tool::{Tool, ToolResult};

#[derive(Debug, Default)]
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Use this to inspect code, logs, or data."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolResult::success(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ToolResult::failure(format!(
                "Error: File '{path}' not found."
            ))),
            Err(e) => Ok(ToolResult::failure(format!("Read Error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let schema = ReadFileTool.parameters_schema();
        assert_eq!(ReadFileTool.name(), "read_file");
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert!(schema["properties"]["path"].is_object());
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.txt");
        std::fs::write(&file_path, "Hello, world!\n").unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({ "path": file_path.to_str().unwrap() }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Hello, world!\n");
    }

    #[tokio::test]
    async fn missing_file_is_a_textual_error() {
        let result = ReadFileTool
            .execute(serde_json::json!({ "path": "/definitely/not/here.txt" }))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.output,
            "Error: File '/definitely/not/here.txt' not found."
        );
    }

    #[tokio::test]
    async fn directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReadFileTool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("Read Error: "));
    }

    #[tokio::test]
    async fn missing_argument() {
        let result = ReadFileTool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
