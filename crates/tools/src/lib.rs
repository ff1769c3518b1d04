//! Built-in primitive tools for Capstan.
//!
//! Primitives give the agent direct access to its host: run shell
//! commands, read files, and list directories. Skill and memory
//! capabilities live in the agent loop, not here.

pub mod list_files;
pub mod read_file;
pub mod run_command;

use capstan_config::ToolsConfig;
use capstan_core::tool::ToolRegistry;

pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;

/// Create the default registry: `run_command`, `read_file`, `list_files`,
/// in that order.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RunCommandTool::new(
        config.allowed_commands.clone(),
        config.command_timeout_secs,
    )));
    registry.register(Box::new(ReadFileTool));
    registry.register(Box::new(ListFilesTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_order() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(registry.names(), vec!["run_command", "read_file", "list_files"]);
    }

    #[test]
    fn declarations_are_object_schemas() {
        let registry = default_registry(&ToolsConfig::default());
        for decl in registry.declarations() {
            assert_eq!(decl.parameters["type"], "object", "{}", decl.name);
            assert!(decl.parameters["properties"].is_object(), "{}", decl.name);
            assert!(!decl.description.is_empty());
        }
    }
}
