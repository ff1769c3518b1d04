//! `capstan init`: scaffold a context directory for a new application.

use std::path::{Path, PathBuf};

use anyhow::Context;
use capstan_config::{AppConfig, ContextConfig, PROJECT_CONFIG_FILE};

const CONTEXT_PARTS: [&str; 4] = ["memory", "knowledge", "skills", "persona"];

const KNOWLEDGE_README: &str = "Add your .txt files here to be indexed by the knowledge base.\n\
\n\
Example:\n\
The capital of Mars is Utopia Planitia.\n";

const DEFAULT_PERSONA: &str = "You are a helpful and friendly assistant.\n\
You like to use emojis in your responses.\n";

const GENERAL_CATEGORY: &str = "---\n\
name: general\n\
description: General purpose helpers.\n\
---\n";

const HELLO_SKILL: &str = "---\n\
name: hello_world\n\
description: A simple skill to say hello.\n\
---\n\
\n\
# Hello World\n\
\n\
Instructions:\n\
1. Run `python {skill_path}/hello.py` to say hello to the user.\n";

const HELLO_SCRIPT: &str = "print('Hello from your custom skill!')\n";

/// Write `contents` to `path` unless it already exists. Returns whether it wrote.
fn write_if_absent(path: &Path, contents: &str) -> anyhow::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Create the context layout under `root`. Existing files are left untouched.
/// Returns the files that were created.
pub fn scaffold(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let context = root.join("context");
    for part in CONTEXT_PARTS {
        let dir = context.join(part);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // Relative to the application folder, where capstan.toml is picked up.
    let mut config = AppConfig::default();
    config.context = ContextConfig::scaffolded(Path::new(""));
    let config_toml = config.to_toml()?;

    let hello = context.join("skills").join("general").join("hello_world");
    let files: [(PathBuf, &str); 7] = [
        (context.join("knowledge").join("README.txt"), KNOWLEDGE_README),
        (context.join("persona").join("default.md"), DEFAULT_PERSONA),
        (context.join("memory").join("memory.json"), "{}"),
        (context.join("skills").join("general").join("CATEGORY.md"), GENERAL_CATEGORY),
        (hello.join("SKILL.md"), HELLO_SKILL),
        (hello.join("hello.py"), HELLO_SCRIPT),
        (root.join(PROJECT_CONFIG_FILE), config_toml.as_str()),
    ];

    let mut created = Vec::new();
    for (path, contents) in files {
        if write_if_absent(&path, contents)? {
            created.push(path);
        }
    }
    Ok(created)
}

pub fn run(path: &Path) -> anyhow::Result<()> {
    let root = std::path::absolute(path)
        .with_context(|| format!("Invalid application folder {}", path.display()))?;
    println!("Initializing Capstan in: {}", root.display());

    let created = scaffold(&root)?;
    for file in &created {
        println!("  Created {}", file.display());
    }
    if created.is_empty() {
        println!("  Everything already in place.");
    }

    println!();
    println!("Next steps:");
    println!("  1. Set an API key, e.g. DEEPSEEK_API_KEY or CAPSTAN_API_KEY.");
    println!("  2. Run `capstan chat` from {}.", root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_core::skill::SkillStore;
    use capstan_skills::DirectorySkillStore;

    #[test]
    fn scaffold_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let created = scaffold(dir.path()).unwrap();
        assert_eq!(created.len(), 7);

        for part in CONTEXT_PARTS {
            assert!(dir.path().join("context").join(part).is_dir());
        }
        let memory = std::fs::read_to_string(dir.path().join("context/memory/memory.json")).unwrap();
        assert_eq!(memory, "{}");

        let config = AppConfig::load_from(&dir.path().join(PROJECT_CONFIG_FILE)).unwrap();
        assert_eq!(config.context.skills_dirs, vec![PathBuf::from("context/skills")]);
        assert_eq!(
            config.context.knowledge_path,
            Some(PathBuf::from("context/knowledge"))
        );
    }

    #[test]
    fn sample_skill_is_discoverable() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path()).unwrap();

        let store = DirectorySkillStore::new(vec![dir.path().join("context/skills")]);
        let categories = store.categories().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "general");
        assert_eq!(categories[0].description, "General purpose helpers.");

        let skill = store.find("hello_world").unwrap().unwrap();
        assert_eq!(skill.description, "A simple skill to say hello.");
        assert!(skill.instructions.contains("hello_world/hello.py"));
    }

    #[test]
    fn rerun_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path()).unwrap();
        let persona = dir.path().join("context/persona/default.md");
        std::fs::write(&persona, "Custom persona").unwrap();

        let created = scaffold(dir.path()).unwrap();
        assert!(created.is_empty());
        assert_eq!(std::fs::read_to_string(&persona).unwrap(), "Custom persona");
    }
}
