//! Base system prompt and persona loading.

use std::path::Path;

use capstan_core::skill::CategoryRecord;
use tracing::{debug, warn};

/// Load persona text from a file, or from every `.md`/`.txt` file of a
/// directory in name order, each under its own heading. Missing paths give
/// an empty persona.
pub fn load_persona(path: &Path) -> String {
    if path.is_file() {
        return match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read persona");
                String::new()
            }
        };
    }

    let Ok(entries) = std::fs::read_dir(path) else {
        return String::new();
    };

    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"))
        })
        .collect();
    files.sort();

    let mut persona = String::new();
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::read_to_string(&file) {
            Ok(text) => {
                persona.push_str(&format!("\n\n--- Persona: {name} ---\n"));
                persona.push_str(&text);
            }
            Err(e) => warn!(path = %file.display(), error = %e, "Skipping unreadable persona file"),
        }
    }

    debug!(path = %path.display(), bytes = persona.len(), "Persona loaded");
    persona
}

/// Assembles the first system message of a session.
#[derive(Debug, Default)]
pub struct SystemPromptBuilder {
    categories: Vec<CategoryRecord>,
    persona: String,
    primitives: Vec<String>,
    memory: bool,
    knowledge: bool,
}

impl SystemPromptBuilder {
    pub fn new(categories: Vec<CategoryRecord>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Names of the registered primitive tools.
    pub fn primitives<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primitives = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn memory(mut self, enabled: bool) -> Self {
        self.memory = enabled;
        self
    }

    pub fn knowledge(mut self, enabled: bool) -> Self {
        self.knowledge = enabled;
        self
    }

    pub fn build(&self) -> String {
        let mut prompt = String::from("You are a helpful AI assistant.\n");
        if !self.persona.trim().is_empty() {
            prompt.push_str(self.persona.trim_end());
            prompt.push('\n');
        }
        prompt.push_str(
            "You operate in a potentially sandboxed environment where you can execute code.\n\n",
        );

        prompt.push_str("### Tool Capabilities\n");
        if !self.primitives.is_empty() {
            let names: Vec<String> = self.primitives.iter().map(|n| format!("`{n}`")).collect();
            prompt.push_str(&format!("1. **Primitive Tools**: {}\n", names.join(", ")));
        }
        prompt.push_str("2. **Skill Discovery**:\n");
        prompt.push_str("   - Your skills are organized by CATEGORY.\n");
        prompt.push_str("   - Available Categories:\n");
        if self.categories.is_empty() {
            prompt.push_str("   (none)\n");
        }
        for category in &self.categories {
            prompt.push_str(&format!("   - {}: {}\n", category.name, category.description));
        }
        prompt.push_str("   - To see skills in a category, use: `list_skills(category=\"name\")`\n");
        prompt.push_str("   - To find a skill by keyword, use: `search_skills(query=\"text\")`\n");
        prompt.push_str(
            "   - To use a skill, you MUST enable it first: `enable_skill(skill_name=\"name\")`\n",
        );
        if self.knowledge {
            prompt.push_str(
                "3. **Knowledge Base**: use `consult_knowledge_base(query=\"...\")` for facts from the provided documents.\n",
            );
        }

        prompt.push_str(
            "\n### Workflow\n\
             1. User asks a question.\n\
             2. If you need a specific capability (e.g. Math), check the matching category with `list_skills`.\n\
             3. Read the descriptions. If one matches, `enable_skill` for it.\n\
             4. Once enabled, the system will inject the specific instructions (which often tell you to run a script).\n\
             5. Follow those instructions.\n",
        );

        if self.memory {
            prompt.push_str(
                "\n### Memory\n\
                 You have a long-term memory.\n\
                 - Use `remember(key=\"topic\", content=\"info\")` to save important facts.\n\
                 - Use `recall(query=\"topic\")` to retrieve information.\n\
                 - ALWAYS check your memory (`recall`) if the user asks something that might be stored from a previous session.\n",
            );
        }

        prompt.push_str(
            "\nAlways verify the output of your commands.\n\n\
             ### Response Guidelines\n\
             - Answer the user's question directly and concisely.\n\
             - Do NOT mention what skills or tools you are using or have available, unless the user explicitly asks about them.\n\
             - Do NOT list other things you can do at the end of your response.\n",
        );

        prompt
    }
}
