//! Capabilities the loop answers itself: skill discovery and enablement,
//! long-term memory, and the knowledge base.

use capstan_core::knowledge::KnowledgeChunk;
use capstan_core::memory::MemoryRecord;
use capstan_core::provider::CapabilityDeclaration;
use capstan_core::skill::SkillRecord;
use serde_json::json;

pub const LIST_SKILLS: &str = "list_skills";
pub const SEARCH_SKILLS: &str = "search_skills";
pub const ENABLE_SKILL: &str = "enable_skill";
pub const REMEMBER: &str = "remember";
pub const RECALL: &str = "recall";
pub const CONSULT_KNOWLEDGE_BASE: &str = "consult_knowledge_base";

/// `list_skills`, `search_skills`, `enable_skill`, in that order.
pub fn skill_declarations() -> Vec<CapabilityDeclaration> {
    vec![
        CapabilityDeclaration::new(
            LIST_SKILLS,
            "List available skills in a category.",
            json!({
                "type": "object",
                "properties": {"category": {"type": "string"}},
                "required": ["category"]
            }),
        ),
        CapabilityDeclaration::new(
            SEARCH_SKILLS,
            "Search all skills by name or description.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to look for in skill names and descriptions."}
                },
                "required": ["query"]
            }),
        ),
        CapabilityDeclaration::new(
            ENABLE_SKILL,
            "Enable a specific skill (load its instructions).",
            json!({
                "type": "object",
                "properties": {"skill_name": {"type": "string"}},
                "required": ["skill_name"]
            }),
        ),
    ]
}

/// `remember` and `recall`.
pub fn memory_declarations() -> Vec<CapabilityDeclaration> {
    vec![
        CapabilityDeclaration::new(
            REMEMBER,
            "Store a piece of information in long-term memory.",
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "The topic or key to store under."},
                    "content": {"type": "string", "description": "The information to store."}
                },
                "required": ["key", "content"]
            }),
        ),
        CapabilityDeclaration::new(
            RECALL,
            "Search long-term memory for information.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The topic or keyword to search for."}
                },
                "required": ["query"]
            }),
        ),
    ]
}

pub fn knowledge_declaration() -> CapabilityDeclaration {
    CapabilityDeclaration::new(
        CONSULT_KNOWLEDGE_BASE,
        "Consult the knowledge base to answer questions using provided text files. Use this when the user asks about facts that might be in the knowledge base.",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The specific query to search for in the knowledge base."}
            },
            "required": ["query"]
        }),
    )
}

/// Pretty JSON array of `{name, description, path_name}`.
pub fn render_skill_listing(skills: &[SkillRecord]) -> String {
    let entries: Vec<_> = skills
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "description": s.description,
                "path_name": s.dir_name(),
            })
        })
        .collect();
    pretty(&entries)
}

/// Pretty JSON array of `{name, description, category}`.
pub fn render_skill_search(skills: &[SkillRecord]) -> String {
    let entries: Vec<_> = skills
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "description": s.description,
                "category": s.category,
            })
        })
        .collect();
    pretty(&entries)
}

fn pretty(entries: &[serde_json::Value]) -> String {
    serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".into())
}

pub fn render_remembered(key: &str, content: &str) -> String {
    format!("Memory stored: [{key}] = {content}")
}

pub fn render_recall(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return "No relevant memories found.".into();
    }
    records
        .iter()
        .map(|r| format!("- {}: {}", r.key, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_knowledge(chunks: &[KnowledgeChunk]) -> String {
    if chunks.is_empty() {
        return "No relevant information found in the knowledge base.".into();
    }
    let mut out = String::from("Found relevant info:\n");
    for chunk in chunks {
        out.push_str(&format!("- [{}]: {}\n", chunk.source, chunk.content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn skill() -> SkillRecord {
        SkillRecord {
            name: "calculator".into(),
            description: "Evaluate expressions".into(),
            category: "math".into(),
            location: PathBuf::from("/skills/math/calc_dir"),
            instructions: String::new(),
        }
    }

    #[test]
    fn declaration_order() {
        let names: Vec<String> = skill_declarations()
            .into_iter()
            .chain(memory_declarations())
            .chain([knowledge_declaration()])
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "list_skills",
                "search_skills",
                "enable_skill",
                "remember",
                "recall",
                "consult_knowledge_base"
            ]
        );
    }

    #[test]
    fn listing_is_pretty_json_with_dir_name() {
        let out = render_skill_listing(&[skill()]);
        assert_eq!(
            out,
            "[\n  {\n    \"name\": \"calculator\",\n    \"description\": \"Evaluate expressions\",\n    \"path_name\": \"calc_dir\"\n  }\n]"
        );
        assert_eq!(render_skill_listing(&[]), "[]");
    }

    #[test]
    fn search_results_carry_category() {
        let out: serde_json::Value = serde_json::from_str(&render_skill_search(&[skill()])).unwrap();
        assert_eq!(out[0]["category"], "math");
    }

    #[test]
    fn recall_rendering() {
        assert_eq!(render_recall(&[]), "No relevant memories found.");
        let out = render_recall(&[
            MemoryRecord::new("name", "Chen"),
            MemoryRecord::new("city", "Lisbon"),
        ]);
        assert_eq!(out, "- name: Chen\n- city: Lisbon");
        assert_eq!(render_remembered("name", "Chen"), "Memory stored: [name] = Chen");
    }

    #[test]
    fn knowledge_rendering() {
        assert_eq!(
            render_knowledge(&[]),
            "No relevant information found in the knowledge base."
        );
        let out = render_knowledge(&[KnowledgeChunk {
            source: "mars.txt".into(),
            content: "The capital of Mars is Utopia Planitia.".into(),
            score: 2,
        }]);
        assert_eq!(
            out,
            "Found relevant info:\n- [mars.txt]: The capital of Mars is Utopia Planitia.\n"
        );
    }
}
