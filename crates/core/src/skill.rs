//! Skill store: read-only access to categorized instruction bundles.
//!
//! A skill is a named bundle of instructions the model can pull into its
//! context on demand. Stores are re-read on every query, so records are
//! snapshots and never cached for the life of a conversation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SkillError;

/// Metadata for a skill category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    pub description: String,
}

/// A fully loaded skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub name: String,
    pub description: String,
    pub category: String,

    /// Directory the skill lives in
    pub location: PathBuf,

    /// Instruction body, with `{skill_path}` already resolved to `location`
    pub instructions: String,
}

impl SkillRecord {
    /// Directory name of the skill (may differ from its declared name).
    pub fn dir_name(&self) -> String {
        self.location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub trait SkillStore: Send + Sync {
    /// Every category, in discovery order, de-duplicated by name.
    fn categories(&self) -> std::result::Result<Vec<CategoryRecord>, SkillError>;

    /// Every skill across all categories.
    fn skills(&self) -> std::result::Result<Vec<SkillRecord>, SkillError>;

    /// Skills whose category is exactly `category`.
    fn skills_in(&self, category: &str) -> std::result::Result<Vec<SkillRecord>, SkillError> {
        Ok(self
            .skills()?
            .into_iter()
            .filter(|s| s.category == category)
            .collect())
    }

    /// Look a skill up by declared name.
    fn find(&self, name: &str) -> std::result::Result<Option<SkillRecord>, SkillError> {
        Ok(self.skills()?.into_iter().find(|s| s.name == name))
    }
}
