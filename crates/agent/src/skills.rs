//! Skill controller: discovery reads and the enable state machine.
//!
//! A skill name moves from undiscovered to enabled exactly once per
//! session. Enabling queues the skill's instructions as a system
//! injection and folds the discovery exchanges that led to it.

use std::sync::Arc;

use capstan_core::error::SkillError;
use capstan_core::message::Message;
use capstan_core::skill::{CategoryRecord, SkillRecord, SkillStore};
use tracing::{debug, info};

use crate::state::ConversationState;
use crate::window::fold_discovery_noise;

#[derive(Clone)]
pub struct SkillController {
    store: Arc<dyn SkillStore>,
}

impl SkillController {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self { store }
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryRecord>, SkillError> {
        self.store.categories()
    }

    pub fn list_in_category(&self, category: &str) -> Result<Vec<SkillRecord>, SkillError> {
        self.store.skills_in(category)
    }

    /// Case-insensitive substring match on name or description.
    pub fn search(&self, query: &str) -> Result<Vec<SkillRecord>, SkillError> {
        let query = query.to_lowercase();
        Ok(self
            .store
            .skills()?
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&query)
                    || s.description.to_lowercase().contains(&query)
            })
            .collect())
    }

    /// Enable `name` for this session.
    ///
    /// Returns the notice the model sees. A skill missing from the store is
    /// `SkillError::NotFound`; see [`not_found_notice`].
    pub fn enable(&self, state: &mut ConversationState, name: &str) -> Result<String, SkillError> {
        if state.is_enabled(name) {
            return Ok(format!("Skill '{name}' is already enabled."));
        }

        let skill = self
            .store
            .find(name)?
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;

        state.queue_injection(Message::system(injection_text(&skill)));
        state.mark_enabled(name);

        let folded = fold_discovery_noise(state.conversation_mut());
        info!(skill = %name, category = %skill.category, folded, "Skill enabled");

        Ok(format!(
            "Skill '{name}' enabled successfully. Instructions have been added to your context."
        ))
    }
}

/// The system message that carries a skill into the context.
pub fn injection_text(skill: &SkillRecord) -> String {
    debug!(skill = %skill.name, bytes = skill.instructions.len(), "Building skill injection");
    format!(
        "[SYSTEM UPDATE]\nSkill Enabled: {}\nDescription: {}\nPath: {}\n\n### SKILL INSTRUCTIONS\n{}",
        skill.name,
        skill.description,
        skill.location.display(),
        skill.instructions
    )
}

pub fn not_found_notice(name: &str) -> String {
    format!("Error: Skill '{name}' not found.")
}
