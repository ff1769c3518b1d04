//! `capstan skills`: browse the skill library without starting a session.

use std::path::Path;
use std::sync::Arc;

use capstan_agent::SkillController;
use capstan_core::skill::{CategoryRecord, SkillRecord};
use capstan_skills::DirectorySkillStore;

fn render_categories(categories: &[CategoryRecord]) -> String {
    if categories.is_empty() {
        return "No skill categories found.".into();
    }
    categories
        .iter()
        .map(|c| format!("  {:<16} {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_skills(skills: &[SkillRecord]) -> String {
    if skills.is_empty() {
        return "No skills found.".into();
    }
    skills
        .iter()
        .map(|s| format!("  {:<20} [{}] {}", s.name, s.category, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn run(
    config_path: Option<&Path>,
    category: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let controller = SkillController::new(Arc::new(DirectorySkillStore::new(
        config.context.skills_dirs.clone(),
    )));

    let output = match (category, search) {
        (Some(category), _) => render_skills(&controller.list_in_category(category)?),
        (None, Some(query)) => render_skills(&controller.search(query)?),
        (None, None) => render_categories(&controller.list_categories()?),
    };
    println!("{output}");
    Ok(())
}
