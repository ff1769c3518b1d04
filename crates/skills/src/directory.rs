//! Directory-backed skill store.
//!
//! Layout, per configured root:
//!
//! ```text
//! <root>/<category>/CATEGORY.md          optional, front-matter `description`
//! <root>/<category>/<skill>/SKILL.md     front-matter `name`, `description`; body = instructions
//! ```
//!
//! Roots are scanned in order on every call. Missing roots are empty. A
//! category present in several roots is one category; its description comes
//! from the first root that has it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use capstan_core::error::SkillError;
use capstan_core::skill::{CategoryRecord, SkillRecord, SkillStore};
use tracing::{debug, warn};

use crate::frontmatter;

pub const CATEGORY_FILE: &str = "CATEGORY.md";
pub const SKILL_FILE: &str = "SKILL.md";
pub const NO_DESCRIPTION: &str = "No description.";

/// Placeholder in skill instructions replaced by the skill's directory.
pub const SKILL_PATH_PLACEHOLDER: &str = "{skill_path}";

#[derive(Debug, Clone)]
pub struct DirectorySkillStore {
    roots: Vec<PathBuf>,
}

impl DirectorySkillStore {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn category_description(dir: &Path) -> String {
        let path = dir.join(CATEGORY_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return NO_DESCRIPTION.to_string(),
        };
        frontmatter::parse(&content)
            .0
            .description
            .unwrap_or_else(|| NO_DESCRIPTION.to_string())
    }

    fn load_skill(category: &str, dir: &Path) -> Option<SkillRecord> {
        let path = dir.join(SKILL_FILE);
        if !path.is_file() {
            return None;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable skill");
                return None;
            }
        };

        let (meta, body) = frontmatter::parse(&content);
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let location = dir.display().to_string();

        Some(SkillRecord {
            name: meta.name.unwrap_or(dir_name),
            description: meta.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            category: category.to_string(),
            instructions: body.replace(SKILL_PATH_PLACEHOLDER, &location),
            location: dir.to_path_buf(),
        })
    }
}

/// Visible subdirectories of `dir`, sorted by name. Missing or unreadable
/// directories have none.
fn visible_subdirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, _)| !name.starts_with("__") && !name.starts_with('.'))
        .collect();
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    dirs
}

impl SkillStore for DirectorySkillStore {
    fn categories(&self) -> Result<Vec<CategoryRecord>, SkillError> {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for root in &self.roots {
            for (name, dir) in visible_subdirs(root) {
                if !seen.insert(name.clone()) {
                    continue;
                }
                categories.push(CategoryRecord {
                    description: Self::category_description(&dir),
                    name,
                });
            }
        }

        debug!(count = categories.len(), "Skill categories scanned");
        Ok(categories)
    }

    fn skills(&self) -> Result<Vec<SkillRecord>, SkillError> {
        let mut skills = Vec::new();
        for root in &self.roots {
            for (category, cat_dir) in visible_subdirs(root) {
                for (_, skill_dir) in visible_subdirs(&cat_dir) {
                    skills.extend(Self::load_skill(&category, &skill_dir));
                }
            }
        }
        Ok(skills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("math/CATEGORY.md"),
            "---\ndescription: Numbers and arithmetic\n---\n",
        );
        write(
            &root.join("math/calculator/SKILL.md"),
            "---\nname: calculator\ndescription: Evaluate expressions\n---\nRun python {skill_path}/calc.py\n",
        );
        write(
            &root.join("math/stats_dir/SKILL.md"),
            "---\nname: statistics\n---\nMean and median.",
        );
        write(&root.join("web/fetch/SKILL.md"), "Fetch a page.");
        write(&root.join("web/empty_dir/notes.txt"), "not a skill");
        write(&root.join("__pycache__/x/SKILL.md"), "hidden");
        write(&root.join(".git/y/SKILL.md"), "hidden");
        dir
    }

    #[test]
    fn categories_with_descriptions() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        let cats = store.categories().unwrap();
        assert_eq!(
            cats,
            vec![
                CategoryRecord {
                    name: "math".into(),
                    description: "Numbers and arithmetic".into()
                },
                CategoryRecord {
                    name: "web".into(),
                    description: NO_DESCRIPTION.into()
                },
            ]
        );
    }

    #[test]
    fn skills_in_category() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        let math = store.skills_in("math").unwrap();
        let names: Vec<&str> = math.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["calculator", "statistics"]);
        assert_eq!(math[1].dir_name(), "stats_dir");
        assert_eq!(math[1].description, NO_DESCRIPTION);
    }

    #[test]
    fn name_defaults_to_directory() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        let fetch = store.find("fetch").unwrap().unwrap();
        assert_eq!(fetch.category, "web");
        assert_eq!(fetch.instructions, "Fetch a page.");
    }

    #[test]
    fn skill_path_is_interpolated() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        let calc = store.find("calculator").unwrap().unwrap();
        let expected_dir = dir.path().join("math/calculator");
        assert_eq!(calc.location, expected_dir);
        assert_eq!(
            calc.instructions,
            format!("Run python {}/calc.py", expected_dir.display())
        );
    }

    #[test]
    fn find_uses_declared_name() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        assert!(store.find("statistics").unwrap().is_some());
        assert!(store.find("stats_dir").unwrap().is_none());
    }

    #[test]
    fn hidden_directories_are_ignored() {
        let dir = fixture();
        let store = DirectorySkillStore::new(vec![dir.path().to_path_buf()]);
        let names: Vec<String> = store.skills().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 3);
        assert!(!names.iter().any(|n| n == "x" || n == "y"));
    }

    #[test]
    fn categories_merge_across_roots() {
        let first = fixture();
        let second = tempfile::tempdir().unwrap();
        write(
            &second.path().join("math/CATEGORY.md"),
            "---\ndescription: Shadowed\n---\n",
        );
        write(
            &second.path().join("math/algebra/SKILL.md"),
            "---\nname: algebra\n---\nSolve.",
        );

        let store = DirectorySkillStore::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let cats = store.categories().unwrap();
        assert_eq!(cats.iter().filter(|c| c.name == "math").count(), 1);
        assert_eq!(cats[0].description, "Numbers and arithmetic");

        let math: Vec<String> = store
            .skills_in("math")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(math, vec!["calculator", "statistics", "algebra"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let store = DirectorySkillStore::new(vec![PathBuf::from("/no/such/skills")]);
        assert!(store.categories().unwrap().is_empty());
        assert!(store.skills().unwrap().is_empty());
    }
}
