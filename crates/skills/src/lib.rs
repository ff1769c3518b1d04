//! Skill document store for Capstan.
//!
//! Skills are Markdown documents with YAML front-matter, grouped into
//! category directories. See [`DirectorySkillStore`] for the layout.

pub mod directory;
pub mod frontmatter;

pub use directory::{DirectorySkillStore, NO_DESCRIPTION, SKILL_PATH_PLACEHOLDER};
