//! YAML front-matter for `SKILL.md` and `CATEGORY.md` documents.

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Frontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Split a document into front-matter and trimmed body.
///
/// A document that does not open with `---`, or never closes it, has no
/// front-matter and its whole text is the body. Front-matter that is not
/// valid YAML is read line by line as `key: value` pairs instead.
pub fn parse(content: &str) -> (Frontmatter, String) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content.strip_prefix("---") else {
        return (Frontmatter::default(), content.trim().to_string());
    };
    let Some((raw, body)) = rest.split_once("---") else {
        return (Frontmatter::default(), content.trim().to_string());
    };

    let meta = if raw.trim().is_empty() {
        Frontmatter::default()
    } else {
        match serde_yaml::from_str::<Frontmatter>(raw) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, "Front-matter is not valid YAML, reading key/value lines");
                parse_lines(raw)
            }
        }
    };

    (meta, body.trim().to_string())
}

fn parse_lines(raw: &str) -> Frontmatter {
    let mut meta = Frontmatter::default();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = Some(value.trim().to_string());
        match key.trim() {
            "name" => meta.name = value,
            "description" => meta.description = value,
            _ => {}
        }
    }
    meta
}
