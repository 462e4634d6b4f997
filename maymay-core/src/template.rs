//! Template records from the catalogue service.

use serde::{Deserialize, Serialize};

/// A meme template: a display name and the image it points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Catalogue identifier.
    pub id: i64,
    /// Display name, also used to name exports.
    pub name: String,
    /// Image URL.
    pub url: String,
    /// Creation timestamp as reported by the catalogue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Records shown when the catalogue cannot be reached.
#[must_use]
pub fn placeholder_templates() -> Vec<Template> {
    (1..=5)
        .map(|n| Template {
            id: n,
            name: format!("Placeholder {n}"),
            url: format!("https://via.placeholder.com/400x400?text={n}"),
            created_at: None,
        })
        .collect()
}

/// Keep the templates whose name contains `query`, ignoring case and
/// surrounding whitespace. An empty query keeps everything.
#[must_use]
pub fn filter_templates(templates: Vec<Template>, query: &str) -> Vec<Template> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return templates;
    }
    templates
        .into_iter()
        .filter(|t| t.name.to_lowercase().contains(&needle))
        .collect()
}
