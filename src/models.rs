//! Core data models used throughout the clipping pipeline.
//!
//! These types represent the target database's field schema and the
//! structured content that flows from the AI backend to the page builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of a single database field, as reported by the target store.
///
/// Unknown kinds decode as [`FieldKind::Other`] and are ignored by both the
/// schema adapter and the property builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Title,
    RichText,
    Url,
    Email,
    PhoneNumber,
    Date,
    Number,
    Checkbox,
    Select,
    MultiSelect,
    Relation,
    Other(String),
}

impl FieldKind {
    /// Map a Notion property type string onto a kind.
    pub fn from_notion(kind: &str) -> Self {
        match kind {
            "title" => FieldKind::Title,
            "rich_text" => FieldKind::RichText,
            "url" => FieldKind::Url,
            "email" => FieldKind::Email,
            "phone_number" => FieldKind::PhoneNumber,
            "date" => FieldKind::Date,
            "number" => FieldKind::Number,
            "checkbox" => FieldKind::Checkbox,
            "select" => FieldKind::Select,
            "multi_select" => FieldKind::MultiSelect,
            "relation" => FieldKind::Relation,
            other => FieldKind::Other(other.to_string()),
        }
    }

    /// True for the two choice kinds that carry an option list.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::MultiSelect)
    }
}

/// One field of the target database's schema.
///
/// `options` holds the ordered allowed option labels for choice kinds and is
/// empty for everything else. The kind is immutable once fetched.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub options: Vec<String>,
}

impl FieldSchema {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            options: Vec::new(),
        }
    }

    pub fn with_options(kind: FieldKind, options: Vec<String>) -> Self {
        Self { kind, options }
    }
}

/// The full field schema of one target database: field name → field schema.
pub type DatabaseSchema = BTreeMap<String, FieldSchema>;

/// The narrative part of a processed result: a summary plus takeaways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    #[serde(default)]
    pub summary_title: String,
    #[serde(default)]
    pub summary_body: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
}

impl PageContent {
    /// Placeholder used when the model produced no usable narrative
    /// substructure. The rest of the document is still publishable.
    pub fn fallback() -> Self {
        Self {
            summary_title: "Summary (auto-generated)".to_string(),
            summary_body: String::new(),
            takeaways: Vec::new(),
        }
    }
}

/// The working result of a processing or refinement call.
///
/// `fields` maps field names to the scalar or list values the model produced;
/// the narrative lives in `page_content`. Replaced wholesale after each AI
/// call or user edit, cleared on publish success or input reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredContent {
    #[serde(rename = "pageContent")]
    pub page_content: PageContent,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StructuredContent {
    /// The value produced for a field, if any.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_kind_known_and_unknown() {
        assert_eq!(FieldKind::from_notion("title"), FieldKind::Title);
        assert_eq!(FieldKind::from_notion("multi_select"), FieldKind::MultiSelect);
        assert_eq!(
            FieldKind::from_notion("rollup"),
            FieldKind::Other("rollup".to_string())
        );
    }

    #[test]
    fn structured_content_serde_flattens_fields() {
        let content = StructuredContent {
            page_content: PageContent {
                summary_title: "T".into(),
                summary_body: "B".into(),
                takeaways: vec!["a".into()],
            },
            fields: serde_json::Map::from_iter([("Title".to_string(), json!("Notes"))]),
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["Title"], json!("Notes"));
        assert_eq!(value["pageContent"]["summaryTitle"], json!("T"));

        let back: StructuredContent = serde_json::from_value(value).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn page_content_tolerates_partial_objects() {
        let pc: PageContent =
            serde_json::from_value(json!({"summaryTitle": "only title"})).unwrap();
        assert_eq!(pc.summary_title, "only title");
        assert!(pc.summary_body.is_empty());
        assert!(pc.takeaways.is_empty());
    }
}
