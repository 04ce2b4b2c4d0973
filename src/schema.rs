//! Schema adapter: target database fields → generation schema.
//!
//! Converts a [`DatabaseSchema`] into the machine-checkable output contract
//! handed to the AI backend. Each field becomes a constraint with a guidance
//! string embedding the field name; relation fields are never emitted, and a
//! required `pageContent` substructure is always appended.

use serde_json::{json, Map, Value};

use crate::models::{DatabaseSchema, FieldKind};

/// Field names matching any of these (case-insensitive substring) are treated
/// as creation timestamps: the model is told to return the literal `"NOW"`.
pub const CREATION_DATE_KEYWORDS: &[&str] = &["created", "建立", "創建", "creation", "create date"];

/// Field names matching any of these are treated as deadlines: the model is
/// told to search the content for a due date.
pub const DUE_DATE_KEYWORDS: &[&str] = &["due", "deadline", "到期", "截止"];

/// How a date field's name should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInterpretation {
    CreationTimestamp,
    Deadline,
    Generic,
}

/// Ordered name-heuristic table. Evaluated top to bottom, first match wins.
const DATE_NAME_RULES: &[(&[&str], DateInterpretation)] = &[
    (CREATION_DATE_KEYWORDS, DateInterpretation::CreationTimestamp),
    (DUE_DATE_KEYWORDS, DateInterpretation::Deadline),
];

/// Classify a date field by its name.
pub fn interpret_date_name(name: &str) -> DateInterpretation {
    let lower = name.to_lowercase();
    for (keywords, interpretation) in DATE_NAME_RULES {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *interpretation;
        }
    }
    DateInterpretation::Generic
}

fn base_guidance(name: &str) -> String {
    format!(
        "This is a property of the target database named \"{}\". \
         Extract its value from the user-provided content based on the name's meaning.",
        name
    )
}

fn date_guidance(name: &str) -> String {
    match interpret_date_name(name) {
        DateInterpretation::CreationTimestamp => format!(
            "This is a creation-time field named \"{}\". \
             Ignore the user content and return the literal value \"NOW\".",
            name
        ),
        DateInterpretation::Deadline => format!(
            "This is a deadline field named \"{}\". \
             Search the user-provided content carefully for a due date or deadline \
             and format it as \"YYYY-MM-DD\".",
            name
        ),
        DateInterpretation::Generic => format!(
            "{} Look for the corresponding date in the content and format it as \
             \"YYYY-MM-DD\". Leave it empty if none is found.",
            base_guidance(name)
        ),
    }
}

/// Build the generation schema for one processing or refinement call.
///
/// The result is an object schema in the multimodal backend's wire format;
/// the chat-completion backend embeds the same object as text in its prompt.
pub fn build_generation_schema(schema: &DatabaseSchema) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for (name, field) in schema {
        let constraint = match &field.kind {
            FieldKind::Title
            | FieldKind::RichText
            | FieldKind::Url
            | FieldKind::Email
            | FieldKind::PhoneNumber => Some(json!({
                "type": "STRING",
                "description": base_guidance(name),
            })),
            FieldKind::Date => Some(json!({
                "type": "STRING",
                "description": date_guidance(name),
            })),
            FieldKind::Number => Some(json!({
                "type": "NUMBER",
                "description": base_guidance(name),
            })),
            FieldKind::Checkbox => Some(json!({
                "type": "BOOLEAN",
                "description": format!(
                    "{} Decide whether it should be true or false from the content.",
                    base_guidance(name)
                ),
            })),
            FieldKind::Select => Some(json!({
                "type": "STRING",
                "enum": field.options,
                "description": base_guidance(name),
            })),
            FieldKind::MultiSelect => Some(json!({
                "type": "ARRAY",
                "items": { "type": "STRING", "enum": field.options },
                "description": base_guidance(name),
            })),
            // The model cannot determine relations; never ask for them.
            FieldKind::Relation | FieldKind::Other(_) => None,
        };

        if let Some(constraint) = constraint {
            required.push(json!(name));
            properties.insert(name.clone(), constraint);
        }
    }

    properties.insert(
        "pageContent".to_string(),
        json!({
            "type": "OBJECT",
            "properties": {
                "summaryTitle": { "type": "STRING" },
                "summaryBody": { "type": "STRING" },
                "takeaways": { "type": "ARRAY", "items": { "type": "STRING" } },
            },
            "required": ["summaryTitle", "summaryBody", "takeaways"],
        }),
    );
    required.push(json!("pageContent"));

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldSchema;
    use serde_json::json;

    fn schema_of(fields: &[(&str, FieldSchema)]) -> DatabaseSchema {
        fields
            .iter()
            .map(|(name, fs)| (name.to_string(), fs.clone()))
            .collect()
    }

    #[test]
    fn relation_fields_are_never_emitted() {
        let db = schema_of(&[
            ("Title", FieldSchema::new(FieldKind::Title)),
            ("Project", FieldSchema::new(FieldKind::Relation)),
        ]);
        let out = build_generation_schema(&db);
        assert!(out["properties"].get("Project").is_none());
        assert!(out["properties"].get("Title").is_some());
        let required = out["required"].as_array().unwrap();
        assert!(!required.contains(&json!("Project")));
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        let db = schema_of(&[(
            "Rollup",
            FieldSchema::new(FieldKind::Other("rollup".into())),
        )]);
        let out = build_generation_schema(&db);
        assert!(out["properties"].get("Rollup").is_none());
    }

    #[test]
    fn page_content_substructure_is_always_required() {
        let out = build_generation_schema(&DatabaseSchema::new());
        let page = &out["properties"]["pageContent"];
        assert_eq!(page["type"], json!("OBJECT"));
        assert_eq!(
            page["required"],
            json!(["summaryTitle", "summaryBody", "takeaways"])
        );
        let required = out["required"].as_array().unwrap();
        assert!(required.contains(&json!("pageContent")));
    }

    #[test]
    fn every_emitted_field_is_required() {
        let db = schema_of(&[
            ("Name", FieldSchema::new(FieldKind::Title)),
            ("Done", FieldSchema::new(FieldKind::Checkbox)),
            ("Linked", FieldSchema::new(FieldKind::Relation)),
        ]);
        let out = build_generation_schema(&db);
        let required = out["required"].as_array().unwrap();
        assert!(required.contains(&json!("Name")));
        assert!(required.contains(&json!("Done")));
        assert!(required.contains(&json!("pageContent")));
        assert_eq!(required.len(), 3);
    }

    #[test]
    fn creation_date_names_request_the_sentinel() {
        let db = schema_of(&[("Created Date", FieldSchema::new(FieldKind::Date))]);
        let out = build_generation_schema(&db);
        let guidance = out["properties"]["Created Date"]["description"]
            .as_str()
            .unwrap();
        assert!(guidance.contains("\"NOW\""));
    }

    #[test]
    fn due_date_names_request_an_iso_date() {
        for name in ["Due", "Deadline", "截止日期"] {
            assert_eq!(interpret_date_name(name), DateInterpretation::Deadline);
        }
        let db = schema_of(&[("Due", FieldSchema::new(FieldKind::Date))]);
        let out = build_generation_schema(&db);
        let guidance = out["properties"]["Due"]["description"].as_str().unwrap();
        assert!(guidance.contains("YYYY-MM-DD"));
        assert!(!guidance.contains("\"NOW\""));
    }

    #[test]
    fn creation_rule_wins_over_due_rule() {
        // Ordered table: first match decides.
        assert_eq!(
            interpret_date_name("Created due date"),
            DateInterpretation::CreationTimestamp
        );
        assert_eq!(interpret_date_name("Published"), DateInterpretation::Generic);
    }

    #[test]
    fn choice_kinds_carry_their_option_labels() {
        let db = schema_of(&[
            (
                "Status",
                FieldSchema::with_options(FieldKind::Select, vec!["Open".into(), "Done".into()]),
            ),
            (
                "Tags",
                FieldSchema::with_options(FieldKind::MultiSelect, vec!["a".into(), "b".into()]),
            ),
        ]);
        let out = build_generation_schema(&db);
        assert_eq!(out["properties"]["Status"]["enum"], json!(["Open", "Done"]));
        assert_eq!(out["properties"]["Tags"]["type"], json!("ARRAY"));
        assert_eq!(
            out["properties"]["Tags"]["items"]["enum"],
            json!(["a", "b"])
        );
    }
}
