//! Sentinel resolver.
//!
//! The schema adapter instructs the model to answer creation-time date
//! fields with the literal `"NOW"` instead of inventing a date. This pass
//! replaces that sentinel host-side: with today's date on initial
//! processing, and with the field's pre-refinement value during refinement
//! so a refinement never shifts an already-assigned date.

use chrono::NaiveDate;

use crate::models::{DatabaseSchema, FieldKind, StructuredContent};

/// The reserved value a model emits to request host-side date computation.
pub const NOW_SENTINEL: &str = "NOW";

/// Resolve sentinels after an initial processing call.
pub fn resolve_after_processing(content: &mut StructuredContent, schema: &DatabaseSchema) {
    resolve_at(content, schema, None, today());
}

/// Resolve sentinels after a refinement call, preserving pre-refinement
/// values where they exist.
pub fn resolve_after_refinement(
    content: &mut StructuredContent,
    schema: &DatabaseSchema,
    previous: &StructuredContent,
) {
    resolve_at(content, schema, Some(previous), today());
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn resolve_at(
    content: &mut StructuredContent,
    schema: &DatabaseSchema,
    previous: Option<&StructuredContent>,
    today: NaiveDate,
) {
    for (name, value) in content.fields.iter_mut() {
        let is_date_field = schema
            .get(name)
            .map(|f| f.kind == FieldKind::Date)
            .unwrap_or(false);
        if !is_date_field || value.as_str() != Some(NOW_SENTINEL) {
            continue;
        }

        let replacement = previous
            .and_then(|prev| prev.field(name))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        *value = serde_json::Value::String(replacement);
    }
}
