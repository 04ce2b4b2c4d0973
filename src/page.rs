//! Document builder: structured content → target-store page parts.
//!
//! Two independent, pure sub-builders: [`build_properties`] produces the
//! page's property map and [`build_page_blocks`] its body block list. Neither
//! touches the network, so both can be re-run freely over the same inputs.

use serde_json::{json, Map, Value};

use crate::input::InputFile;
use crate::models::{DatabaseSchema, FieldKind, StructuredContent};

/// Hard per-rich-text length limit imposed by the target store.
pub const MAX_RICH_TEXT_LEN: usize = 2000;

// ============ Property builder ============

/// Build the page property map from the structured content.
///
/// Fields absent from the content, or null, are skipped entirely rather than
/// emitted empty. Relation fields are always skipped.
pub fn build_properties(content: &StructuredContent, schema: &DatabaseSchema) -> Map<String, Value> {
    let mut properties = Map::new();
    for (name, field) in schema {
        let value = match content.field(name) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        let property = match &field.kind {
            FieldKind::Title => non_empty_str(value)
                .map(|s| json!({ "title": [{ "text": { "content": s } }] })),
            FieldKind::RichText => non_empty_str(value)
                .map(|s| json!({ "rich_text": [{ "text": { "content": s } }] })),
            FieldKind::Url => value.as_str().map(|s| {
                if s.is_empty() {
                    json!({ "url": null })
                } else {
                    json!({ "url": s })
                }
            }),
            FieldKind::Email => non_empty_str(value).map(|s| json!({ "email": s })),
            FieldKind::PhoneNumber => non_empty_str(value).map(|s| json!({ "phone_number": s })),
            FieldKind::Number => coerce_number(value).map(|n| json!({ "number": n })),
            FieldKind::Checkbox => Some(json!({ "checkbox": is_truthy(value) })),
            FieldKind::Select => non_empty_str(value).map(|s| json!({ "select": { "name": s } })),
            FieldKind::MultiSelect => match value.as_array() {
                Some(labels) if !labels.is_empty() => {
                    let names: Vec<Value> = labels
                        .iter()
                        .filter_map(|l| l.as_str())
                        .map(|l| json!({ "name": l }))
                        .collect();
                    (!names.is_empty()).then(|| json!({ "multi_select": names }))
                }
                _ => None,
            },
            FieldKind::Date => Some(match non_empty_str(value) {
                Some(s) => json!({ "date": { "start": s } }),
                None => json!({ "date": null }),
            }),
            FieldKind::Relation | FieldKind::Other(_) => None,
        };
        if let Some(property) = property {
            properties.insert(name.clone(), property);
        }
    }
    properties
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// JavaScript-style numeric coercion: numbers pass through, numeric strings
/// parse, everything else is not a valid number and the field is skipped.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

// ============ Body builder ============

/// Split text into chunks no longer than [`MAX_RICH_TEXT_LEN`] characters,
/// in order. Splits on character boundaries, never inside a code point.
pub fn chunk_rich_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_RICH_TEXT_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn heading_block(text: &str) -> Value {
    json!({ "object": "block", "type": "heading_2", "heading_2": { "rich_text": rich_text(text) } })
}

fn divider_block() -> Value {
    json!({ "object": "block", "type": "divider", "divider": {} })
}

fn paragraph_blocks(text: &str) -> Vec<Value> {
    chunk_rich_text(text)
        .into_iter()
        .map(|chunk| {
            json!({ "object": "block", "type": "paragraph", "paragraph": { "rich_text": rich_text(&chunk) } })
        })
        .collect()
}

fn file_caption(file: &InputFile) -> Value {
    rich_text(&format!(
        "{} · {} · {}",
        file.name,
        format_file_size(file.size() as u64),
        file.content_type
    ))
}

fn file_block(file: &InputFile, url: &str) -> Value {
    if file.is_image() {
        json!({ "object": "block", "type": "image", "image": {
            "type": "external", "external": { "url": url }, "caption": file_caption(file) } })
    } else if file.content_type == crate::extract::MIME_PDF {
        json!({ "object": "block", "type": "embed", "embed": {
            "url": url, "caption": file_caption(file) } })
    } else {
        json!({ "object": "block", "type": "file", "file": {
            "type": "external", "external": { "url": url },
            "name": file.name, "caption": file_caption(file) } })
    }
}

fn failed_upload_block(file: &InputFile) -> Value {
    json!({ "object": "block", "type": "callout", "callout": {
        "rich_text": rich_text(&format!("Analyzed file (upload failed): {}", file.name)),
        "icon": { "emoji": "📎" } } })
}

/// Build the ordered body block list for the page.
///
/// The file section iterates `files` in their original input order; that
/// ordering is part of the rendered document's contract.
pub fn build_page_blocks(
    content: &StructuredContent,
    original_text: &str,
    files: &[InputFile],
) -> Vec<Value> {
    let page = &content.page_content;
    let summary_title = if page.summary_title.is_empty() {
        "Summary"
    } else {
        &page.summary_title
    };

    let mut children = vec![heading_block(summary_title)];
    children.extend(paragraph_blocks(&page.summary_body));
    children.push(divider_block());
    children.push(heading_block("Key Takeaways"));
    for item in &page.takeaways {
        children.push(json!({ "object": "block", "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": rich_text(item) } }));
    }

    if !original_text.is_empty() {
        children.push(divider_block());
        children.push(heading_block("Original Text"));
        children.extend(paragraph_blocks(original_text));
    }

    if !files.is_empty() {
        children.push(divider_block());
        children.push(heading_block("Original Files"));
        for file in files {
            match file.public_url.as_deref() {
                Some(url) => children.push(file_block(file, url)),
                None => children.push(failed_upload_block(file)),
            }
        }
    }

    children
}

/// Human-readable file size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB"];
    let exponent = (((bytes as f64).ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{:.2}", scaled);
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rounded, UNITS[exponent])
}
