//! Response normalizer: raw model output → [`StructuredContent`].
//!
//! Models wrap their JSON in prose or markdown fencing often enough that the
//! response is never parsed as-is. Instead the window between the first `{`
//! and the last `}` is extracted and parsed; the two failure cases get
//! distinct errors because they mean different things to the user (a missing
//! object usually signals a refusal, a malformed one a bad generation).

use crate::error::{ClipError, Result};
use crate::models::{PageContent, StructuredContent};

/// Extract and parse the JSON object embedded in a raw model response.
pub fn normalize_response(raw: &str) -> Result<StructuredContent> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e >= s => (s, e),
        _ => return Err(ClipError::NoJsonObject),
    };

    let window = &raw[start..=end];
    let mut value: serde_json::Value =
        serde_json::from_str(window).map_err(ClipError::InvalidResponse)?;

    let object = match value.as_object_mut() {
        Some(object) => object,
        None => return Err(ClipError::NoJsonObject),
    };

    // A missing or degenerate narrative must not sink the whole result; the
    // field values are still usable.
    let page_content = match object.remove("pageContent") {
        Some(serde_json::Value::Object(page)) => {
            serde_json::from_value(serde_json::Value::Object(page))
                .unwrap_or_else(|_| PageContent::fallback())
        }
        _ => PageContent::fallback(),
    };

    Ok(StructuredContent {
        page_content,
        fields: std::mem::take(object),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_is_extracted_from_markdown_fencing() {
        let raw = "Here is the result: ```json\n{\"a\":1}\n```";
        let content = normalize_response(raw).unwrap();
        assert_eq!(content.fields["a"], json!(1));
        // No pageContent in the response → synthesized default.
        assert_eq!(content.page_content, PageContent::fallback());
    }

    #[test]
    fn text_without_braces_is_a_distinct_error() {
        let err = normalize_response("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ClipError::NoJsonObject));
    }

    #[test]
    fn inverted_braces_are_a_distinct_error() {
        let err = normalize_response("} backwards {").unwrap_err();
        assert!(matches!(err, ClipError::NoJsonObject));
    }

    #[test]
    fn malformed_object_is_a_parse_error() {
        let err = normalize_response("{not json}").unwrap_err();
        assert!(matches!(err, ClipError::InvalidResponse(_)));
    }

    #[test]
    fn missing_page_content_synthesizes_the_default() {
        let content = normalize_response(r#"{"Title":"Notes"}"#).unwrap();
        assert_eq!(content.page_content.summary_title, "Summary (auto-generated)");
        assert!(content.page_content.summary_body.is_empty());
        assert!(content.page_content.takeaways.is_empty());
        assert_eq!(content.fields["Title"], json!("Notes"));
    }

    #[test]
    fn non_object_page_content_synthesizes_the_default() {
        let content = normalize_response(r#"{"pageContent":"oops"}"#).unwrap();
        assert_eq!(content.page_content, PageContent::fallback());
        assert!(content.fields.is_empty());
    }

    #[test]
    fn well_formed_page_content_is_kept() {
        let raw = r#"{"Title":"N","pageContent":{"summaryTitle":"S","summaryBody":"B","takeaways":["x","y"]}}"#;
        let content = normalize_response(raw).unwrap();
        assert_eq!(content.page_content.summary_title, "S");
        assert_eq!(content.page_content.takeaways, vec!["x", "y"]);
    }
}
