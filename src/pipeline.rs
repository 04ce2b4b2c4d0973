//! Processing and refinement orchestration.
//!
//! Each entry point runs one strictly sequential pass: build the generation
//! schema, call the backend, normalize the raw response, resolve sentinels.
//! A failing step surfaces its error and leaves the caller's prior content
//! untouched, so the user can edit inputs and resubmit.

use crate::backend::{GenerationBackend, GenerationRequest, RequestKind};
use crate::error::Result;
use crate::input::InputBundle;
use crate::models::{DatabaseSchema, StructuredContent};
use crate::normalize::normalize_response;
use crate::schema::build_generation_schema;
use crate::sentinel::{resolve_after_processing, resolve_after_refinement};

/// Turn the user's text and files into structured content.
pub async fn process_content(
    backend: &dyn GenerationBackend,
    prompt: &str,
    input: &InputBundle,
    schema: &DatabaseSchema,
) -> Result<StructuredContent> {
    let generation_schema = build_generation_schema(schema);
    tracing::debug!(
        provider = backend.provider_name(),
        files = input.files.len(),
        "processing content"
    );
    let request = GenerationRequest {
        kind: RequestKind::Process { prompt },
        user_text: &input.text,
        files: &input.files,
        schema: &generation_schema,
    };
    let raw = backend.generate(&request).await?;
    let mut content = normalize_response(&raw)?;
    resolve_after_processing(&mut content, schema);
    tracing::info!(fields = content.fields.len(), "content processed");
    Ok(content)
}

/// Apply one natural-language instruction to previously generated content.
///
/// Only one refinement may be in flight per session; callers hold the current
/// content by reference until the replacement arrives, which serializes
/// requests naturally. There is no cancellation — a second instruction waits
/// for the first to complete or fail.
pub async fn refine_content(
    backend: &dyn GenerationBackend,
    input: &InputBundle,
    schema: &DatabaseSchema,
    current: &StructuredContent,
    instruction: &str,
) -> Result<StructuredContent> {
    let generation_schema = build_generation_schema(schema);
    tracing::debug!(provider = backend.provider_name(), "refining content");
    let request = GenerationRequest {
        kind: RequestKind::Refine {
            instruction,
            current,
        },
        user_text: &input.text,
        files: &input.files,
        schema: &generation_schema,
    };
    let raw = backend.generate(&request).await?;
    let mut content = normalize_response(&raw)?;
    resolve_after_refinement(&mut content, schema, current);
    tracing::info!(fields = content.fields.len(), "content refined");
    Ok(content)
}
