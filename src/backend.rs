//! AI generation backend abstraction and implementations.
//!
//! Defines the [`GenerationBackend`] trait and two concrete implementations
//! selected by the `ai.provider` config value:
//! - **[`GeminiBackend`]** — multimodal generation call; files travel as
//!   base64 `inline_data` parts and the generation schema is enforced by the
//!   API via `generationConfig.responseSchema`.
//! - **[`OpenRouterBackend`]** — chat-completion call; images travel as
//!   data-URL parts, other files as inline text, and the generation schema is
//!   embedded in the prompt text with `response_format` pinning the reply to
//!   a JSON object.
//!
//! Both return the model's raw response text; extraction and parsing of the
//! embedded JSON object happen above this layer, shared by both variants.
//!
//! # Capability divergence
//!
//! The multimodal backend consumes PDF natively but not OOXML, so office
//! documents are flattened to text host-side before inlining. The
//! chat-completion backend takes neither PDF nor OOXML as binary; those files
//! degrade to an inline note naming the file.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::Config;
use crate::error::{ClipError, Result};
use crate::extract;
use crate::input::InputFile;
use crate::models::StructuredContent;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// What the backend is being asked to do. The two variants phrase their
/// text and file context differently.
#[derive(Debug)]
pub enum RequestKind<'a> {
    /// First pass: turn the user's content into a structured object.
    Process { prompt: &'a str },
    /// Follow-up pass: apply an instruction to a previously generated object.
    Refine {
        instruction: &'a str,
        current: &'a StructuredContent,
    },
}

impl RequestKind<'_> {
    fn is_refinement(&self) -> bool {
        matches!(self, RequestKind::Refine { .. })
    }
}

/// One generation request: the task, the user's content, and the output
/// contract the response must satisfy.
#[derive(Debug)]
pub struct GenerationRequest<'a> {
    pub kind: RequestKind<'a>,
    pub user_text: &'a str,
    pub files: &'a [InputFile],
    pub schema: &'a Value,
}

/// A backend that can turn a [`GenerationRequest`] into raw response text.
#[async_trait]
pub trait GenerationBackend: Send + Sync + std::fmt::Debug {
    /// Provider identifier (e.g. `"gemini"`).
    fn provider_name(&self) -> &str;

    /// Send the request and return the model's raw response text. The text
    /// is expected to contain a JSON object but may be wrapped in prose or
    /// markdown fencing.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

/// Create the configured backend.
///
/// Fails with a configuration error before any network activity when the
/// provider's API key is missing.
pub fn create_backend(config: &Config) -> Result<Box<dyn GenerationBackend>> {
    let api_key = config.ai.resolve_api_key();
    match config.ai.provider.as_str() {
        "gemini" => {
            let api_key = api_key.ok_or_else(|| {
                ClipError::Configuration(
                    "Gemini API key is missing. Please provide one in the settings \
                     or ensure it's set in the environment."
                        .to_string(),
                )
            })?;
            Ok(Box::new(GeminiBackend::new(
                api_key,
                config.ai.model.clone(),
                config.ai.timeout_secs,
            )?))
        }
        "openrouter" => {
            let api_key = api_key.ok_or_else(|| {
                ClipError::Configuration(
                    "OpenRouter API key is missing. Please provide one in the settings \
                     or ensure it's set in the environment."
                        .to_string(),
                )
            })?;
            Ok(Box::new(OpenRouterBackend::new(
                api_key,
                config.ai.model.clone(),
                config.ai.timeout_secs,
            )?))
        }
        other => Err(ClipError::Configuration(format!(
            "Unknown AI provider: '{}'",
            other
        ))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn base64_of(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// The refinement task, phrased for the multimodal backend (the schema is
/// enforced out-of-band by `responseSchema`).
fn refinement_prompt(instruction: &str, current: &StructuredContent) -> String {
    let current_json =
        serde_json::to_string_pretty(current).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are an AI assistant refining a JSON object that was previously generated.\n\
         The user has provided the following instruction for refinement: \"{}\"\n\n\
         Here is the current JSON object to be refined:\n{}\n\n\
         Please apply the refinement instruction to the JSON object.\n\
         Your response MUST be ONLY the updated JSON object, adhering strictly to the \
         provided schema. Do not add any explanatory text or markdown formatting.",
        instruction, current_json
    )
}

/// The refinement task for the chat-completion backend, which has no schema
/// channel of its own: the schema rides along in the prompt text.
fn refinement_prompt_with_schema(
    instruction: &str,
    current: &StructuredContent,
    schema: &Value,
) -> String {
    let current_json =
        serde_json::to_string_pretty(current).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are an AI assistant refining a JSON object that was previously generated.\n\
         The user has provided the following instruction for refinement: \"{}\"\n\
         Here is the current JSON object to be refined:\n{}\n\
         Please apply the refinement instruction to the JSON object. Your response MUST \
         be ONLY the updated JSON object that is a valid JSON.\n\
         The JSON schema to follow is: {}",
        instruction, current_json, schema
    )
}

fn user_text_label(kind: &RequestKind<'_>) -> &'static str {
    if kind.is_refinement() {
        "For context, here is the original user-provided text that generated the JSON:\n\n"
    } else {
        "User-provided text:\n\n"
    }
}

// ============ Gemini backend ============

/// Multimodal generation backend.
#[derive(Debug)]
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    /// Point the backend at a different API base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Assemble the `contents.parts` array for a gemini request.
pub(crate) fn gemini_parts(request: &GenerationRequest<'_>) -> Vec<Value> {
    let lead = match &request.kind {
        RequestKind::Process { prompt } => prompt.to_string(),
        RequestKind::Refine {
            instruction,
            current,
        } => refinement_prompt(instruction, current),
    };
    let mut parts = vec![json!({ "text": lead })];
    if !request.user_text.is_empty() {
        parts.push(json!({
            "text": format!("{}{}", user_text_label(&request.kind), request.user_text)
        }));
    }
    for file in request.files {
        parts.push(gemini_file_part(file));
    }
    parts
}

/// One request part per attached file: images and PDF go as binary, plain
/// text is decoded and inlined, office documents are flattened to text.
pub(crate) fn gemini_file_part(file: &InputFile) -> Value {
    if file.is_image() || file.content_type == extract::MIME_PDF {
        return json!({
            "inline_data": {
                "mime_type": file.content_type,
                "data": base64_of(&file.bytes),
            }
        });
    }
    if file.is_text() {
        return json!({
            "text": format!(
                "Content from attached file \"{}\":\n\n{}",
                file.name,
                String::from_utf8_lossy(&file.bytes)
            )
        });
    }
    if extract::is_extractable(&file.content_type) {
        match extract::extract_text(&file.bytes, &file.content_type) {
            Ok(text) => {
                return json!({
                    "text": format!("Content from attached file \"{}\":\n\n{}", file.name, text)
                });
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "office text extraction failed");
            }
        }
    }
    json!({
        "text": format!("[Unreadable file: {} ({})]", file.name, file.content_type)
    })
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": gemini_parts(request) }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema,
            },
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| ClipError::Transport {
            status: Some(status.as_u16()),
            message: format!("Gemini API Error: invalid response body: {}", e),
        })?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .map(|m| format!("Gemini API Error: {}", m))
                .unwrap_or_else(|| format!("Gemini API Error: received status {}", status));
            return Err(ClipError::transport(status.as_u16(), message));
        }

        let parts = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| ClipError::Transport {
                status: Some(status.as_u16()),
                message: "Gemini API Error: response contained no candidates".to_string(),
            })?;
        Ok(parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""))
    }
}

// ============ OpenRouter backend ============

/// Chat-completion generation backend.
#[derive(Debug)]
pub struct OpenRouterBackend {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterBackend {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            base_url: OPENROUTER_API_BASE.to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    /// Point the backend at a different API base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Assemble the mixed-part user message for a chat-completion request.
pub(crate) fn openrouter_content(request: &GenerationRequest<'_>) -> Vec<Value> {
    let lead = match &request.kind {
        RequestKind::Process { prompt } => format!(
            "{}\n\nThe JSON schema to follow is: {}",
            prompt, request.schema
        ),
        RequestKind::Refine {
            instruction,
            current,
        } => refinement_prompt_with_schema(instruction, current, request.schema),
    };
    let refining = request.kind.is_refinement();
    let mut content = vec![json!({ "type": "text", "text": lead })];
    if !request.user_text.is_empty() {
        content.push(json!({
            "type": "text",
            "text": format!("{}{}", user_text_label(&request.kind), request.user_text)
        }));
    }
    for file in request.files {
        content.push(openrouter_file_part(file, refining));
    }
    content
}

/// One message part per attached file: images as data-URLs, plain text
/// inlined, everything else as a note naming the file.
pub(crate) fn openrouter_file_part(file: &InputFile, refining: bool) -> Value {
    if file.is_image() {
        let data_url = format!("data:{};base64,{}", file.content_type, base64_of(&file.bytes));
        return json!({ "type": "image_url", "image_url": { "url": data_url } });
    }
    if file.is_text() {
        let prefix = if refining { "For context, content" } else { "Content" };
        return json!({
            "type": "text",
            "text": format!(
                "\n\n{} from attached file \"{}\":\n\n{}",
                prefix,
                file.name,
                String::from_utf8_lossy(&file.bytes)
            )
        });
    }
    let text = if refining {
        format!(
            "\n\nFor context, an attached file named \"{}\" of type \"{}\" was also provided.",
            file.name, file.content_type
        )
    } else {
        format!(
            "\n\nAn attached file named \"{}\" of type \"{}\" was also provided for context.",
            file.name, file.content_type
        )
    };
    json!({ "type": "text", "text": text })
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    fn provider_name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": openrouter_content(request) }],
            "response_format": { "type": "json_object" },
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| ClipError::Transport {
            status: Some(status.as_u16()),
            message: format!("OpenRouter API Error: invalid response body: {}", e),
        })?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .map(|m| format!("OpenRouter API Error: {}", m))
                .unwrap_or_else(|| format!("OpenRouter API Error: received status {}", status));
            return Err(ClipError::transport(status.as_u16(), message));
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClipError::Transport {
                status: Some(status.as_u16()),
                message: "OpenRouter API Error: response contained no message content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageContent;

    fn text_file(name: &str, content: &str) -> InputFile {
        InputFile {
            name: name.to_string(),
            content_type: "text/plain".to_string(),
            bytes: content.as_bytes().to_vec(),
            public_url: None,
            preview: None,
        }
    }

    fn binary_file(name: &str, content_type: &str) -> InputFile {
        InputFile {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![1, 2, 3],
            public_url: None,
            preview: None,
        }
    }

    fn process_request<'a>(
        prompt: &'a str,
        user_text: &'a str,
        files: &'a [InputFile],
        schema: &'a Value,
    ) -> GenerationRequest<'a> {
        GenerationRequest {
            kind: RequestKind::Process { prompt },
            user_text,
            files,
            schema,
        }
    }

    #[test]
    fn gemini_inlines_text_and_forwards_binary() {
        let files = vec![
            text_file("notes.txt", "some notes"),
            binary_file("shot.png", "image/png"),
            binary_file("paper.pdf", "application/pdf"),
        ];
        let schema = json!({"type": "OBJECT"});
        let parts = gemini_parts(&process_request("do it", "hello", &files, &schema));

        assert_eq!(parts[0]["text"], json!("do it"));
        assert_eq!(parts[1]["text"], json!("User-provided text:\n\nhello"));
        let notes = parts[2]["text"].as_str().unwrap();
        assert!(notes.contains("notes.txt"));
        assert!(notes.contains("some notes"));
        assert_eq!(parts[3]["inline_data"]["mime_type"], json!("image/png"));
        assert_eq!(parts[4]["inline_data"]["mime_type"], json!("application/pdf"));
        assert_eq!(parts[4]["inline_data"]["data"], json!(base64_of(&[1, 2, 3])));
    }

    #[test]
    fn gemini_degrades_unextractable_office_files_to_a_note() {
        // Three bytes are not a ZIP archive, so extraction fails.
        let file = binary_file("deck.pptx", extract::MIME_PPTX);
        let part = gemini_file_part(&file);
        let text = part["text"].as_str().unwrap();
        assert!(text.contains("deck.pptx"));
        assert!(text.contains(extract::MIME_PPTX));
    }

    #[test]
    fn gemini_omits_empty_user_text() {
        let schema = json!({});
        let parts = gemini_parts(&process_request("p", "", &[], &schema));
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn openrouter_embeds_the_schema_in_the_prompt() {
        let schema = json!({"type": "OBJECT", "required": ["pageContent"]});
        let content = openrouter_content(&process_request("do it", "", &[], &schema));
        let lead = content[0]["text"].as_str().unwrap();
        assert!(lead.starts_with("do it"));
        assert!(lead.contains("The JSON schema to follow is:"));
        assert!(lead.contains("pageContent"));
    }

    #[test]
    fn openrouter_images_become_data_urls_and_binaries_become_notes() {
        let files = vec![
            binary_file("shot.png", "image/png"),
            binary_file("paper.pdf", "application/pdf"),
            text_file("notes.txt", "inline me"),
        ];
        let schema = json!({});
        let content = openrouter_content(&process_request("p", "", &files, &schema));

        let image_url = content[1]["image_url"]["url"].as_str().unwrap();
        assert!(image_url.starts_with("data:image/png;base64,"));

        let note = content[2]["text"].as_str().unwrap();
        assert!(note.contains("paper.pdf"));
        assert!(note.contains("was also provided for context"));

        let inline = content[3]["text"].as_str().unwrap();
        assert!(inline.contains("inline me"));
    }

    #[test]
    fn refinement_prompts_carry_instruction_and_current_object() {
        let current = StructuredContent {
            page_content: PageContent::default(),
            fields: serde_json::Map::from_iter([("Title".to_string(), json!("Old"))]),
        };
        let schema = json!({"type": "OBJECT"});
        let request = GenerationRequest {
            kind: RequestKind::Refine {
                instruction: "make the title snappier",
                current: &current,
            },
            user_text: "original text",
            files: &[],
            schema: &schema,
        };

        let gemini = gemini_parts(&request);
        let lead = gemini[0]["text"].as_str().unwrap();
        assert!(lead.contains("make the title snappier"));
        assert!(lead.contains("\"Title\": \"Old\""));
        // The multimodal variant relies on responseSchema, not prompt text.
        assert!(!lead.contains("The JSON schema to follow is:"));
        assert!(gemini[1]["text"]
            .as_str()
            .unwrap()
            .starts_with("For context, here is the original user-provided text"));

        let openrouter = openrouter_content(&request);
        let lead = openrouter[0]["text"].as_str().unwrap();
        assert!(lead.contains("make the title snappier"));
        assert!(lead.contains("The JSON schema to follow is:"));
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config: Config = toml::from_str(
            r#"
[ai]
provider = "gemini"
model = "gemini-2.5-flash"
"#,
        )
        .unwrap();
        // No key in config; make sure the environment doesn't provide one.
        std::env::remove_var("GEMINI_API_KEY");
        let err = create_backend(&config).unwrap_err();
        assert!(matches!(err, ClipError::Configuration(_)));
        assert!(err.to_string().contains("Gemini API key is missing"));
    }
}
