//! Target-store client: schema fetch and page creation against the Notion API.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::{ClipError, Result};
use crate::models::{DatabaseSchema, FieldKind, FieldSchema};

/// Protocol version sent with every request.
pub const NOTION_API_VERSION: &str = "2022-06-28";

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for one database connection.
#[derive(Debug)]
pub struct NotionClient {
    api_key: String,
    database_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl NotionClient {
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        if connection.api_key.is_empty() || connection.database_id.is_empty() {
            return Err(ClipError::Configuration(
                "Please provide a Notion API Key and Database ID.".to_string(),
            ));
        }
        Ok(Self {
            api_key: connection.api_key.clone(),
            database_id: connection.database_id.clone(),
            base_url: NOTION_API_BASE.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    /// Point the client at a different API base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the database's field schema.
    pub async fn fetch_schema(&self) -> Result<DatabaseSchema> {
        let url = format!("{}/databases/{}", self.base_url, self.database_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", NOTION_API_VERSION)
            .send()
            .await?;
        let data = handle_response(response).await?;
        Ok(parse_database_schema(&data["properties"]))
    }

    /// Create one page with the given property map and body blocks.
    /// Returns the created page's URL.
    pub async fn create_page(
        &self,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> Result<String> {
        let url = format!("{}/pages", self.base_url);
        let body = serde_json::json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
            "children": children,
        });
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", NOTION_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let data = handle_response(response).await?;
        data["url"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClipError::Transport {
                status: None,
                message: "Notion API Error: response contained no page URL".to_string(),
            })
    }
}

/// Decode a Notion response body, surfacing the API's own `message` on
/// failure and a truncated body excerpt when the body is not JSON at all.
async fn handle_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let data: Value = match serde_json::from_str(&text) {
        Ok(data) => data,
        Err(_) => {
            let detail: String = if text.chars().count() > 150 {
                format!("{}...", text.chars().take(150).collect::<String>())
            } else {
                text
            };
            return Err(ClipError::transport(
                status.as_u16(),
                format!(
                    "Could not connect to Notion. The server sent an invalid response. \
                     Status: {}. Details: {}",
                    status.as_u16(),
                    detail
                ),
            ));
        }
    };
    if !status.is_success() {
        let message = data["message"]
            .as_str()
            .map(|m| format!("Notion API Error: {}", m))
            .unwrap_or_else(|| format!("Notion API Error: Received status {}", status.as_u16()));
        return Err(ClipError::transport(status.as_u16(), message));
    }
    Ok(data)
}

/// Decode the `properties` object of a database response into a
/// [`DatabaseSchema`], collecting option labels for the choice kinds.
pub(crate) fn parse_database_schema(properties: &Value) -> DatabaseSchema {
    let mut schema = DatabaseSchema::new();
    let Some(object) = properties.as_object() else {
        return schema;
    };
    for (name, details) in object {
        let kind_str = details["type"].as_str().unwrap_or_default();
        let kind = FieldKind::from_notion(kind_str);
        let options = if kind.has_options() {
            details[kind_str]["options"]
                .as_array()
                .map(|opts| {
                    opts.iter()
                        .filter_map(|o| o["name"].as_str())
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        schema.insert(name.clone(), FieldSchema::with_options(kind, options));
    }
    schema
}

/// Rewrite a page URL into the app deep-link form shown on success.
pub fn deep_link(url: &str) -> String {
    url.replacen("https://www.", "notion://", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn database_properties_decode_with_options() {
        let properties = json!({
            "Name": { "id": "a", "type": "title", "title": {} },
            "Status": { "id": "b", "type": "select",
                        "select": { "options": [{ "name": "Open" }, { "name": "Done" }] } },
            "Tags": { "id": "c", "type": "multi_select",
                      "multi_select": { "options": [{ "name": "x" }] } },
            "Parent": { "id": "d", "type": "relation", "relation": {} },
            "Rollup": { "id": "e", "type": "rollup", "rollup": {} },
        });
        let schema = parse_database_schema(&properties);
        assert_eq!(schema["Name"].kind, FieldKind::Title);
        assert_eq!(schema["Status"].options, vec!["Open", "Done"]);
        assert_eq!(schema["Tags"].kind, FieldKind::MultiSelect);
        assert_eq!(schema["Parent"].kind, FieldKind::Relation);
        assert_eq!(schema["Rollup"].kind, FieldKind::Other("rollup".to_string()));
    }

    #[test]
    fn page_urls_rewrite_to_deep_links() {
        assert_eq!(
            deep_link("https://www.notion.so/workspace/Page-abc123"),
            "notion://notion.so/workspace/Page-abc123"
        );
    }

    #[test]
    fn empty_credentials_are_a_configuration_error() {
        let connection = ConnectionConfig {
            name: "x".into(),
            api_key: String::new(),
            database_id: "db".into(),
            system_prompt: None,
        };
        let err = NotionClient::new(&connection).unwrap_err();
        assert!(matches!(err, ClipError::Configuration(_)));
    }
}
