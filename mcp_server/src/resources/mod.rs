//! MCP resources for read-only access to Open Source Cloud state.
//!
//! URI schemes:
//! - eyevinnosc://catalog/myactiveservices - Active service subscriptions
//! - eyevinnosc://pipelines/{name} - Description of a VOD pipeline
//! - local://videos/myvideos - Videos on local disk

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const ACTIVE_SERVICES_URI: &str = "eyevinnosc://catalog/myactiveservices";
pub const PIPELINE_URI_TEMPLATE: &str = "eyevinnosc://pipelines/{name}";
pub const LOCAL_VIDEOS_URI: &str = "local://videos/myvideos";

/// Active service resource representation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveServiceResource {
    /// Catalog id of the subscribed service
    pub service_id: String,
}

/// Resource info for listing
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceInfo {
    /// Resource URI
    pub uri: String,
    /// Resource name
    pub name: String,
    /// Resource description
    pub description: String,
    /// MIME type
    pub mime_type: String,
}

/// Parameterised resource for listing
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceTemplateInfo {
    /// RFC 6570 URI template
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// All available resources
pub fn list_available_resources() -> Vec<ResourceInfo> {
    vec![
        ResourceInfo {
            uri: ACTIVE_SERVICES_URI.to_string(),
            name: "My active services".to_string(),
            description: "List all my active services in Eyevinn Open Source Cloud".to_string(),
            mime_type: "application/json".to_string(),
        },
        ResourceInfo {
            uri: LOCAL_VIDEOS_URI.to_string(),
            name: "My videos on local disk".to_string(),
            description: "List all videos on local disk".to_string(),
            mime_type: "application/json".to_string(),
        },
    ]
}

pub fn list_resource_templates() -> Vec<ResourceTemplateInfo> {
    vec![ResourceTemplateInfo {
        uri_template: PIPELINE_URI_TEMPLATE.to_string(),
        name: "VOD pipeline".to_string(),
        description: "Endpoints and output location of a VOD pipeline".to_string(),
        mime_type: "application/json".to_string(),
    }]
}

/// Parse a resource URI into its components
pub fn parse_resource_uri(uri: &str) -> Option<ResourcePath> {
    if let Some(stripped) = uri.strip_prefix("eyevinnosc://") {
        let parts: Vec<&str> = stripped.split('/').collect();
        return match parts.as_slice() {
            ["catalog", "myactiveservices"] => Some(ResourcePath::ActiveServices),
            ["pipelines", name] if !name.is_empty() => Some(ResourcePath::Pipeline(name.to_string())),
            _ => None,
        };
    }
    if uri == LOCAL_VIDEOS_URI {
        return Some(ResourcePath::LocalVideos);
    }
    None
}

/// Parsed resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePath {
    ActiveServices,
    Pipeline(String),
    LocalVideos,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_uris() {
        assert_eq!(
            parse_resource_uri(ACTIVE_SERVICES_URI),
            Some(ResourcePath::ActiveServices)
        );
        assert_eq!(
            parse_resource_uri("eyevinnosc://pipelines/promo"),
            Some(ResourcePath::Pipeline("promo".into()))
        );
        assert_eq!(
            parse_resource_uri(LOCAL_VIDEOS_URI),
            Some(ResourcePath::LocalVideos)
        );
    }

    #[test]
    fn test_parse_unknown_uris() {
        assert_eq!(parse_resource_uri("eyevinnosc://catalog/all"), None);
        assert_eq!(parse_resource_uri("eyevinnosc://pipelines/"), None);
        assert_eq!(parse_resource_uri("eyevinnosc://pipelines/a/b"), None);
        assert_eq!(parse_resource_uri("local://videos/other"), None);
        assert_eq!(parse_resource_uri("s3://media/"), None);
    }

    #[test]
    fn test_listing() {
        let uris: Vec<String> = list_available_resources().into_iter().map(|r| r.uri).collect();
        assert_eq!(uris, vec![ACTIVE_SERVICES_URI, LOCAL_VIDEOS_URI]);
        assert_eq!(list_resource_templates()[0].uri_template, PIPELINE_URI_TEMPLATE);
    }
}
