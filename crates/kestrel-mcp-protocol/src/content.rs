//! Content envelopes: the payload shapes carried by tool results, resource
//! reads and prompt messages.

use serde::{Deserialize, Serialize};

use crate::prompts::Role;

/// Client-facing annotations attached to content or resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// Text contents of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

/// Binary contents of a resource, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub blob: String,
}

/// Text or blob resource contents. Untagged: the presence of `text` vs
/// `blob` discriminates on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

impl ResourceContents {
    pub fn text(uri: impl Into<String>, text: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ResourceContents::Text(TextResourceContents {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            text: text.into(),
        })
    }

    pub fn blob(uri: impl Into<String>, blob: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ResourceContents::Blob(BlobResourceContents {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            blob: blob.into(),
        })
    }

    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text(t) => &t.uri,
            ResourceContents::Blob(b) => &b.uri,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            ResourceContents::Text(t) => t.mime_type.as_deref(),
            ResourceContents::Blob(b) => b.mime_type.as_deref(),
        }
    }
}

/// A resource embedded into a content sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub resource: ResourceContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// The content union carried in tool results and prompt messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Image {
        /// Base64-encoded image data
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Audio {
        /// Base64-encoded audio data
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text {
            text: text.into(),
            annotations: None,
        }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Content::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }

    pub fn audio(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Content::Audio {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }

    pub fn resource(resource: ResourceContents) -> Self {
        Content::Resource {
            resource,
            annotations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_content_tagging() {
        let content = Content::text("Hello, Kyrian!");
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "Hello, Kyrian!"}));
    }

    #[test]
    fn test_image_content_mime_type_casing() {
        let content = Content::image("QUJD", "image/png");
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["mimeType"], "image/png");
    }

    #[test]
    fn test_resource_contents_untagged_discrimination() {
        let text: ResourceContents =
            serde_json::from_value(json!({"uri": "a://b", "text": "x"})).unwrap();
        assert!(matches!(text, ResourceContents::Text(_)));

        let blob: ResourceContents =
            serde_json::from_value(json!({"uri": "a://b", "blob": "eA=="})).unwrap();
        assert!(matches!(blob, ResourceContents::Blob(_)));
    }

    #[test]
    fn test_embedded_resource_round_trip() {
        let embedded = EmbeddedResource {
            resource: ResourceContents::text("cfg://app", "{}", "application/json"),
            annotations: None,
        };
        let text = serde_json::to_string(&embedded).unwrap();
        let back: EmbeddedResource = serde_json::from_str(&text).unwrap();
        assert_eq!(back.resource.uri(), "cfg://app");
    }

    #[test]
    fn test_content_round_trip_all_variants() {
        let variants = vec![
            Content::text("t"),
            Content::image("ZGF0YQ==", "image/jpeg"),
            Content::audio("ZGF0YQ==", "audio/wav"),
            Content::resource(ResourceContents::blob("b://x", "ZGF0YQ==", "application/octet-stream")),
        ];
        for content in variants {
            let text = serde_json::to_string(&content).unwrap();
            let back: Content = serde_json::from_str(&text).unwrap();
            assert_eq!(back, content);
        }
    }
}
