//! Content type classification for stored files
//!
//! Files carry their logical kind as a `content-type` tag on the
//! storage network. The tag value is a plain media-type string so that
//! readers without this crate can still interpret it.

use serde::{Deserialize, Serialize};

/// Tag key under which the content type travels on a stored file
pub const CONTENT_TYPE_TAG: &str = "content-type";

/// Logical kind of an uploaded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "text/plain")]
    Text,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "image/jpeg")]
    Image,
    #[serde(rename = "video/mp4")]
    Video,
    #[serde(rename = "audio/mpeg")]
    Audio,
}

impl ContentType {
    /// The media-type tag value for this kind
    pub fn tag(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Image => "image/jpeg",
            ContentType::Video => "video/mp4",
            ContentType::Audio => "audio/mpeg",
        }
    }

    /// Parse a tag value back into a kind, `None` for unknown tags
    pub fn from_tag(tag: &str) -> Option<ContentType> {
        match tag {
            "text/plain" => Some(ContentType::Text),
            "application/json" => Some(ContentType::Json),
            "image/jpeg" => Some(ContentType::Image),
            "video/mp4" => Some(ContentType::Video),
            "audio/mpeg" => Some(ContentType::Audio),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for ct in [
            ContentType::Text,
            ContentType::Json,
            ContentType::Image,
            ContentType::Video,
            ContentType::Audio,
        ] {
            assert_eq!(ContentType::from_tag(ct.tag()), Some(ct));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(ContentType::from_tag("application/octet-stream"), None);
        assert_eq!(ContentType::from_tag(""), None);
    }

    #[test]
    fn test_serde_uses_tag_values() {
        let json = serde_json::to_string(&ContentType::Image).unwrap();
        assert_eq!(json, "\"image/jpeg\"");

        let back: ContentType = serde_json::from_str("\"audio/mpeg\"").unwrap();
        assert_eq!(back, ContentType::Audio);
    }
}
