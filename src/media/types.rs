use serde::{Deserialize, Serialize};

/// Answer to a describe query. Field names follow the JSON the web client reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub title: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "formats")]
    pub renditions: Vec<RenditionInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    #[serde(rename = "video")]
    VideoOnly,
    #[serde(rename = "audio")]
    AudioOnly,
    #[serde(rename = "both")]
    Combined,
}

impl MediaKind {
    /// Video missing wins over audio missing; callers drop entries with neither.
    pub fn classify(has_video: bool, has_audio: bool) -> Self {
        if !has_video {
            MediaKind::AudioOnly
        } else if !has_audio {
            MediaKind::VideoOnly
        } else {
            MediaKind::Combined
        }
    }
}

/// One selectable rendition. `id` is opaque and must be sent back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenditionInfo {
    #[serde(rename = "format_id")]
    pub id: String,
    #[serde(rename = "ext")]
    pub container: String,
    #[serde(rename = "format_note")]
    pub note: String,
    #[serde(rename = "quality")]
    pub quality_label: String,
    #[serde(rename = "filesize")]
    pub approximate_size_bytes: Option<u64>,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
    #[serde(rename = "acodec")]
    pub audio_codec: Option<String>,
    #[serde(rename = "vcodec")]
    pub video_codec: Option<String>,
}

/// Subset of the adapter's `--dump-single-json` output we rely on.
#[derive(Debug, Deserialize)]
pub struct RawMediaInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub format_note: Option<String>,
    pub quality_label: Option<String>,
    pub abr: Option<f64>,
    pub height: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub source_url: String,
    pub rendition_id: String,
}

impl RelayRequest {
    /// Both fields must be present and non-blank.
    pub fn new(source_url: Option<String>, rendition_id: Option<String>) -> Option<Self> {
        Some(Self {
            source_url: non_blank(source_url)?,
            rendition_id: non_blank(rendition_id)?,
        })
    }
}

/// Trims a request field and treats blank input the same as a missing one.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_media_kind() {
        assert_eq!(MediaKind::classify(false, true), MediaKind::AudioOnly);
        assert_eq!(MediaKind::classify(true, false), MediaKind::VideoOnly);
        assert_eq!(MediaKind::classify(true, true), MediaKind::Combined);
    }

    #[test]
    fn test_relay_request_requires_both_fields() {
        assert!(RelayRequest::new(None, Some("18".into())).is_none());
        assert!(RelayRequest::new(Some("https://a".into()), None).is_none());
        assert!(RelayRequest::new(Some("   ".into()), Some("18".into())).is_none());
        assert!(RelayRequest::new(Some("https://a".into()), Some("".into())).is_none());

        let request =
            RelayRequest::new(Some(" https://a ".into()), Some("137+140".into())).unwrap();
        assert_eq!(request.source_url, "https://a");
        assert_eq!(request.rendition_id, "137+140");
    }

    #[test]
    fn test_rendition_serializes_with_client_field_names() {
        let info = RenditionInfo {
            id: "251".into(),
            container: "webm".into(),
            note: "medium".into(),
            quality_label: "129.5".into(),
            approximate_size_bytes: None,
            media_kind: MediaKind::AudioOnly,
            audio_codec: Some("opus".into()),
            video_codec: Some("none".into()),
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["format_id"], "251");
        assert_eq!(json["ext"], "webm");
        assert_eq!(json["quality"], "129.5");
        assert_eq!(json["type"], "audio");
        assert!(json["filesize"].is_null());
    }
}
