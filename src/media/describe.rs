use super::error::ExtractionError;
use super::tool::ExtractionTool;
use super::types::{MediaDescriptor, MediaKind, RawFormat, RawMediaInfo, RenditionInfo};
use std::time::Duration;
use tracing::debug;

/// The adapter's marker for a missing stream.
const NO_CODEC: &str = "none";

/// Runs the tool in describe mode and maps its output.
///
/// The process is killed if it outlives `timeout`.
pub async fn describe(
    tool: &dyn ExtractionTool,
    url: &str,
    timeout: Duration,
) -> Result<MediaDescriptor, ExtractionError> {
    debug!("Describing {} with {}", url, tool.name());

    let mut command = tool.describe_command(url);
    command.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ExtractionError::TimedOut(timeout))?
        .map_err(ExtractionError::Spawn)?;

    if !output.status.success() {
        return Err(ExtractionError::Failed {
            status: output.status,
            diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let raw: RawMediaInfo =
        serde_json::from_slice(&output.stdout).map_err(ExtractionError::Malformed)?;

    Ok(map_descriptor(raw))
}

pub fn map_descriptor(raw: RawMediaInfo) -> MediaDescriptor {
    let total = raw.formats.len();
    let renditions: Vec<RenditionInfo> = raw.formats.into_iter().filter_map(map_format).collect();
    debug!("Kept {} of {} reported formats", renditions.len(), total);

    MediaDescriptor {
        title: raw.title.unwrap_or_else(|| "Unknown Title".to_string()),
        thumbnail: raw.thumbnail,
        renditions,
    }
}

/// Maps one raw entry, or `None` when it carries no playable stream.
pub fn map_format(raw: RawFormat) -> Option<RenditionInfo> {
    let id = raw.format_id.filter(|id| !id.is_empty())?;
    let container = raw.ext.filter(|ext| !ext.is_empty())?;

    let has_video = codec_present(raw.vcodec.as_deref());
    let has_audio = codec_present(raw.acodec.as_deref());
    if !has_video && !has_audio {
        return None;
    }

    Some(RenditionInfo {
        id,
        container,
        note: raw.format_note.unwrap_or_default(),
        quality_label: quality_label(
            raw.quality_label.as_deref(),
            raw.abr,
            raw.height,
        ),
        approximate_size_bytes: size_estimate(raw.filesize, raw.filesize_approx),
        media_kind: MediaKind::classify(has_video, has_audio),
        audio_codec: raw.acodec,
        video_codec: raw.vcodec,
    })
}

/// Only an explicit "none" marks a stream as absent; an unreported codec counts as present.
fn codec_present(codec: Option<&str>) -> bool {
    codec != Some(NO_CODEC)
}

fn quality_label(label: Option<&str>, abr: Option<f64>, height: Option<f64>) -> String {
    if let Some(label) = label.filter(|l| !l.is_empty()) {
        return label.to_string();
    }

    [abr, height]
        .into_iter()
        .flatten()
        .find(|v| *v > 0.0)
        .map(|v| format!("{}", v))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn size_estimate(exact: Option<f64>, approximate: Option<f64>) -> Option<u64> {
    [exact, approximate]
        .into_iter()
        .flatten()
        .find(|size| *size > 0.0)
        .map(|size| size.round() as u64)
}
