use super::tool::ExtractionTool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Sent with every describe request; some sites only answer crawlers.
const BOT_FILTER_HEADERS: [&str; 2] = ["referer:youtube.com", "user-agent:googlebot"];

pub struct YtDlp {
    binary: PathBuf,
    merge_format: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>, merge_format: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            merge_format: merge_format.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.stdin(Stdio::null());
        command
    }

    /// Checks for ffmpeg, which yt-dlp needs to merge separate audio and video.
    pub async fn ffmpeg_available() -> bool {
        match tokio::time::timeout(
            Duration::from_secs(10),
            Command::new("ffmpeg").arg("-version").output(),
        )
        .await
        {
            Ok(Ok(output)) if output.status.success() => {
                let version_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .to_string();
                info!("ffmpeg is available: {}", version_line);
                true
            }
            Ok(Ok(_)) => {
                warn!("ffmpeg command failed");
                false
            }
            Ok(Err(e)) => {
                warn!("ffmpeg not found: {} (required for merging renditions)", e);
                false
            }
            Err(_) => {
                warn!("ffmpeg did not answer -version in time");
                false
            }
        }
    }
}

#[async_trait]
impl ExtractionTool for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn describe_command(&self, url: &str) -> Command {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--no-check-certificates")
            .arg("--no-warnings")
            .arg("--prefer-free-formats");
        for header in BOT_FILTER_HEADERS {
            command.arg("--add-header").arg(header);
        }
        command.arg("--").arg(url);
        command
    }

    fn stream_command(&self, url: &str, rendition_id: &str) -> Command {
        let mut command = self.command();
        command
            .arg("--format")
            .arg(rendition_id)
            .arg("--output")
            .arg("-")
            .arg("--no-playlist")
            .arg("--merge-output-format")
            .arg(&self.merge_format)
            .arg("--")
            .arg(url);
        command
    }

    fn output_container(&self) -> &str {
        &self.merge_format
    }

    async fn version(&self) -> Result<String> {
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            self.command().arg("--version").output(),
        )
        .await
        .context("yt-dlp --version timed out")?
        .with_context(|| format!("yt-dlp not found at {}", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp --version exited with {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_describe_command() {
        let tool = YtDlp::new("yt-dlp", "mp4");
        let command = tool.describe_command("https://example.com/watch?v=1");

        assert_eq!(command.as_std().get_program(), "yt-dlp");
        assert_eq!(
            args(&command),
            vec![
                "--dump-single-json",
                "--no-check-certificates",
                "--no-warnings",
                "--prefer-free-formats",
                "--add-header",
                "referer:youtube.com",
                "--add-header",
                "user-agent:googlebot",
                "--",
                "https://example.com/watch?v=1",
            ]
        );
    }

    #[test]
    fn test_stream_command_selects_single_rendition() {
        let tool = YtDlp::new("/opt/bin/yt-dlp", "mkv");
        let command = tool.stream_command("https://example.com/v", "137+140");

        assert_eq!(command.as_std().get_program(), "/opt/bin/yt-dlp");
        assert_eq!(
            args(&command),
            vec![
                "--format",
                "137+140",
                "--output",
                "-",
                "--no-playlist",
                "--merge-output-format",
                "mkv",
                "--",
                "https://example.com/v",
            ]
        );
        assert_eq!(tool.output_container(), "mkv");
    }

    #[test]
    fn test_url_cannot_be_read_as_option() {
        let tool = YtDlp::new("yt-dlp", "mp4");
        let args = args(&tool.stream_command("--exec=rm", "18"));
        let separator = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[separator + 1], "--exec=rm");
        assert_eq!(separator + 2, args.len());
    }

    #[tokio::test]
    async fn test_version_reports_missing_binary() {
        let tool = YtDlp::new("/nonexistent/yt-dlp", "mp4");
        assert!(tool.version().await.is_err());
    }
}
