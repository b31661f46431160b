mod describe;
mod error;
mod relay;
mod tool;
mod types;
mod ytdlp;

pub use error::{ExtractionError, RelayError};
pub use relay::{RelayPhase, RelayStream};
pub use tool::ExtractionTool;
pub use types::{non_blank, MediaDescriptor, RelayRequest};

#[cfg(test)]
pub use tool::testing;

use crate::config::AdapterConfig;
use crate::utils::attachment_filename;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ytdlp::YtDlp;

/// Entry point for both handlers: describe a source, or relay one rendition of it.
pub struct MediaService {
    tool: Arc<dyn ExtractionTool>,
    describe_timeout: Duration,
    stall_timeout: Duration,
}

impl MediaService {
    pub fn new(
        tool: Arc<dyn ExtractionTool>,
        describe_timeout: Duration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            tool,
            describe_timeout,
            stall_timeout,
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        info!(
            "Media service using {} (remux to {})",
            config.binary.display(),
            config.merge_format
        );

        Self::new(
            Arc::new(YtDlp::new(&config.binary, &config.merge_format)),
            config.describe_timeout(),
            config.stall_timeout(),
        )
    }

    pub async fn describe(&self, url: &str) -> Result<MediaDescriptor, ExtractionError> {
        describe::describe(self.tool.as_ref(), url, self.describe_timeout).await
    }

    pub async fn relay(&self, request: &RelayRequest) -> Result<RelayStream, RelayError> {
        relay::start(self.tool.as_ref(), request, self.stall_timeout).await
    }

    pub fn attachment_name(&self, request: &RelayRequest) -> String {
        attachment_filename(&request.rendition_id, self.tool.output_container())
    }

    pub async fn test_setup(&self) -> Result<()> {
        info!("Testing extraction tool setup...");

        let version = self.tool.version().await?;
        info!("{} is available, version: {}", self.tool.name(), version);

        if !YtDlp::ffmpeg_available().await {
            warn!("Renditions that need merging will fail without ffmpeg");
        }

        Ok(())
    }
}
