use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;

/// An external media-extraction executable, driven purely by command line.
///
/// Implementations only build commands; spawning, piping and exit handling
/// live in [`super::describe`] and [`super::relay`] so every tool gets the
/// same lifecycle guarantees.
#[async_trait]
pub trait ExtractionTool: Send + Sync {
    /// Human-readable name of the tool
    fn name(&self) -> &'static str;

    /// Command that prints a single JSON document describing `url`
    fn describe_command(&self, url: &str) -> Command;

    /// Command that writes the bytes of one rendition of `url` to stdout
    fn stream_command(&self, url: &str, rendition_id: &str) -> Command;

    /// Container every streamed rendition is remuxed into
    fn output_container(&self) -> &str;

    /// Version string, used to check the tool is installed
    async fn version(&self) -> Result<String>;
}
