//! Sprite extraction through an external Python script.
//!
//! The request payload is written to a temporary JSON file whose path is the
//! script's only argument. The script prints `{"spriteImageUrl": "..."}`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, instrument, warn};
use tshirt_studio_core::DataUri;

use crate::config::SpriteConfig;

/// Errors from the sprite extractor.
#[derive(Debug, Error)]
pub enum SpriteError {
    /// Writing the payload or spawning the interpreter failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The script did not finish in time.
    #[error("Sprite extraction timed out after {0:?}")]
    Timeout(Duration),

    /// The script exited with a failure status.
    #[error("Sprite extraction failed with status {code:?}")]
    Failed { code: Option<i32>, stderr: String },

    /// Stdout was not JSON.
    #[error("Failed to parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    /// Stdout was JSON without a sprite URL.
    #[error("Invalid extractor output")]
    InvalidOutput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractorInput<'a> {
    image_data: String,
    element_description: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractorOutput {
    sprite_image_url: Option<String>,
}

/// Runs the sprite extraction script.
#[derive(Debug, Clone)]
pub struct SpriteExtractor {
    python_bin: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl SpriteExtractor {
    #[must_use]
    pub fn new(config: &SpriteConfig, timeout: Duration) -> Self {
        Self {
            python_bin: config.python_bin.clone(),
            script_path: config.script_path.clone(),
            timeout,
        }
    }

    /// Extract the described element from an image.
    ///
    /// Returns the sprite as the URL or data URI the script produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be run, fails, times out, or
    /// prints output without a sprite URL.
    #[instrument(skip(self, image), fields(script = %self.script_path.display()))]
    pub async fn extract(&self, image: &DataUri, description: &str) -> Result<String, SpriteError> {
        let input_path =
            std::env::temp_dir().join(format!("extract_sprite_{}.json", uuid::Uuid::new_v4()));
        let payload = serde_json::to_vec(&ExtractorInput {
            image_data: image.to_string(),
            element_description: description,
        })?;
        tokio::fs::write(&input_path, payload).await?;

        let result = self.run(&input_path).await;

        if let Err(e) = tokio::fs::remove_file(&input_path).await {
            warn!(error = %e, path = %input_path.display(), "Failed to remove extractor input");
        }

        let stdout = result?;
        let output: ExtractorOutput = serde_json::from_slice(&stdout)?;
        output
            .sprite_image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(SpriteError::InvalidOutput)
    }

    async fn run(&self, input_path: &std::path::Path) -> Result<Vec<u8>, SpriteError> {
        let child = Command::new(&self.python_bin)
            .arg(&self.script_path)
            .arg(input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SpriteError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(code = ?output.status.code(), %stderr, "Sprite extractor failed");
            return Err(SpriteError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        debug!(bytes = output.stdout.len(), "Sprite extractor finished");
        Ok(output.stdout)
    }
}
