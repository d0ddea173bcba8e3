//! Backend that pipes image bytes through an external program

use super::SegmentationBackend;
use crate::error::{BgCenterError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Settings for [`CommandBackend`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandBackendConfig {
    /// Program to run
    pub program: String,
    /// Arguments; the program must read the image on stdin and write the
    /// result on stdout
    pub args: Vec<String>,
    /// Upper bound for a single invocation
    pub timeout_secs: u64,
    /// Additional attempts after a failed invocation
    pub retries: u32,
}

impl Default for CommandBackendConfig {
    fn default() -> Self {
        Self {
            program: "rembg".to_string(),
            args: vec!["i".to_string(), "-".to_string(), "-".to_string()],
            timeout_secs: 120,
            retries: 1,
        }
    }
}

impl CommandBackendConfig {
    /// Parse a whitespace-separated command line such as `"rembg i - -"`
    ///
    /// # Errors
    /// - `InvalidConfig` if the command line is empty
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| BgCenterError::invalid_config("Backend command must not be empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Runs an external background-removal command per image
#[derive(Debug, Clone)]
pub struct CommandBackend {
    config: CommandBackendConfig,
}

impl CommandBackend {
    #[must_use]
    pub fn new(config: CommandBackendConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CommandBackendConfig {
        &self.config
    }

    async fn run_once(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let message = format!("Failed to start '{}': {}", self.config.program, e);
                // A missing program fails every image the same way
                if e.kind() == std::io::ErrorKind::NotFound {
                    BgCenterError::invalid_config(message)
                } else {
                    BgCenterError::backend(message)
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BgCenterError::internal("Child process has no stdin handle"))?;
        let input = image_bytes.to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await.map_err(|e| {
            BgCenterError::backend(format!(
                "Failed to read output of '{}': {}",
                self.config.program, e
            ))
        })?;

        match writer.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => debug!("Writing to '{}' stdin ended early: {}", self.config.program, e),
            Err(e) => return Err(BgCenterError::internal(format!("Writer task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BgCenterError::backend(format!(
                "'{}' exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(BgCenterError::backend(format!(
                "'{}' produced no output",
                self.config.program
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SegmentationBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn remove_background(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(timeout, self.run_once(image_bytes)).await {
                Ok(result) => result,
                Err(_) => Err(BgCenterError::backend(format!(
                    "'{}' timed out after {}s",
                    self.config.program, self.config.timeout_secs
                ))),
            };

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!(
                        "Backend attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = Some(e);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| BgCenterError::backend("Backend was never invoked")))
    }
}
