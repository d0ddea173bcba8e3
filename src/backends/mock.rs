//! In-process backend for tests and dry runs

use super::SegmentationBackend;
use crate::error::{BgCenterError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum MockBehavior {
    Passthrough,
    Respond(Vec<u8>),
    Fail(String),
    Reject(String),
}

/// Backend with scripted behavior that counts its invocations
#[derive(Debug)]
pub struct MockBackend {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Returns the input bytes unchanged
    #[must_use]
    pub fn passthrough() -> Self {
        Self::with_behavior(MockBehavior::Passthrough)
    }

    /// Returns `bytes` for every request
    #[must_use]
    pub fn responding(bytes: Vec<u8>) -> Self {
        Self::with_behavior(MockBehavior::Respond(bytes))
    }

    /// Fails every request with a backend error
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()))
    }

    /// Fails every request with a configuration error, as a backend that
    /// cannot run at all would
    pub fn misconfigured<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior::Reject(message.into()))
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `remove_background` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn remove_background(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Passthrough => Ok(image_bytes.to_vec()),
            MockBehavior::Respond(bytes) => Ok(bytes.clone()),
            MockBehavior::Fail(message) => Err(BgCenterError::backend(message.clone())),
            MockBehavior::Reject(message) => Err(BgCenterError::invalid_config(message.clone())),
        }
    }
}
