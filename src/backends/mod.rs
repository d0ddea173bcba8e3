//! External segmentation collaborators
//!
//! A backend receives raw encoded image bytes and returns raw encoded bytes
//! whose alpha channel has already been computed. The pipeline treats that
//! alpha as final and hands the decoded buffer straight to the compositor.

pub mod command;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use command::{CommandBackend, CommandBackendConfig};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockBackend;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for opaque background-removal collaborators
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Remove the background from encoded image bytes
    ///
    /// # Errors
    /// - `Backend` when the collaborator fails, times out or returns nothing
    async fn remove_background(&self, image_bytes: &[u8]) -> Result<Vec<u8>>;
}
