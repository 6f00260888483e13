//! Renderer configuration.

use crate::error::RendererError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The default frame rate of the background flush thread.
pub const DEFAULT_FPS: u32 = 60;

/// Configuration for a [`BlockRenderer`](crate::BlockRenderer).
///
/// # Example
/// ```
/// use blockterm::RendererConfig;
/// use std::time::Duration;
///
/// let config = RendererConfig::with_fps(30.0).unwrap();
/// assert_eq!(config.frame_interval, Duration::from_secs(1) / 30);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Time between two periodic flushes.
    pub frame_interval: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_secs(1) / DEFAULT_FPS,
        }
    }
}

impl RendererConfig {
    /// Creates a config that flushes at most `fps` times per second.
    pub fn with_fps(fps: f64) -> Result<Self, RendererError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(RendererError::InvalidFrameInterval(Duration::ZERO));
        }
        let frame_interval = Duration::try_from_secs_f64(1.0 / fps)
            .map_err(|_| RendererError::InvalidFrameInterval(Duration::MAX))?;
        Self::with_frame_interval(frame_interval)
    }

    /// Creates a config with an explicit frame interval.
    pub fn with_frame_interval(frame_interval: Duration) -> Result<Self, RendererError> {
        let config = Self { frame_interval };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the frame interval is non-zero.
    pub fn validate(&self) -> Result<(), RendererError> {
        if self.frame_interval.is_zero() {
            return Err(RendererError::InvalidFrameInterval(self.frame_interval));
        }
        Ok(())
    }
}
