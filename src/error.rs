//! Error types for the block renderer.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`BlockRenderer`](crate::BlockRenderer) lifecycle calls and configuration.
///
/// Output write failures during a flush are not part of this type. They are logged and the
/// render loop keeps going.
#[derive(Debug, Error)]
pub enum RendererError {
    /// IO error from terminal operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was called while the background thread is already running.
    #[error("renderer is already running")]
    AlreadyRunning,

    /// `stop` was called before `start`.
    #[error("renderer was never started")]
    NotRunning,

    /// The renderer was stopped and cannot be used again.
    #[error("renderer has been stopped and cannot be restarted")]
    Stopped,

    /// The frame interval must be strictly positive.
    #[error("invalid frame interval: {0:?}")]
    InvalidFrameInterval(Duration),

    /// The background flush thread panicked before acknowledging shutdown.
    #[error("render thread panicked")]
    WorkerPanicked,
}
