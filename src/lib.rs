//! Composite independently positioned text blocks onto the terminal.
//!
//! `blockterm` draws a set of [`Block`]s (rectangular, multi-line pieces of text with an
//! `x`/`y` position and a `z` stacking order) into a region of the terminal using only
//! relative cursor movements. The region starts wherever the cursor is when the first frame
//! is written and is repainted in place on every frame, without clearing the screen or
//! switching to the alternate screen.
//!
//! Frames are flushed at a fixed rate by a background thread. Producers only ever replace the
//! pending frame, so a fast update loop never makes the renderer fall behind.
//!
//! # Example
//! ```rust ,no_run
//! use blockterm::{Block, BlockRenderer, RendererConfig};
//! use std::io::stdout;
//!
//! let mut renderer = BlockRenderer::new(stdout(), RendererConfig::default()).unwrap();
//! renderer.start().unwrap();
//!
//! let handle = renderer.handle();
//! std::thread::spawn(move || {
//!     handle.submit(vec![
//!         Block::new(1, 1, "01 Hi!\n01 Meow"),
//!         Block::new(4, 4, "02 Hello!\n02 Purr").with_z(1),
//!     ]);
//! })
//! .join()
//! .unwrap();
//!
//! renderer.stop().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod rendering;

pub use crate::config::RendererConfig;
pub use crate::error::RendererError;
pub use crate::rendering::block::Block;
pub use crate::rendering::renderer::{BlockRenderer, RendererHandle};
