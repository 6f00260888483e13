//! Rendering of positioned text blocks onto a terminal.
//!
//! **Sub-modules:**
//!
//! *   [`block`](crate::rendering::block): The [`Block`](block::Block) type and its z-ordering.
//! *   [`width`](crate::rendering::width): Printable width of text containing escape sequences and wide characters.
//! *   [`cursor`](crate::rendering::cursor): Relative cursor movement commands and the [`CursorBuffer`](cursor::CursorBuffer) they are collected in.
//! *   [`flush`](crate::rendering::flush): Encoding of a whole frame into one byte stream.
//! *   [`renderer`](crate::rendering::renderer): The [`BlockRenderer`](renderer::BlockRenderer) and its background flush thread.
//!
//! **Rendering Process (Simplified):**
//!
//! 1.  The host builds a `Vec<Block>` from its model and submits it to the renderer.
//! 2.  Every frame interval the renderer sorts the latest submission by `z`.
//! 3.  The frame is encoded relative to the area the previous frame covered, so it overwrites it in place.
//! 4.  The bytes are written to the sink in a single call.

pub mod block;
pub mod cursor;
pub mod flush;
pub mod renderer;
pub mod width;
