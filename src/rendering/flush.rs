//! Turning a frame of blocks into a byte stream of text and relative cursor movements.
//!
//! The encoding never uses absolute positioning. The top-left cell of the render region is
//! wherever the cursor was when the first frame was written, and every later frame first
//! moves back up by the height of the previous one. One miscounted row or column therefore
//! shifts every frame that follows, so all bookkeeping below is in printable columns.

use crate::rendering::block::{required_height, Block};
use crate::rendering::cursor::CursorBuffer;
use crate::rendering::width::printable_width;

/// The bytes for one frame and the height of the region they cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    /// Rows covered by this frame. Pass it as `previous_lines` when encoding the next frame.
    pub lines_rendered: usize,
    /// Row the cursor is left on, counted from the row the frame started on.
    pub cursor_row: usize,
    /// Lowest row any line was written to, counted the same way.
    pub lowest_row: usize,
}

impl EncodedFrame {
    /// Rows between the final cursor position and the lowest drawn line.
    pub fn rows_below_cursor(&self) -> usize {
        self.lowest_row.saturating_sub(self.cursor_row)
    }
}

/// Encodes `blocks` so that they overwrite the region drawn by the previous frame.
///
/// `blocks` must already be in drawing order (see [`sort_by_z`](super::block::sort_by_z)).
/// `previous_lines` is the `lines_rendered` of the previous frame, or 0 for the first one.
pub fn encode_frame(blocks: &[Block], previous_lines: usize) -> EncodedFrame {
    let mut out = CursorBuffer::new();
    let lines_rendered = required_height(blocks);

    // back to row 0 of the last frame
    out.cursor_up(previous_lines);

    // make sure the rows we are about to draw into exist
    if lines_rendered > previous_lines {
        out.newlines(lines_rendered);
        out.cursor_up(lines_rendered);
    }

    // bottom row of the previous block and rightmost column drawn so far
    let mut x = 0;
    let mut y = 0;
    // where the movements above leave the cursor, for the caller's bookkeeping
    let mut row: usize = 0;
    let mut lowest_row = 0;

    for block in blocks {
        out.cursor_up(y);
        out.cursor_forward(block.x);
        out.cursor_down(block.y);
        row = row.saturating_sub(y) + block.y;

        let lines = block.lines();
        for line in &lines {
            out.cursor_down(1);
            row += 1;
            lowest_row = lowest_row.max(row);
            out.text(line);
            let width = printable_width(line);
            out.cursor_back(width);
            x = x.max(block.x + width);
        }

        y = block.y + lines.len() - 1;
        out.cursor_back(x);
    }

    EncodedFrame {
        bytes: out.into_bytes(),
        lines_rendered,
        cursor_row: row,
        lowest_row,
    }
}
