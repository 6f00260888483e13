//! Blocks: positioned, stacked, multi-line text panels.

use crate::rendering::width::printable_width;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The lines of a block. Most blocks are only a few lines tall.
pub type Lines<'a> = SmallVec<[&'a str; 8]>;

/// A rectangular piece of text placed somewhere inside the render region.
///
/// `x` and `y` are measured in terminal columns and rows from the top-left corner of the
/// region. Blocks with a higher `z` are drawn later and therefore win where they overlap
/// blocks with a lower `z`.
///
/// A block is a plain value: the host builds a fresh set of blocks for every frame and hands
/// them to the renderer, which repaints every block in full.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub x: usize,
    pub y: usize,
    pub z: i32,
    pub content: String,
}

impl Block {
    pub fn new(x: usize, y: usize, content: impl Into<String>) -> Self {
        Self {
            x,
            y,
            z: 0,
            content: content.into(),
        }
    }

    /// Sets the stacking order of the block.
    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    /// The lines of the content, split on `'\n'`.
    ///
    /// Always at least one line: empty content is a single empty line, and a trailing
    /// newline produces a trailing empty line.
    pub fn lines(&self) -> Lines<'_> {
        self.content.split('\n').collect()
    }

    pub fn line_count(&self) -> usize {
        self.content.split('\n').count()
    }

    /// The row just below the block's last line, relative to the top of the render region.
    pub fn bottom(&self) -> usize {
        self.y + self.line_count()
    }

    /// Width in columns of the widest line.
    pub fn width(&self) -> usize {
        self.content
            .split('\n')
            .map(printable_width)
            .max()
            .unwrap_or(0)
    }
}

/// Orders blocks so that lower `z` comes first.
///
/// The sort is unstable: blocks sharing a `z` value end up in an unspecified relative order,
/// and callers must not rely on which of them is drawn on top.
pub fn sort_by_z(blocks: &mut [Block]) {
    blocks.sort_unstable_by_key(|block| block.z);
}

/// The number of rows needed to show every block, 0 for an empty frame.
pub fn required_height(blocks: &[Block]) -> usize {
    blocks.iter().map(Block::bottom).max().unwrap_or(0)
}
