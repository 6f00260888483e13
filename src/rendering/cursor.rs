//! Relative cursor movement encoding.
//!
//! A [`CursorBuffer`] collects literal block text and relative cursor movements for a whole
//! frame, so the frame reaches the terminal in a single write.
//!
//! The movement commands are crossterm [`Command`]s and are queued like any other crossterm
//! command. They differ from `crossterm::cursor::MoveUp` and friends in two ways: a count of
//! zero is still emitted (`ESC [ 0 A`), and counts are not limited to `u16`.

use crossterm::{queue, Command};
use std::fmt;
use std::io;

macro_rules! relative_move {
    ($(#[$doc:meta])* $name:ident, $letter:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name(pub usize);

        impl Command for $name {
            fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
                write!(f, concat!("\x1b[{}", $letter), self.0)
            }

            #[cfg(windows)]
            fn execute_winapi(&self) -> io::Result<()> {
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "relative cursor movement requires ANSI support",
                ))
            }

            #[cfg(windows)]
            fn is_ansi_code_supported(&self) -> bool {
                true
            }
        }
    };
}

relative_move!(
    /// Moves the cursor up by the given number of rows (`ESC [ n A`).
    CursorUp,
    "A"
);
relative_move!(
    /// Moves the cursor down by the given number of rows (`ESC [ n B`).
    CursorDown,
    "B"
);
relative_move!(
    /// Moves the cursor right by the given number of columns (`ESC [ n C`).
    CursorForward,
    "C"
);
relative_move!(
    /// Moves the cursor left by the given number of columns (`ESC [ n D`).
    CursorBack,
    "D"
);

/// Byte buffer mixing literal text and relative cursor movements.
///
/// Writing into a `Vec<u8>` cannot fail, so the movement methods do not return errors.
#[derive(Debug, Default)]
pub struct CursorBuffer {
    buf: Vec<u8>,
}

impl CursorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.queue(CursorUp(n));
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.queue(CursorDown(n));
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.queue(CursorForward(n));
    }

    pub fn cursor_back(&mut self, n: usize) {
        self.queue(CursorBack(n));
    }

    /// Appends `n` line breaks, scrolling the terminal if the cursor is on the last row.
    pub fn newlines(&mut self, n: usize) {
        for _ in 0..n {
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    /// Appends literal text.
    pub fn text(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn queue(&mut self, command: impl Command) {
        // infallible for an in-memory buffer
        let _ = queue!(self.buf, command);
    }
}

impl io::Write for CursorBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
