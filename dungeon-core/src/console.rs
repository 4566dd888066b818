//! Player-facing text I/O.

use std::io;

/// Where the session prints and reads.
///
/// Generated replies arrive through [`present`](Console::present), one
/// fragment at a time, followed by a single [`end_reply`](Console::end_reply).
/// Everything else the session says goes through
/// [`announce`](Console::announce).
pub trait Console {
    /// Show `prompt` and read one line of player input, without the newline.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;

    /// Show a fragment of a generated reply as soon as it arrives.
    fn present(&mut self, fragment: &str);

    /// The current generated reply is complete.
    fn end_reply(&mut self);

    /// Show a full line of game text.
    fn announce(&mut self, message: &str);

    /// Visually separate one turn from the next.
    fn separator(&mut self);
}
