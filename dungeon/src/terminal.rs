//! Line-oriented console over stdin/stdout.

use dungeon_core::Console;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::runtime::RuntimeFlavor;

/// Width of the `=` rule printed between cycles.
pub const SEPARATOR_WIDTH: usize = 50;

/// A [`Console`] over any reader and writer, pacing generated text.
pub struct Terminal<R, W> {
    input: R,
    output: W,
    delay: Duration,
}

impl Terminal<io::StdinLock<'static>, io::Stdout> {
    /// The process's stdin and stdout.
    pub fn stdio(delay: Duration) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), delay)
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W, delay: Duration) -> Self {
        Self {
            input,
            output,
            delay,
        }
    }

    /// Print `text` one character at a time, then a newline.
    pub fn print_slowly(&mut self, text: &str) {
        for c in text.chars() {
            let mut buf = [0u8; 4];
            self.emit(c.encode_utf8(&mut buf));
            self.pause();
        }
        self.emit("\n");
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self
            .output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
        {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
    }

    /// Sleep for the pacing delay, through `block_in_place` when running on a
    /// multi-threaded runtime worker.
    fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        let in_multi_thread_runtime = tokio::runtime::Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if in_multi_thread_runtime {
            tokio::task::block_in_place(|| std::thread::sleep(self.delay));
        } else {
            std::thread::sleep(self.delay);
        }
    }
}

impl<R: BufRead, W: Write> Console for Terminal<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.emit(prompt);

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed",
            ));
        }
        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(line)
    }

    fn present(&mut self, fragment: &str) {
        self.emit(fragment);
        self.pause();
    }

    fn end_reply(&mut self) {
        self.emit("\n");
    }

    fn announce(&mut self, message: &str) {
        self.emit(message);
        self.emit("\n");
    }

    fn separator(&mut self) {
        let rule = "=".repeat(SEPARATOR_WIDTH);
        self.emit(&format!("\n{rule}\n\n"));
    }
}
