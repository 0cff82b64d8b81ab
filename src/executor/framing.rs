//! Line splitting for executor output.
//!
//! The sandbox executor may already frame its output as SSE
//! (`data: <line>\n\n`, closed by `data: DONE\n\n`). One level of that framing
//! is removed here so the gateway encodes every line exactly once. Unframed
//! output passes through unchanged, one line at a time.

use crate::util::is_blank;

/// Payload of the executor's own end-of-stream frame. The gateway emits its
/// own terminal frame, so this one is dropped.
pub const EXECUTOR_DONE: &str = "DONE";

/// Buffers partial lines between chunks and yields complete output lines.
#[derive(Debug, Default)]
pub struct OutputLines {
    partial: String,
}

impl OutputLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed decoded text; returns the non-blank lines it completes.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.partial.push_str(text);
        let Some(end) = self.partial.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        complete.split('\n').filter_map(unframe).collect()
    }

    /// Flush an unterminated last line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        unframe(&rest)
    }
}

fn unframe(line: &str) -> Option<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = match line.strip_prefix("data:") {
        Some(data) => {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data == EXECUTOR_DONE {
                return None;
            }
            data
        }
        None => line,
    };
    if is_blank(payload) {
        None
    } else {
        Some(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_framed_output_is_unwrapped_once() {
        let mut lines = OutputLines::new();
        assert_eq!(
            lines.push("data: start\n\ndata: 64 bytes from 10.0.0.1\n\ndata: DONE\n\n"),
            vec!["start", "64 bytes from 10.0.0.1"]
        );
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn only_one_level_of_framing_is_removed() {
        let mut lines = OutputLines::new();
        assert_eq!(lines.push("data: data: x\ndata:y\n"), vec!["data: x", "y"]);
    }

    #[test]
    fn plain_output_keeps_its_whitespace() {
        let mut lines = OutputLines::new();
        assert_eq!(
            lines.push("PORT   STATE\r\n  22/tcp open  \n"),
            vec!["PORT   STATE", "  22/tcp open  "]
        );
    }

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let mut lines = OutputLines::new();
        assert!(lines.push("data: 64 by").is_empty());
        assert_eq!(lines.push("tes\n\nda"), vec!["64 bytes"]);
        assert_eq!(lines.push("ta: tail").len(), 0);
        assert_eq!(lines.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn blank_lines_and_executor_done_are_dropped() {
        let mut lines = OutputLines::new();
        assert!(lines.push("\n  \r\ndata: \ndata: DONE\n").is_empty());
        // unframed DONE is ordinary output
        assert_eq!(lines.push("DONE\n"), vec!["DONE"]);
    }

    #[test]
    fn stderr_lines_from_the_executor_pass_through() {
        let mut lines = OutputLines::new();
        assert_eq!(
            lines.push("data: ERR: ping: unknown host\n\n"),
            vec!["ERR: ping: unknown host"]
        );
    }
}
