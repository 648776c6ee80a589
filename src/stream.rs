//! Incremental parsing of the newline-delimited JSON processing stream.
//!
//! The transport hands back arbitrary byte chunks; record boundaries and
//! UTF-8 character boundaries both fall wherever they fall. The assembler
//! buffers at the byte level and only splits on `\n`, which can never occur
//! inside a multi-byte UTF-8 sequence, so partial characters and partial
//! lines survive chunk boundaries intact.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::protocol::StreamEvent;

const READ_BUF_BYTES: usize = 16 * 1024;

/// Reassembles complete text lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    residual: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the complete lines it closed off.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.residual.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.residual.iter().position(|&byte| byte == b'\n') {
            let mut line: Vec<u8> = self.residual.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush a trailing unterminated line; end-of-stream acts as a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.residual.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.residual);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Parse one stream line into an event.
///
/// Lines that are empty after trimming yield `None`; lines that fail to
/// parse are logged and skipped so a single malformed record never aborts
/// the stream.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!("Skipping malformed stream line: {err}");
            None
        }
    }
}

/// How a stream read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body ended normally.
    Finished,
    /// The cancel flag was raised; remaining bytes were abandoned.
    Cancelled,
}

/// Drive a response body to completion, invoking `on_event` per decoded
/// record in line order. The cancel flag is checked between reads so an
/// aborted run stops promptly without surfacing an error.
pub fn read_events<R: Read>(
    mut body: R,
    cancel: &Arc<AtomicBool>,
    mut on_event: impl FnMut(StreamEvent),
) -> Result<StreamOutcome, std::io::Error> {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; READ_BUF_BYTES];
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(StreamOutcome::Cancelled);
        }
        let read = match body.read(&mut buf) {
            Ok(read) => read,
            Err(err) => {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(StreamOutcome::Cancelled);
                }
                return Err(err);
            }
        };
        if read == 0 {
            break;
        }
        for line in assembler.push(&buf[..read]) {
            if let Some(event) = parse_line(&line) {
                on_event(event);
            }
        }
    }
    if let Some(line) = assembler.finish() {
        if let Some(event) = parse_line(&line) {
            on_event(event);
        }
    }
    Ok(StreamOutcome::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StreamEvent;

    fn collect_all(payload: &[u8], split_at: &[usize]) -> Vec<String> {
        let mut assembler = LineAssembler::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &end in split_at {
            lines.extend(assembler.push(&payload[start..end]));
            start = end;
        }
        lines.extend(assembler.push(&payload[start..]));
        lines.extend(assembler.finish());
        lines
    }

    #[test]
    fn lines_survive_arbitrary_chunk_boundaries() {
        let payload = b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n";
        let whole = collect_all(payload, &[]);
        for split in 1..payload.len() {
            assert_eq!(collect_all(payload, &[split]), whole, "split at {split}");
        }
        // Every byte its own chunk.
        let singles: Vec<usize> = (1..payload.len()).collect();
        assert_eq!(collect_all(payload, &singles), whole);
    }

    #[test]
    fn multibyte_characters_survive_mid_sequence_splits() {
        // "ключ" is 8 bytes of two-byte characters inside a JSON string.
        let payload = "{\"key\":\"ключ\"}\n".as_bytes();
        let whole = collect_all(payload, &[]);
        for split in 1..payload.len() {
            assert_eq!(collect_all(payload, &[split]), whole, "split at {split}");
        }
        assert_eq!(whole, vec!["{\"key\":\"ключ\"}".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_trailing_line() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"{\"status\":\"complete\",").is_empty());
        assert!(assembler.push(b"\"progress\":100}").is_empty());
        assert_eq!(
            assembler.finish(),
            Some("{\"status\":\"complete\",\"progress\":100}".to_string())
        );
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"{\"a\":1}\r\n{\"b\":2}\r\n");
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[test]
    fn malformed_line_is_skipped_without_stopping_the_stream() {
        let body: &[u8] = b"{\"status\":\"starting\",\"progress\":0}\nnot json at all\n{\"status\":\"complete\",\"progress\":100}\n";
        let cancel = Arc::new(AtomicBool::new(false));
        let mut events = Vec::new();
        let outcome = read_events(body, &cancel, |event| events.push(event)).unwrap();
        assert_eq!(outcome, StreamOutcome::Finished);
        assert_eq!(
            events,
            vec![
                StreamEvent::Starting { progress: 0.0 },
                StreamEvent::Complete { progress: 100.0 },
            ]
        );
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn unterminated_final_record_is_still_delivered() {
        let body: &[u8] = b"{\"status\":\"starting\",\"progress\":0}\n{\"status\":\"complete\",\"progress\":100}";
        let cancel = Arc::new(AtomicBool::new(false));
        let mut events = Vec::new();
        read_events(body, &cancel, |event| events.push(event)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::Complete { progress: 100.0 });
    }

    #[test]
    fn cancel_flag_stops_reading_silently() {
        let body: &[u8] = b"{\"status\":\"starting\",\"progress\":0}\n";
        let cancel = Arc::new(AtomicBool::new(true));
        let mut events = Vec::new();
        let outcome = read_events(body, &cancel, |event| events.push(event)).unwrap();
        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert!(events.is_empty());
    }
}
