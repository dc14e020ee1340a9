//! Server-sent event plumbing shared by provider parsers
//!
//! `SseStreamProcessor` turns raw response bytes into `data:` payloads,
//! hands each JSON payload to an `SseParser`, and forwards the resulting
//! `StreamPart`s over the stream channel.

use anyhow::Result;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::ai::streaming::StreamPart;

/// Converts one decoded SSE JSON payload into at most one stream part
pub trait SseParser: Send + Sync {
    fn parse_event(&self, json: &Value) -> Result<Option<StreamPart>>;
}

/// Line-buffering SSE decoder bound to one response stream
pub struct SseStreamProcessor {
    tx: mpsc::UnboundedSender<StreamPart>,
    buffer: Vec<u8>,
    events_sent: usize,
    saw_terminal: bool,
}

impl SseStreamProcessor {
    pub fn new(tx: mpsc::UnboundedSender<StreamPart>) -> Self {
        Self {
            tx,
            buffer: Vec::new(),
            events_sent: 0,
            saw_terminal: false,
        }
    }

    /// Feed a chunk of response bytes. Complete lines are processed
    /// immediately, a trailing partial line is kept for the next chunk.
    pub fn process_chunk<P: SseParser + ?Sized>(&mut self, bytes: Bytes, parser: &P) -> Result<()> {
        self.buffer.extend_from_slice(&bytes);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            self.process_line(line, parser)?;
        }

        Ok(())
    }

    fn process_line<P: SseParser + ?Sized>(&mut self, line: &str, parser: &P) -> Result<()> {
        let Some(data) = line.strip_prefix("data:") else {
            // `event:` names are repeated inside the JSON `type` field
            return Ok(());
        };
        self.process_sse_data(data.trim_start(), parser)
    }

    /// Handle a single `data:` payload
    pub fn process_sse_data<P: SseParser + ?Sized>(&mut self, data: &str, parser: &P) -> Result<()> {
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }

        let json: Value = match serde_json::from_str(data) {
            Ok(json) => json,
            Err(e) => {
                debug!("Skipping non-JSON SSE payload: {}", e);
                return Ok(());
            }
        };

        if let Some(part) = parser.parse_event(&json)? {
            trace!(?part, "stream part");
            self.saw_terminal |= part.is_terminal();
            self.events_sent += 1;
            // A closed receiver means the consumer went away; nothing left to do.
            let _ = self.tx.send(part);
        }

        Ok(())
    }

    /// Flush any buffered final line once the byte stream ends
    pub fn finish<P: SseParser + ?Sized>(&mut self, parser: &P) -> Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).to_string();
            self.process_line(line.trim_end(), parser)?;
        }
        debug!(
            events = self.events_sent,
            terminal = self.saw_terminal,
            "SSE stream finished"
        );
        Ok(())
    }

    pub fn saw_terminal(&self) -> bool {
        self.saw_terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoParser;

    impl SseParser for EchoParser {
        fn parse_event(&self, json: &Value) -> Result<Option<StreamPart>> {
            match json.get("text").and_then(|t| t.as_str()) {
                Some(text) => Ok(Some(StreamPart::TextDelta {
                    index: 0,
                    delta: text.to_string(),
                })),
                None => Ok(None),
            }
        }
    }

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut processor = SseStreamProcessor::new(tx);

        processor
            .process_chunk(Bytes::from_static(b"event: x\ndata: {\"te"), &EchoParser)
            .unwrap();
        assert!(rx.try_recv().is_err());

        processor
            .process_chunk(Bytes::from_static(b"xt\":\"hi\"}\r\n\n"), &EchoParser)
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StreamPart::TextDelta {
                index: 0,
                delta: "hi".to_string()
            }
        );
    }

    #[test]
    fn trailing_line_without_newline_is_flushed_on_finish() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut processor = SseStreamProcessor::new(tx);

        processor
            .process_chunk(Bytes::from_static(b"data: {\"text\":\"end\"}"), &EchoParser)
            .unwrap();
        assert!(rx.try_recv().is_err());

        processor.finish(&EchoParser).unwrap();
        assert!(matches!(rx.try_recv(), Ok(StreamPart::TextDelta { .. })));
    }

    #[test]
    fn multibyte_characters_split_across_chunks_survive() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut processor = SseStreamProcessor::new(tx);
        let payload = "data: {\"text\":\"caf\u{e9}\"}\n".as_bytes();
        let split = payload.len() - 4;

        processor
            .process_chunk(Bytes::copy_from_slice(&payload[..split]), &EchoParser)
            .unwrap();
        processor
            .process_chunk(Bytes::copy_from_slice(&payload[split..]), &EchoParser)
            .unwrap();

        match rx.try_recv().unwrap() {
            StreamPart::TextDelta { delta, .. } => assert_eq!(delta, "caf\u{e9}"),
            other => panic!("unexpected part: {:?}", other),
        }
    }
}
