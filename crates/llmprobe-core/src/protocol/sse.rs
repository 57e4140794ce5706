//! Incremental server-sent-events decoding shared by all adapters.
//!
//! HTTP chunk boundaries do not respect SSE line boundaries: one `data:`
//! payload can arrive split across two network reads, and a multi-byte UTF-8
//! character can be split mid-sequence. [`SseLineBuffer`] therefore buffers
//! raw bytes and only surfaces complete lines.

use futures_util::StreamExt;
use tracing::debug;

use crate::error::AdapterError;
use crate::measure::Stopwatch;
use crate::protocol::types::{StreamOutcome, TokenUsage};
use crate::protocol::STREAM_TIMEOUT;

/// Byte buffer that yields the payload of each complete `data:` line.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and drain every complete `data:` payload they close.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']).trim();
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// One decoded event from a protocol-specific parser.
pub(crate) struct SseDelta {
    /// Content text carried by this event (may be empty).
    pub text: String,
    /// Complete usage snapshot, when the event carries one.
    pub usage: Option<TokenUsage>,
}

/// Drive a streaming response to completion, decoding `data:` payloads with
/// `parse` and accumulating content, chunk count, TTFT and usage.
///
/// `parse` returns `None` for events it does not understand; malformed
/// frames are skipped rather than failing an otherwise healthy stream.
pub(crate) async fn collect_sse<F>(
    resp: reqwest::Response,
    watch: &Stopwatch,
    mut parse: F,
) -> Result<StreamOutcome, AdapterError>
where
    F: FnMut(&str) -> Option<SseDelta>,
{
    let mut buffer = SseLineBuffer::new();
    let mut content = String::new();
    let mut chunk_count = 0u32;
    let mut ttft_ms = 0u64;
    let mut usage = None;

    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let bytes = chunk.map_err(|e| AdapterError::from_reqwest(e, STREAM_TIMEOUT))?;
        for payload in buffer.feed(&bytes) {
            if payload == "[DONE]" {
                continue;
            }
            let Some(delta) = parse(&payload) else {
                continue;
            };
            if let Some(u) = delta.usage {
                usage = Some(u);
            }
            if !delta.text.is_empty() {
                if chunk_count == 0 {
                    ttft_ms = watch.elapsed_ms_min1();
                }
                chunk_count += 1;
                content.push_str(&delta.text);
            }
        }
    }

    debug!(chunks = chunk_count, ttft_ms, "Stream drained");

    Ok(StreamOutcome {
        content,
        chunk_count,
        ttft_ms,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut buf = SseLineBuffer::new();
        let payloads = buf.feed(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_payload_split_across_feeds() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.feed(b"data: {\"text\":").is_empty());
        let payloads = buf.feed(b"\"hi\"}\n");
        assert_eq!(payloads, vec!["{\"text\":\"hi\"}"]);
    }

    #[test]
    fn test_multibyte_char_split_across_feeds() {
        let mut buf = SseLineBuffer::new();
        let frame = "data: {\"text\":\"héllo\"}\n".as_bytes();
        // Split inside the two-byte 'é'.
        let mid = frame.iter().position(|&b| b == 0xc3).unwrap() + 1;
        assert!(buf.feed(&frame[..mid]).is_empty());
        let payloads = buf.feed(&frame[mid..]);
        assert_eq!(payloads, vec!["{\"text\":\"héllo\"}"]);
    }

    #[test]
    fn test_crlf_lines_and_missing_space() {
        let mut buf = SseLineBuffer::new();
        let payloads = buf.feed(b"data:{\"a\":1}\r\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_non_data_lines_skipped() {
        let mut buf = SseLineBuffer::new();
        let payloads = buf.feed(b"event: ping\n: keepalive\ndata: x\n");
        assert_eq!(payloads, vec!["x"]);
    }
}
