//! Incremental parsing of the newline-delimited SSE wire format.
//!
//! The chat-completion endpoint streams `data: {json}` lines terminated by a
//! literal `data: [DONE]` line. Bytes arrive in arbitrary chunks, so line
//! reassembly must tolerate boundaries falling anywhere, including inside a
//! multi-byte UTF-8 sequence or mid-line.

use std::mem;

use serde_json::Value;

/// Reassembles `\n`-delimited lines from arbitrarily-chunked bytes.
///
/// Buffers raw bytes and decodes only complete lines, so a chunk boundary
/// falling inside a multi-byte UTF-8 sequence cannot corrupt the text. A
/// trailing `\r` is stripped from each line (CRLF tolerance). Bytes after
/// the last newline stay buffered until the next chunk or [`LineBuffer::take_remainder`].
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_idx) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline_idx).collect();
            line.pop(); // the '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain any final unterminated line after the stream ends.
    pub(crate) fn take_remainder(&mut self) -> Option<String> {
        let remainder = mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&remainder);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Outcome of interpreting one SSE line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    /// A non-empty content delta.
    Delta(String),
    /// The literal `[DONE]` terminator.
    Done,
    /// Blank line, comment, non-`data:` field, or an unparseable payload.
    Skip,
}

/// Interpret one reassembled line of the stream.
///
/// Lines without the `data:` prefix are ignored. Payloads that fail to parse
/// as JSON are silently skipped rather than treated as fatal.
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let trimmed = line.trim();
    let Some(payload) = trimmed.strip_prefix("data:") else {
        return SseLine::Skip;
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return SseLine::Skip;
    }
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(json) => match extract_delta(&json) {
            Some(delta) if !delta.is_empty() => SseLine::Delta(delta),
            _ => SseLine::Skip,
        },
        Err(err) => {
            tracing::debug!(%err, payload_bytes = payload.len(), "skipping malformed SSE payload");
            SseLine::Skip
        }
    }
}

/// Pull the content delta out of one chunk's JSON.
///
/// Prefers the first choice's incremental `delta.content`; falls back to its
/// plain `text` field. Absent both, the chunk contributes nothing.
fn extract_delta(json: &Value) -> Option<String> {
    let first_choice = json.get("choices")?.as_array()?.first()?;

    if let Some(content) = first_choice
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }

    first_choice
        .get("text")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
