//! Newline-delimited JSON decoding for streamed `/api/generate` bodies.

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};
use memchr::memchr;
use serde_json::Value;

use super::{ApiError, GenerateResponse};

/// Splits an arbitrary byte-chunk sequence into decoded NDJSON lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and decode every complete line they finish.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<GenerateResponse, ApiError>> {
        self.buffer.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(item) = decode_line(&line[..newline_pos]) {
                decoded.push(item);
            }
        }
        decoded
    }

    /// Decode whatever remains once the body has ended without a final newline.
    pub fn finish(&mut self) -> Option<Result<GenerateResponse, ApiError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Option<Result<GenerateResponse, ApiError>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => return Some(Err(ApiError::Decode(e))),
    };
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Some(Err(ApiError::Server(message.to_string())));
    }
    Some(serde_json::from_value(value).map_err(ApiError::Decode))
}

struct DecodeState {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<GenerateResponse, ApiError>>,
    finished: bool,
}

/// Turn a successful streaming response into a stream of decoded lines.
///
/// The stream ends after the first error it yields.
pub fn decode_response(
    response: reqwest::Response,
) -> BoxStream<'static, Result<GenerateResponse, ApiError>> {
    let state = DecodeState {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(&chunk);
                    state.pending.extend(decoded);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ApiError::Http(e)), state));
                }
                None => {
                    state.finished = true;
                    if let Some(item) = state.decoder.finish() {
                        state.pending.push_back(item);
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.push(br#"{"response":"Hel"#).is_empty());
        let decoded = decoder.push(b"lo\",\"done\":false}\n{\"response\":\"!\"");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap().response, "Hello");

        let decoded = decoder.push(b",\"done\":true}\n");
        let last = decoded[0].as_ref().unwrap();
        assert_eq!(last.response, "!");
        assert!(last.done);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut decoder = LineDecoder::new();
        let decoded = decoder.push(b"\n\r\n   \n{\"response\":\"x\"}\r\n");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap().response, "x");
    }

    #[test]
    fn trailing_line_without_newline_is_decoded_on_finish() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(br#"{"response":"tail","done":true}"#).is_empty());
        let last = decoder.finish().unwrap().unwrap();
        assert_eq!(last.response, "tail");
        assert!(last.done);
    }

    #[test]
    fn error_lines_become_server_errors() {
        let mut decoder = LineDecoder::new();
        let decoded = decoder.push(b"{\"error\":\"model runner crashed\"}\n");
        match &decoded[0] {
            Err(ApiError::Server(message)) => assert_eq!(message, "model runner crashed"),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_lines_become_decode_errors() {
        let mut decoder = LineDecoder::new();
        let decoded = decoder.push(b"not json\n");
        assert!(matches!(decoded[0], Err(ApiError::Decode(_))));
    }
}
