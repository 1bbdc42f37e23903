//! Shared SSE streaming infrastructure.
//!
//! The wire contract is line-based: each line begins `data: ` followed by
//! a JSON object or the literal `[DONE]`. The consumer splits on `\n`,
//! retains the trailing partial line across reads, and ignores
//! unparseable payloads as long as the framing is recoverable.
//!
//! Two pieces:
//! - [`drain_data_lines`] -- pull complete `data:` payloads from a buffer
//! - [`sse_response_stream`] -- build a `BoxStream` from a response + parser

use crate::util::from_reqwest;
use av_domain::error::Result;
use av_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial line remains for the next call. Non-`data:` lines
/// (`event:`, `id:`, comments, blanks) are skipped.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                data_lines.push(data.to_owned());
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE `reqwest::Response` and a parser
/// closure mapping each `data:` payload to zero or more stream events.
///
/// The stream:
/// 1. Buffers incoming chunks and drains complete lines
/// 2. Flushes the remaining buffer when the response body closes
/// 3. Guarantees exactly one `Done` event (suppresses duplicates, emits
///    a fallback at end-of-stream if the parser never produced one)
///
/// Dropping the returned stream drops the response, which releases the
/// underlying transport.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        'read: loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                if done_emitted {
                                    continue;
                                }
                                done_emitted = true;
                                yield event;
                                break 'read;
                            }
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed -- flush any trailing partial line.
                    if !buffer.trim().is_empty() {
                        buffer.push('\n');
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                    if done_emitted {
                                        continue;
                                    }
                                    done_emitted = true;
                                }
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
