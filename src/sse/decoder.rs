//! Record framing over an SSE byte stream.

use bytes::BytesMut;
use futures::StreamExt;
use tracing::debug;

use super::line::{parse_sse_line, SseLine};
use crate::error::{ConsumerError, ConsumerResult};
use crate::operation::{Operation, OperationData};
use crate::traits::ByteStream;

/// Fields collected for the record being read. A fresh one is used for
/// every record so nothing leaks from one record into the next.
#[derive(Debug, Default)]
struct RecordBuilder {
    started: bool,
    id: String,
    event: String,
    data: Option<OperationData>,
    /// Decode failure of the last `data` line
    bad_data: Option<String>,
    /// A line of the record was not UTF-8
    bad_line: Option<String>,
}

impl RecordBuilder {
    fn apply(&mut self, line: SseLine) {
        match line {
            SseLine::Empty | SseLine::Comment(_) => return,
            SseLine::Id(id) => self.id = id,
            SseLine::Event(event) => self.event = event,
            // The oplog never splits a payload over several data lines
            SseLine::Data(data) => match serde_json::from_str::<OperationData>(&data) {
                Ok(parsed) => {
                    self.data = Some(parsed);
                    self.bad_data = None;
                }
                Err(e) => {
                    self.data = None;
                    self.bad_data = Some(e.to_string());
                }
            },
            SseLine::Unknown { .. } => {}
        }
        self.started = true;
    }

    fn finish(self) -> ConsumerResult<Operation> {
        if self.event.is_empty() {
            return Err(ConsumerError::IncompleteEvent);
        }
        if let Some(reason) = self.bad_line.or(self.bad_data) {
            return Err(ConsumerError::InvalidEvent { reason });
        }

        let op = Operation {
            id: self.id,
            event: self.event,
            data: self.data,
        };
        if !op.is_valid() {
            return Err(ConsumerError::invalid_event(format!(
                "missing data for event {}",
                op.event
            )));
        }
        Ok(op)
    }
}

/// Decodes oplog operations from one connection's event stream.
///
/// A decoder is bound to a single response body. Once it has returned an
/// error the connection is unusable and a new decoder has to be built for
/// the next connection.
pub struct Decoder {
    body: ByteStream,
    buffer: BytesMut,
    /// Bytes at the head of `buffer` already known to hold no newline
    scanned: usize,
}

impl Decoder {
    /// Create a decoder reading from the given response body.
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
        }
    }

    /// Read the next operation, waiting until a full record is available.
    ///
    /// Blank lines and comments between records are skipped. Fails with
    /// [`ConsumerError::ConnectionClosed`] if the stream ends or breaks
    /// before the record is complete, [`ConsumerError::IncompleteEvent`] for
    /// a record without `event` field and [`ConsumerError::InvalidEvent`]
    /// for a record that can't be decoded or isn't deliverable.
    pub async fn next(&mut self) -> ConsumerResult<Operation> {
        let mut record = RecordBuilder::default();

        loop {
            let raw = self.next_line().await?;
            if raw.first() == Some(&b':') {
                continue;
            }
            let line = match std::str::from_utf8(&raw) {
                Ok(line) => parse_sse_line(line),
                Err(e) => {
                    // Only a known field can spoil the record
                    let name_len = raw.iter().position(|b| *b == b':').unwrap_or(raw.len());
                    if matches!(&raw[..name_len], b"id" | b"event" | b"data") {
                        record.bad_line = Some(format!("line is not UTF-8: {}", e));
                    }
                    record.started = true;
                    continue;
                }
            };

            if line == SseLine::Empty {
                if record.started {
                    return record.finish();
                }
                continue;
            }
            record.apply(line);
        }
    }

    /// Next line from the stream, without its `\n` or `\r\n` terminator.
    async fn next_line(&mut self) -> ConsumerResult<BytesMut> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.scanned + offset);
            if let Some(pos) = found {
                self.scanned = 0;
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(line);
            }

            self.scanned = self.buffer.len();
            match self.body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    debug!("Event stream read failed: {}", e);
                    return Err(ConsumerError::ConnectionClosed);
                }
                None => {
                    debug!(
                        "Event stream ended with {} unterminated bytes",
                        self.buffer.len()
                    );
                    return Err(ConsumerError::ConnectionClosed);
                }
            }
        }
    }
}
