//! Replay of captured telemetry, one `topic payload` pair per line
//!
//! Blank lines and lines starting with `#` are skipped. Payloads are passed on
//! as raw bytes, so a payload that is not UTF-8 reaches the parser and is
//! dropped there like any other malformed payload.

use super::{TelemetryMessage, TelemetrySource, TransportError, TransportResult};
use std::io::BufRead;

pub struct LineSource<R> {
    id: String,
    reader: R,
    line: usize,
    exhausted: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(id: impl Into<String>, reader: R) -> Self {
        Self {
            id: id.into(),
            reader,
            line: 0,
            exhausted: false,
        }
    }

    /// Whether the reader has hit end of input
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> TelemetrySource for LineSource<R> {
    fn poll_message(&mut self) -> TransportResult<Option<TelemetryMessage>> {
        let mut buffer = Vec::new();
        loop {
            if self.exhausted {
                return Ok(None);
            }

            buffer.clear();
            if self.reader.read_until(b'\n', &mut buffer)? == 0 {
                self.exhausted = true;
                return Ok(None);
            }
            self.line += 1;

            let text = buffer.trim_ascii();
            if text.is_empty() || text.starts_with(b"#") {
                continue;
            }

            let Some(split) = text.iter().position(|b| b.is_ascii_whitespace()) else {
                return Err(TransportError::MalformedFrame {
                    line: self.line,
                    reason: format!("no payload after topic '{}'", String::from_utf8_lossy(text)),
                });
            };
            let (topic, payload) = text.split_at(split);
            let Ok(topic) = std::str::from_utf8(topic) else {
                return Err(TransportError::MalformedFrame {
                    line: self.line,
                    reason: "topic is not valid UTF-8".to_string(),
                });
            };

            return Ok(Some(TelemetryMessage::new(topic, payload.trim_ascii())));
        }
    }

    fn is_connected(&self) -> bool {
        !self.exhausted
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_topic_and_payload() {
        let input = "# capture\n\nBEACON1 TAG1:1.5\nble   AA:BB:CC:DD:EE:01,TAG2,0.7  \n";
        let mut source = LineSource::new("capture", Cursor::new(input));

        let first = source.poll_message().unwrap().unwrap();
        assert_eq!(first.topic, "BEACON1");
        assert_eq!(first.payload, b"TAG1:1.5".to_vec());

        let second = source.poll_message().unwrap().unwrap();
        assert_eq!(second.topic, "ble");
        assert_eq!(second.payload, b"AA:BB:CC:DD:EE:01,TAG2,0.7".to_vec());

        assert!(source.poll_message().unwrap().is_none());
        assert!(source.is_exhausted());
        assert!(!source.is_connected());
        assert_eq!(source.lines_read(), 4);
    }

    #[test]
    fn test_line_without_payload() {
        let mut source = LineSource::new("capture", Cursor::new("BEACON1\nBEACON2 TAG1:2.0\n"));

        match source.poll_message() {
            Err(TransportError::MalformedFrame { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected malformed frame, got {other:?}"),
        }
        // The stream continues after a bad line.
        assert_eq!(source.poll_message().unwrap().unwrap().topic, "BEACON2");
    }

    #[test]
    fn test_binary_payload_passed_through() {
        let input: &[u8] = b"BEACON1 TAG1:\xff\xfe\nBEACON2 TAG1:2.0\n";
        let mut source = LineSource::new("capture", Cursor::new(input));

        let first = source.poll_message().unwrap().unwrap();
        assert_eq!(first.topic, "BEACON1");
        assert_eq!(first.payload, b"TAG1:\xff\xfe".to_vec());
        assert_eq!(source.poll_message().unwrap().unwrap().payload, b"TAG1:2.0".to_vec());
    }

    #[test]
    fn test_binary_topic_is_malformed_frame() {
        let input: &[u8] = b"\xffBEACON TAG1:1.0\nBEACON2 TAG1:2.0\n";
        let mut source = LineSource::new("capture", Cursor::new(input));

        let err = source.poll_message().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(source.poll_message().unwrap().unwrap().topic, "BEACON2");
    }
}
