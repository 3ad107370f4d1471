//! Server-sent events wire parser.
//!
//! [`SseReader`] turns any [`BufRead`] into a blocking iterator of
//! [`SseEvent`]s following the EventSource parsing rules:
//!
//! ```text
//! : comment line, ignored
//! event: message          <- sets the event type
//! id: [{"topic":...}]     <- sets the last event id (kept across events)
//! data: {"type":"edit",   <- data lines are joined with '\n'
//! data:  "wiki":"enwiki"}
//!                         <- a blank line dispatches the event
//! ```
//!
//! Lines may end in LF, CRLF or a lone CR. A leading UTF-8 BOM is skipped,
//! and an event that is not terminated by a blank line before EOF is dropped.

use std::io::{self, BufRead};

/// Event type used when the stream does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest line accepted before the stream is treated as corrupt.
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, `message` unless the stream set one.
    pub event: String,

    /// Payload, data lines joined with `\n`.
    pub data: String,

    /// Last event id seen on the stream at dispatch time.
    pub id: Option<String>,

    /// Reconnection time in milliseconds, if the server sent one.
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

/// Blocking SSE parser over a buffered reader.
pub struct SseReader<R> {
    reader: R,
    line_buf: Vec<u8>,
    skip_lf: bool,
    event_type: String,
    data: String,
    last_event_id: Option<String>,
    retry: Option<u64>,
    at_start: bool,
    finished: bool,
    bytes_read: usize,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: Vec::with_capacity(4096),
            skip_lf: false,
            event_type: String::new(),
            data: String::new(),
            last_event_id: None,
            retry: None,
            at_start: true,
            finished: false,
            bytes_read: 0,
        }
    }

    /// Total bytes consumed from the underlying reader.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Read the next complete line, without its terminator.
    ///
    /// Lines end at LF, CRLF or a lone CR. The LF of a CRLF pair is skipped
    /// on the following call, so a CR-terminated line is returned without
    /// waiting for more input.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.line_buf.clear();

        loop {
            let (complete, used) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    // EOF: a partial line is incomplete and dropped.
                    return Ok(None);
                }

                let mut start = 0;
                if self.skip_lf {
                    self.skip_lf = false;
                    if available[0] == b'\n' {
                        start = 1;
                    }
                }

                let rest = &available[start..];
                match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(end) => {
                        self.line_buf.extend_from_slice(&rest[..end]);
                        self.skip_lf = rest[end] == b'\r';
                        (true, start + end + 1)
                    }
                    None => {
                        self.line_buf.extend_from_slice(rest);
                        (false, available.len())
                    }
                }
            };
            self.reader.consume(used);
            self.bytes_read += used;

            if self.line_buf.len() > MAX_LINE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("SSE line exceeds {MAX_LINE_BYTES} bytes"),
                ));
            }

            if complete {
                break;
            }
        }

        let mut bytes = self.line_buf.as_slice();
        if self.at_start {
            self.at_start = false;
            bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        }
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Apply one line to the event being built, returning it when dispatched.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse()
                {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            event: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = io::Result<SseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.next_line() {
                Ok(Some(line)) => {
                    if let Some(event) = self.process_line(&line) {
                        return Some(Ok(event));
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn parse(input: &str) -> Vec<SseEvent> {
        SseReader::new(input.as_bytes())
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_single_message() {
        let events = parse("data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
        assert!(events[0].is_message());
        assert_eq!(events[0].id, None);
    }

    #[test]
    fn test_multiline_data_joined() {
        let events = parse("data: first\ndata: second\ndata:third\n\n");
        assert_eq!(events[0].data, "first\nsecond\nthird");
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let events = parse("data:  two spaces\n\n");
        assert_eq!(events[0].data, " two spaces");
    }

    #[test]
    fn test_comments_ignored() {
        let events = parse(": keepalive\n\n:another\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_custom_event_type_and_reset() {
        let events = parse("event: error\ndata: boom\n\ndata: ok\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "error");
        assert!(!events[0].is_message());
        assert_eq!(events[1].event, "message");
    }

    #[test]
    fn test_id_persists_across_events() {
        let events = parse("id: 1\ndata: a\n\ndata: b\n\nid: 2\ndata: c\n\n");
        assert_eq!(events[0].id.as_deref(), Some("1"));
        assert_eq!(events[1].id.as_deref(), Some("1"));
        assert_eq!(events[2].id.as_deref(), Some("2"));
    }

    #[test]
    fn test_id_with_nul_ignored() {
        let events = parse("id: ok\ndata: a\n\nid: bad\0id\ndata: b\n\n");
        assert_eq!(events[1].id.as_deref(), Some("ok"));
    }

    #[test]
    fn test_retry_parsing() {
        let events = parse("retry: 5000\ndata: a\n\nretry: soon\ndata: b\n\n");
        assert_eq!(events[0].retry, Some(5000));
        assert_eq!(events[1].retry, Some(5000));
    }

    #[test]
    fn test_event_without_data_not_dispatched() {
        let events = parse("event: ping\n\nid: 3\n\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn test_empty_data_field_dispatches_empty_payload() {
        let events = parse("data\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = parse("event: message\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_lone_cr_line_endings() {
        let events = parse("data: a\rdata: b\r\rdata: c\r\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[1].data, "c");
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let input = "data: a\r\ndata: b\r\n\r\ndata: c\r\n\r\n";
        let reader = io::BufReader::with_capacity(1, input.as_bytes());
        let events: Vec<SseEvent> = SseReader::new(reader)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[1].data, "c");
    }

    #[test]
    fn test_cr_terminated_event_dispatched_without_more_input() {
        let input = io::Cursor::new(b"data: a\r\r".to_vec()).chain(FailingReader);
        let mut reader = SseReader::new(io::BufReader::new(input));

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.data, "a");
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn test_overlong_line_is_error() {
        let input = format!("data: {}\n\n", "x".repeat(MAX_LINE_BYTES));
        let mut reader = SseReader::new(input.as_bytes());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_leading_bom_skipped() {
        let events = parse("\u{FEFF}data: bom\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "bom");
    }

    #[test]
    fn test_unterminated_event_dropped() {
        let events = parse("data: complete\n\ndata: partial\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "complete");

        let events = parse("data: no newline at all");
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let events = parse("foo: bar\ndata: x\nbaz\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_json_payload_with_colons() {
        let events = parse("data: {\"a\":\"b:c\"}\n\n");
        assert_eq!(events[0].data, "{\"a\":\"b:c\"}");
    }

    #[test]
    fn test_bytes_read_counts_input() {
        let input = "data: a\n\ndata: b\n\n";
        let mut reader = SseReader::new(input.as_bytes());
        while reader.next().is_some() {}
        assert_eq!(reader.bytes_read(), input.len());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_read_error_propagates_then_ends() {
        let mut reader = SseReader::new(io::BufReader::new(FailingReader));
        let first = reader.next().unwrap();
        assert_eq!(first.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
        assert!(reader.next().is_none());
    }
}
