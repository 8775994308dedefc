//! Server-sent events wire framing.

/// One event on a `text/event-stream` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn new(event: &str, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.to_string()),
            id: None,
            data: data.into(),
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Encode the frame. Multi-line data becomes one `data:` line per line,
    /// which clients join back with `\n`.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 32);
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line.strip_suffix('\r').unwrap_or(line));
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Comment line; ignored by clients but keeps proxies from closing the stream
pub fn keep_alive() -> &'static str {
    ": keep-alive\n\n"
}

/// Parse a `Last-Event-ID` header value into a message cursor
pub fn parse_last_event_id(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|id| *id >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_line() {
        let frame = SseFrame::new("messages", "[1,2]").with_id(42);
        assert_eq!(frame.encode(), "event: messages\nid: 42\ndata: [1,2]\n\n");
    }

    #[test]
    fn test_encode_multi_line_data() {
        let frame = SseFrame {
            event: None,
            id: None,
            data: "first\r\nsecond".to_string(),
        };
        assert_eq!(frame.encode(), "data: first\ndata: second\n\n");
    }

    #[test]
    fn test_parse_last_event_id() {
        assert_eq!(parse_last_event_id(" 17 "), Some(17));
        assert_eq!(parse_last_event_id("-3"), None);
        assert_eq!(parse_last_event_id("abc"), None);
    }
}
