//! Server-Sent Events (SSE) parser.

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (from `event:` line), if present.
    pub event: Option<String>,
    /// Event data; multiple `data:` lines are joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// The OpenAI-style end-of-stream sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Incremental SSE parser. Buffers partial frames across network chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of data and return every event it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(chunk);
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = Self::parse_event(&frame) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing frame that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let frame = std::mem::take(&mut self.buffer);
        Self::parse_event(&frame)
    }

    fn parse_event(text: &str) -> Option<SseEvent> {
        let mut event = None;
        let mut data = Vec::new();

        for line in text.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push(value.strip_prefix(' ').unwrap_or(value));
            }
        }

        if data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: data.join("\n"),
        })
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_chunk_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].event.is_none());
        assert!(events[0].data.contains("\"Hi\""));
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: {\"a\":").is_empty());
        assert!(parser.has_pending());
        let events = parser.feed("1}\n\ndata: [DONE]\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[1].is_done());
        assert!(!parser.has_pending());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: delta\r\ndata: one\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].data, "one");
    }

    #[test]
    fn test_comments_and_keepalives_skipped() {
        let mut parser = SseParser::new();
        let events = parser.feed(": keep-alive\n\n: ping\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: [DONE]").is_empty());
        let last = parser.finish().unwrap();
        assert!(last.is_done());
        assert!(parser.finish().is_none());
    }
}
