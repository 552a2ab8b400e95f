use crate::frame::RawMessage;

/// Incremental line-oriented decoder for `text/event-stream` bodies.
///
/// Lines may end in `\r\n`, `\n` or a lone `\r`, and a CRLF pair split across
/// two chunks still counts as one line break. An empty line dispatches the
/// fields gathered so far. Bytes are kept until the line is complete, so a
/// chunk boundary inside a UTF-8 sequence is harmless.
#[derive(Default)]
pub(crate) struct SseDecoder {
    line: Vec<u8>,
    after_cr: bool,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<RawMessage> {
        let mut messages = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => self.end_line(&mut messages),
                b'\r' => {
                    self.end_line(&mut messages);
                    self.after_cr = true;
                }
                _ => self.line.push(byte),
            }
        }
        messages
    }

    /// Flushes a trailing message the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<RawMessage> {
        self.after_cr = false;
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.apply_field(&String::from_utf8_lossy(&line));
        }
        self.dispatch()
    }

    fn end_line(&mut self, messages: &mut Vec<RawMessage>) {
        if self.line.is_empty() {
            messages.extend(self.dispatch());
            return;
        }
        let line = std::mem::take(&mut self.line);
        self.apply_field(&String::from_utf8_lossy(&line));
    }

    fn apply_field(&mut self, line: &str) {
        // comments double as keep-alives
        if line.starts_with(':') {
            return;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` carry nothing the analysis stream uses
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<RawMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(RawMessage {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let part1 = b"data: {\"choices\":[{\"delta\":{\"content\":\"hel";
        let part2 = b"lo\"}}]}\n\ndata: [DO";
        let part3 = b"NE]\n\n";
        assert!(decoder.push_chunk(part1).is_empty());
        let messages = decoder.push_chunk(part2);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].data.contains("hello"));
        assert_eq!(
            decoder.push_chunk(part3),
            vec![RawMessage::data("[DONE]")]
        );
    }

    #[test]
    fn decoder_skips_comments_and_reads_event_names() {
        let mut decoder = SseDecoder::default();
        let messages =
            decoder.push_chunk(b": keep-alive\n\nevent: content\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(messages, vec![RawMessage::named("content", "a\nb")]);
    }

    #[test]
    fn decoder_keeps_leading_whitespace_beyond_the_first_space() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.push_chunk(b"event: content\ndata:  world\n\n");
        assert_eq!(messages[0].data, " world");
    }

    #[test]
    fn mixed_line_endings_each_close_a_message() {
        let mut decoder = SseDecoder::default();
        assert_eq!(
            decoder.push_chunk(b"data: a\n\r\ndata: b\n\r\n"),
            vec![RawMessage::data("a"), RawMessage::data("b")]
        );
        assert_eq!(
            decoder.push_chunk(b"data: c\r\rdata: d\r\r"),
            vec![RawMessage::data("c"), RawMessage::data("d")]
        );
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line_break() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"data: a\r").is_empty());
        assert_eq!(decoder.push_chunk(b"\n\r"), vec![RawMessage::data("a")]);
        assert_eq!(
            decoder.push_chunk(b"\nevent: complete\r\ndata: {}\r\n\r\n"),
            vec![RawMessage::named("complete", "{}")]
        );
    }

    #[test]
    fn event_name_does_not_leak_into_the_next_message() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.push_chunk(b"event: start\n\ndata: x\n\n");
        assert_eq!(messages, vec![RawMessage::data("x")]);
    }

    #[test]
    fn finish_flushes_unterminated_message() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"data: [DONE]\n").is_empty());
        assert_eq!(decoder.finish(), Some(RawMessage::data("[DONE]")));
        assert_eq!(decoder.finish(), None);
    }
}
