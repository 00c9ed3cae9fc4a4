//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes are buffered until a blank line closes an event block, so chunk
//! boundaries from the transport (including ones inside a multi-byte UTF-8
//! sequence) never split an event.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseChunk {
    pub event: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a block separator.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed transport bytes and return every block they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        // A separator may straddle the previous push, so back up by its length.
        let mut from = self.scanned.saturating_sub(3);
        while let Some((end, sep_len)) = find_block_end(&self.buffer, from) {
            let block: Vec<u8> = self.buffer.drain(..end + sep_len).take(end).collect();
            if let Some(chunk) = parse_block(&String::from_utf8_lossy(&block)) {
                chunks.push(chunk);
            }
            from = 0;
        }
        self.scanned = self.buffer.len();
        chunks
    }

    /// Flush a trailing block the server did not terminate.
    pub fn finish(&mut self) -> Option<SseChunk> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        parse_block(&String::from_utf8_lossy(&rest))
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_block_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_block(block: &str) -> Option<SseChunk> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.trim().to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    let data = (!data_lines.is_empty()).then(|| data_lines.join("\n"));
    Some(SseChunk { event, data })
}
