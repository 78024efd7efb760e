//! Server-Sent Events wire format.
//!
//! Each frame is written as:
//!
//! ```text
//! event: <type>
//! data: <payload>
//! id: <sequence>
//!
//! ```
//!
//! The server encodes frames with [`SseFrame::encode`] and the client reads
//! them back incrementally with [`SseDecoder`].

/// Event name used when a frame carries no `event:` line
pub const DEFAULT_EVENT: &str = "message";

/// A single SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<u64>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>, id: u64) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: Some(id),
        }
    }

    /// Encode the frame into its text form, terminated by a blank line.
    ///
    /// Multi-line payloads are split into several `data:` lines.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + self.event.len() + 32);
        out.push_str("event: ");
        out.push_str(&self.event);
        out.push('\n');
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        if let Some(id) = self.id {
            out.push_str("id: ");
            out.push_str(&id.to_string());
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Incremental SSE decoder.
///
/// Bytes arrive in arbitrary chunks; complete frames are returned as soon
/// as their terminating blank line has been seen.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Parse one blank-line-terminated block. Comment-only blocks yield `None`.
fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = value.parse().ok(),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data: data_lines.join("\n"),
        id,
    })
}
