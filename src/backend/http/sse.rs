use bytes::BytesMut;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental `text/event-stream` decoder. Only `data` fields matter to us;
/// `event`, `id`, `retry` and comment lines are consumed and ignored.
///
/// Lines may end in `\n`, `\r\n` or a lone `\r`. A leading byte order mark
/// is dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    data: Vec<String>,
    bom_checked: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk and returns the payloads of every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        if !self.strip_bom() {
            return events;
        }
        while let Some((len, eol)) = self.next_line() {
            let raw = self.buf.split_to(len + eol);
            let line = String::from_utf8_lossy(&raw[..len]);
            if let Some(ev) = self.process_line(&line) {
                events.push(ev);
            }
        }
        events
    }

    /// False while the buffer is still too short to tell whether it opens with a BOM.
    fn strip_bom(&mut self) -> bool {
        if self.bom_checked {
            return true;
        }
        if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf[..]) {
            return false;
        }
        if self.buf.starts_with(BOM) {
            let _ = self.buf.split_to(BOM.len());
        }
        self.bom_checked = true;
        true
    }

    /// Length of the next complete line and of its terminator. A trailing `\r`
    /// waits for the next chunk since it may be the first half of `\r\n`.
    fn next_line(&self) -> Option<(usize, usize)> {
        let pos = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        match (self.buf[pos], self.buf.get(pos + 1).copied()) {
            (b'\n', _) => Some((pos, 1)),
            (_, Some(b'\n')) => Some((pos, 2)),
            (_, Some(_)) => Some((pos, 1)),
            (_, None) => None,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}
