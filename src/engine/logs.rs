use crate::engine::model::{LogLine, LogOrigin};

/// Append-only log sequence for one job. Lines keep arrival order; nothing is
/// merged, dropped, or capped here.
#[derive(Debug, Clone, Default)]
pub struct LogAggregator {
    lines: Vec<LogLine>,
}

impl LogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_local(&mut self, text: impl Into<String>) -> &LogLine {
        self.push(text.into(), LogOrigin::Local)
    }

    pub fn push_stream(&mut self, text: impl Into<String>) -> &LogLine {
        self.push(text.into(), LogOrigin::Stream)
    }

    fn push(&mut self, text: String, origin: LogOrigin) -> &LogLine {
        self.lines.push(LogLine { text, origin });
        &self.lines[self.lines.len() - 1]
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
