use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Severity of a progress line, as rendered by the caller's UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Info,
    Success,
    Warning,
    Error,
    Raw,
}

/// One human-readable progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressLine {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub timestamp: DateTime<Utc>,
}

impl ProgressLine {
    pub fn new(kind: ProgressKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Sink the orchestrators push progress into.
///
/// Owned by the caller. Many workers report concurrently, so implementations
/// must accept interleaved writes; order across workers is not meaningful.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, line: ProgressLine);

    fn info(&self, text: &str) {
        self.report(ProgressLine::new(ProgressKind::Info, text));
    }

    fn success(&self, text: &str) {
        self.report(ProgressLine::new(ProgressKind::Success, text));
    }

    fn warning(&self, text: &str) {
        self.report(ProgressLine::new(ProgressKind::Warning, text));
    }

    fn error(&self, text: &str) {
        self.report(ProgressLine::new(ProgressKind::Error, text));
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, line: ProgressLine) {
        match line.kind {
            ProgressKind::Info | ProgressKind::Success => {
                tracing::info!(kind = ?line.kind, "{}", line.text);
            }
            ProgressKind::Warning => tracing::warn!("{}", line.text),
            ProgressKind::Error => tracing::error!("{}", line.text),
            ProgressKind::Raw => tracing::debug!("{}", line.text),
        }
    }
}

/// Forwards every line into an unbounded channel, e.g. to stream to a UI.
///
/// Sends never block; lines reported after the receiver is dropped are
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: UnboundedSender<ProgressLine>,
}

impl ChannelReporter {
    pub fn new(sender: UnboundedSender<ProgressLine>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, line: ProgressLine) {
        let _ = self.sender.send(line);
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _line: ProgressLine) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_reporter_forwards_lines() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ChannelReporter::new(tx);
        reporter.info("searching");
        reporter.warning("fragment missing, retrying with new endpoint");
        drop(reporter);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ProgressKind::Info);
        assert_eq!(first.text, "searching");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ProgressKind::Warning);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn channel_reporter_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelReporter::new(tx).error("nobody listening");
    }

    #[test]
    fn progress_line_serializes_kind_as_type() {
        let line = ProgressLine::new(ProgressKind::Success, "done");
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "success");
        assert_eq!(json["text"], "done");
        assert!(json["timestamp"].is_string());
    }
}
