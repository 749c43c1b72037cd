//! Session update broadcasting.
//!
//! Each session owns a [`Notifier`]. Views subscribe to it to follow
//! diagnostics, phase changes, outcomes and the session log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt as _};
use uuid::Uuid;

use super::state::Phase;
use crate::models::{Diagnostic, Outcome};

const CHANNEL_CAPACITY: usize = 256;

/// Log level for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A session log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), timestamp: Utc::now() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Something a view should re-render for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SessionUpdate {
    Diagnostics(Vec<Diagnostic>),
    Phase(Phase),
    Outcome(Option<Outcome>),
    Log(LogEntry),
}

/// Broadcasts the updates of one session.
pub struct Notifier {
    session: Uuid,
    sender: broadcast::Sender<SessionUpdate>,
}

impl Notifier {
    pub fn new(session: Uuid) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { session, sender }
    }

    /// Send an update to all subscribers. Nobody listening is fine.
    pub fn publish(&self, update: SessionUpdate) {
        let _ = self.sender.send(update);
    }

    /// Trace and broadcast a log line.
    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(session = %self.session, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(session = %self.session, "{}", entry.message),
            LogLevel::Error => tracing::error!(session = %self.session, "{}", entry.message),
        }
        self.publish(SessionUpdate::Log(entry));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.sender.subscribe()
    }

    /// Updates as a stream; lagged updates are skipped.
    pub fn stream(&self) -> impl Stream<Item = SessionUpdate> {
        BroadcastStream::new(self.subscribe()).filter_map(|result| result.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let notifier = Notifier::new(Uuid::new_v4());
        let mut rx = notifier.subscribe();

        notifier.publish(SessionUpdate::Phase(Phase::Executing));
        notifier.log(LogEntry::success("done"));

        assert_eq!(rx.recv().await.unwrap(), SessionUpdate::Phase(Phase::Executing));
        match rx.recv().await.unwrap() {
            SessionUpdate::Log(entry) => {
                assert_eq!(entry.level, LogLevel::Success);
                assert_eq!(entry.message, "done");
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream() {
        let notifier = Notifier::new(Uuid::new_v4());
        let stream = notifier.stream();
        notifier.publish(SessionUpdate::Outcome(None));
        drop(notifier);

        let updates: Vec<_> = stream.collect().await;
        assert_eq!(updates, vec![SessionUpdate::Outcome(None)]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new(Uuid::new_v4());
        notifier.publish(SessionUpdate::Phase(Phase::Idle));
    }
}
