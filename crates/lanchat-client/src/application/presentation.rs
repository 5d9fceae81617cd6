//! The presentation seam: where decoded events go.
//!
//! The receive loop never prints anything itself.  It turns each frame into
//! an [`IncomingEvent`] and hands it to an [`EventSink`].  The terminal
//! client plugs in a console renderer; tests plug in a [`ChannelSink`] or a
//! `MockEventSink`.

use lanchat_core::{ChatEvent, EventError, EventKind};
use tokio::sync::mpsc;

/// One relayed event, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub kind: EventKind,
    /// Sender of a text line, the subject of a join/leave, or `SERVER`.
    pub username: String,
    /// The body of a text line, or the description of a system event.
    pub text: String,
}

impl IncomingEvent {
    /// Decodes a relayed payload (`username:body`, split at the first `:`).
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingDelimiter`] for a payload without `:`.
    pub fn from_payload(payload: &str) -> Result<Self, EventError> {
        Ok(ChatEvent::from_payload(payload)?.into())
    }
}

impl From<ChatEvent> for IncomingEvent {
    fn from(event: ChatEvent) -> Self {
        Self {
            kind: event.kind(),
            username: event.username().to_string(),
            text: event.description(),
        }
    }
}

/// Receives everything the session decodes.
///
/// Called from the receive loop task, so implementations must be cheap and
/// must not block for long.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn render(&self, kind: EventKind, username: &str, text: &str);

    /// The server closed the connection or it failed.  Not called after a
    /// local `disconnect()`.
    fn disconnected(&self);
}

/// What a [`ChannelSink`] forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    Event(IncomingEvent),
    Disconnected,
}

/// Forwards every event into an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn render(&self, kind: EventKind, username: &str, text: &str) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.tx.send(SinkMessage::Event(IncomingEvent {
            kind,
            username: username.to_string(),
            text: text.to_string(),
        }));
    }

    fn disconnected(&self) {
        let _ = self.tx.send(SinkMessage::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_decodes_sender_and_body() {
        let event = IncomingEvent::from_payload("bob:see you at 10:00").unwrap();
        assert_eq!(
            event,
            IncomingEvent {
                kind: EventKind::Text,
                username: "bob".into(),
                text: "see you at 10:00".into(),
            }
        );
    }

    #[test]
    fn test_join_payload_names_the_participant() {
        let event = IncomingEvent::from_payload("SERVER:carol joined the chat").unwrap();
        assert_eq!(event.kind, EventKind::Joined);
        assert_eq!(event.username, "carol");
        assert_eq!(event.text, "carol joined the chat");
    }

    #[test]
    fn test_notice_comes_from_server() {
        let event = IncomingEvent::from_payload("SERVER:server shutting down").unwrap();
        assert_eq!(event.kind, EventKind::Notice);
        assert_eq!(event.username, "SERVER");
    }

    #[test]
    fn test_payload_without_delimiter_is_error() {
        assert!(IncomingEvent::from_payload("garbage").is_err());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        // Arrange
        let (sink, mut rx) = ChannelSink::channel();

        // Act
        sink.render(EventKind::Text, "a", "1");
        sink.disconnected();

        // Assert
        assert_eq!(
            rx.recv().await,
            Some(SinkMessage::Event(IncomingEvent {
                kind: EventKind::Text,
                username: "a".into(),
                text: "1".into(),
            }))
        );
        assert_eq!(rx.recv().await, Some(SinkMessage::Disconnected));
    }
}
