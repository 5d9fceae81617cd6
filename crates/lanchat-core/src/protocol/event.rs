//! Chat events and their text payload convention.
//!
//! Every relayed frame carries one UTF-8 line of the form
//! `<username>:<body>`.  Server-originated events use the reserved username
//! [`SYSTEM_USERNAME`], so a single text channel carries both chat and
//! control traffic:
//!
//! ```text
//! alice:hello there          Text  { username: "alice", body: "hello there" }
//! SERVER:alice joined the chat   Joined("alice")
//! SERVER:alice left the chat     Left("alice")
//! SERVER:server shutting down    Notice("server shutting down")
//! ```
//!
//! Only the first `:` is a delimiter; the body may contain more of them.

use thiserror::Error;

/// Username reserved for server-originated events.
pub const SYSTEM_USERNAME: &str = "SERVER";

/// Separates the username from the body in a payload.
pub const FIELD_DELIMITER: char = ':';

const JOINED_SUFFIX: &str = " joined the chat";
const LEFT_SUFFIX: &str = " left the chat";

/// Errors produced when a payload does not follow the convention.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("payload has no ':' delimiter: {0:?}")]
    MissingDelimiter(String),
}

/// Coarse classification handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Joined,
    Left,
    Text,
    Notice,
}

/// One event flowing through the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A participant completed the handshake.
    Joined(String),
    /// A participant's connection closed.
    Left(String),
    /// A line of chat text.
    Text { username: String, body: String },
    /// A free-form notice from the server itself.
    Notice(String),
}

impl ChatEvent {
    pub fn text(username: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Text {
            username: username.into(),
            body: body.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Joined(_) => EventKind::Joined,
            ChatEvent::Left(_) => EventKind::Left,
            ChatEvent::Text { .. } => EventKind::Text,
            ChatEvent::Notice(_) => EventKind::Notice,
        }
    }

    /// The participant the event is about, or [`SYSTEM_USERNAME`] for notices.
    pub fn username(&self) -> &str {
        match self {
            ChatEvent::Joined(name) | ChatEvent::Left(name) => name,
            ChatEvent::Text { username, .. } => username,
            ChatEvent::Notice(_) => SYSTEM_USERNAME,
        }
    }

    /// Human-readable text for the event.
    ///
    /// For `Text` this is the body; for the others it is the description the
    /// server puts on the wire.
    pub fn description(&self) -> String {
        match self {
            ChatEvent::Joined(name) => format!("{name}{JOINED_SUFFIX}"),
            ChatEvent::Left(name) => format!("{name}{LEFT_SUFFIX}"),
            ChatEvent::Text { body, .. } => body.clone(),
            ChatEvent::Notice(text) => text.clone(),
        }
    }

    /// Renders the event as a frame payload.
    pub fn to_payload(&self) -> String {
        match self {
            ChatEvent::Text { username, body } => format!("{username}{FIELD_DELIMITER}{body}"),
            _ => format!(
                "{SYSTEM_USERNAME}{FIELD_DELIMITER}{}",
                self.description()
            ),
        }
    }

    /// Parses a frame payload back into an event.
    ///
    /// A payload whose username is [`SYSTEM_USERNAME`] becomes `Joined`,
    /// `Left` or `Notice` depending on its description.  Any other username
    /// yields `Text`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingDelimiter`] if the payload has no `:`.
    pub fn from_payload(payload: &str) -> Result<Self, EventError> {
        let (username, rest) = payload
            .split_once(FIELD_DELIMITER)
            .ok_or_else(|| EventError::MissingDelimiter(payload.to_string()))?;

        if username != SYSTEM_USERNAME {
            return Ok(ChatEvent::text(username, rest));
        }

        if let Some(name) = rest.strip_suffix(JOINED_SUFFIX) {
            Ok(ChatEvent::Joined(name.to_string()))
        } else if let Some(name) = rest.strip_suffix(LEFT_SUFFIX) {
            Ok(ChatEvent::Left(name.to_string()))
        } else {
            Ok(ChatEvent::Notice(rest.to_string()))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_prefixes_username() {
        let event = ChatEvent::text("alice", "hi");
        assert_eq!(event.to_payload(), "alice:hi");
    }

    #[test]
    fn test_joined_payload_uses_system_username() {
        let event = ChatEvent::Joined("bob".to_string());
        assert_eq!(event.to_payload(), "SERVER:bob joined the chat");
    }

    #[test]
    fn test_left_payload_uses_system_username() {
        let event = ChatEvent::Left("bob".to_string());
        assert_eq!(event.to_payload(), "SERVER:bob left the chat");
    }

    #[test]
    fn test_parse_text_keeps_later_delimiters_in_body() {
        // Arrange
        let payload = "carol:time is 12:30";

        // Act
        let event = ChatEvent::from_payload(payload).unwrap();

        // Assert
        assert_eq!(event, ChatEvent::text("carol", "time is 12:30"));
    }

    #[test]
    fn test_parse_empty_body_is_text_with_empty_body() {
        let event = ChatEvent::from_payload("dave:").unwrap();
        assert_eq!(event, ChatEvent::text("dave", ""));
        assert_eq!(event.kind(), EventKind::Text);
    }

    #[test]
    fn test_parse_system_join_and_leave() {
        assert_eq!(
            ChatEvent::from_payload("SERVER:erin joined the chat").unwrap(),
            ChatEvent::Joined("erin".to_string())
        );
        assert_eq!(
            ChatEvent::from_payload("SERVER:erin left the chat").unwrap(),
            ChatEvent::Left("erin".to_string())
        );
    }

    #[test]
    fn test_parse_join_of_empty_username() {
        let event = ChatEvent::from_payload("SERVER: joined the chat").unwrap();
        assert_eq!(event, ChatEvent::Joined(String::new()));
    }

    #[test]
    fn test_parse_other_system_text_is_notice() {
        let event = ChatEvent::from_payload("SERVER:server shutting down").unwrap();
        assert_eq!(event, ChatEvent::Notice("server shutting down".to_string()));
        assert_eq!(event.username(), SYSTEM_USERNAME);
    }

    #[test]
    fn test_parse_without_delimiter_fails() {
        let result = ChatEvent::from_payload("no delimiter here");
        assert_eq!(
            result,
            Err(EventError::MissingDelimiter("no delimiter here".to_string()))
        );
    }

    #[test]
    fn test_description_matches_wire_text() {
        assert_eq!(
            ChatEvent::Joined("frank".into()).description(),
            "frank joined the chat"
        );
        assert_eq!(ChatEvent::text("frank", "yo").description(), "yo");
    }
}
