//! Authentication handshake as an explicit state machine
//!
//! `AwaitingGreeting -> AwaitingAuthResult -> Subscribing -> Streaming`
//!
//! [`transition`] is a pure function of the current state and the inbound frame,
//! so every path can be tested without a socket. [`Handshake`] wraps it with the
//! per-attempt data (token, message id counter).

use super::error::AuthError;
use super::protocol::{InboundKind, OutboundMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingGreeting,
    AwaitingAuthResult,
    /// `subscribe_events` produced, not yet written
    Subscribing,
    Streaming,
}

/// What to do with the frame that caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Not an event, nothing to hand to the decoder
    Drop,
    /// Typed `event` frame
    Event,
    /// Untyped/unknown frame whose text mentions "event". Lenient path for
    /// peers that do not follow the protocol; the decoder still validates it.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: HandshakeState,
    pub outgoing: Option<OutboundMessage>,
    pub delivery: Delivery,
    pub fatal: Option<AuthError>,
}

impl Transition {
    fn stay(state: HandshakeState) -> Self {
        Self {
            next: state,
            outgoing: None,
            delivery: Delivery::Drop,
            fatal: None,
        }
    }

    fn fail(state: HandshakeState, error: AuthError) -> Self {
        Self {
            fatal: Some(error),
            ..Self::stay(state)
        }
    }
}

/// Pure step function.
///
/// `next_id` is the id the next `subscribe_events` would carry.
pub fn transition(
    state: HandshakeState,
    kind: &InboundKind,
    raw_text: &str,
    token: Option<&str>,
    next_id: u64,
) -> Transition {
    match (state, kind) {
        (HandshakeState::AwaitingGreeting, InboundKind::AuthRequired) => match token {
            Some(token) => Transition {
                next: HandshakeState::AwaitingAuthResult,
                outgoing: Some(OutboundMessage::Auth {
                    access_token: token.to_string(),
                }),
                delivery: Delivery::Drop,
                fatal: None,
            },
            None => Transition::fail(state, AuthError::MissingToken),
        },
        (HandshakeState::AwaitingAuthResult, InboundKind::AuthOk) => Transition {
            next: HandshakeState::Subscribing,
            outgoing: Some(OutboundMessage::subscribe(next_id)),
            delivery: Delivery::Drop,
            fatal: None,
        },
        (_, InboundKind::AuthInvalid) => Transition::fail(state, AuthError::InvalidToken),
        (HandshakeState::Streaming, InboundKind::Event) => Transition {
            delivery: Delivery::Event,
            ..Transition::stay(state)
        },
        (HandshakeState::Streaming, InboundKind::Other(_) | InboundKind::Untyped)
            if raw_text.contains("event") =>
        {
            Transition {
                delivery: Delivery::Fallback,
                ..Transition::stay(state)
            }
        }
        _ => Transition::stay(state),
    }
}

/// Per-attempt handshake driver. Message ids start at 1 for every attempt.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    token: Option<String>,
    next_id: u64,
}

impl Handshake {
    pub fn new(token: Option<String>) -> Self {
        Self {
            state: HandshakeState::AwaitingGreeting,
            token,
            next_id: 1,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == HandshakeState::Streaming
    }

    /// Feed one inbound text frame.
    pub fn on_frame(&mut self, text: &str) -> Transition {
        let kind = InboundKind::classify(text);
        let step = transition(self.state, &kind, text, self.token.as_deref(), self.next_id);
        if matches!(step.outgoing, Some(OutboundMessage::SubscribeEvents { .. })) {
            self.next_id += 1;
        }
        self.state = step.next;
        step
    }

    /// The subscribe frame went out; the session now streams events.
    pub fn mark_subscribed(&mut self) {
        if self.state == HandshakeState::Subscribing {
            self.state = HandshakeState::Streaming;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTH_REQUIRED: &str = r#"{"type":"auth_required","ha_version":"2024.6.0"}"#;
    const AUTH_OK: &str = r#"{"type":"auth_ok"}"#;
    const AUTH_INVALID: &str = r#"{"type":"auth_invalid","message":"Invalid access token"}"#;
    const EVENT: &str = r#"{"id":1,"type":"event","event":{"data":{"title":"x"}}}"#;

    fn streaming() -> Handshake {
        let mut hs = Handshake::new(Some("token".to_string()));
        hs.on_frame(AUTH_REQUIRED);
        hs.on_frame(AUTH_OK);
        hs.mark_subscribed();
        hs
    }

    #[test]
    fn test_greeting_sends_auth() {
        let mut hs = Handshake::new(Some("token".to_string()));
        let step = hs.on_frame(AUTH_REQUIRED);
        assert_eq!(step.next, HandshakeState::AwaitingAuthResult);
        assert_eq!(
            step.outgoing,
            Some(OutboundMessage::Auth { access_token: "token".to_string() })
        );
        assert!(step.fatal.is_none());
    }

    #[test]
    fn test_greeting_without_token_is_fatal() {
        let mut hs = Handshake::new(None);
        let step = hs.on_frame(AUTH_REQUIRED);
        assert_eq!(step.fatal, Some(AuthError::MissingToken));
        assert!(step.outgoing.is_none());
    }

    #[test]
    fn test_auth_ok_subscribes_then_streams() {
        let mut hs = Handshake::new(Some("token".to_string()));
        hs.on_frame(AUTH_REQUIRED);
        let step = hs.on_frame(AUTH_OK);
        assert_eq!(step.next, HandshakeState::Subscribing);
        assert_eq!(step.outgoing, Some(OutboundMessage::subscribe(1)));
        assert!(!hs.is_streaming());

        hs.mark_subscribed();
        assert!(hs.is_streaming());
    }

    #[test]
    fn test_auth_invalid_is_fatal() {
        let mut hs = Handshake::new(Some("token".to_string()));
        hs.on_frame(AUTH_REQUIRED);
        let step = hs.on_frame(AUTH_INVALID);
        assert_eq!(step.fatal, Some(AuthError::InvalidToken));
    }

    #[test]
    fn test_events_forwarded_only_while_streaming() {
        let mut hs = Handshake::new(Some("token".to_string()));
        assert_eq!(hs.on_frame(EVENT).delivery, Delivery::Drop);

        let mut hs = streaming();
        assert_eq!(hs.on_frame(EVENT).delivery, Delivery::Event);
    }

    #[test]
    fn test_fallback_for_untyped_frames_mentioning_event() {
        let mut hs = streaming();
        assert_eq!(hs.on_frame(r#"{"kind":"event","data":{}}"#).delivery, Delivery::Fallback);
        assert_eq!(hs.on_frame("raw event text").delivery, Delivery::Fallback);
        assert_eq!(
            hs.on_frame(r#"{"id":1,"type":"result","success":true}"#).delivery,
            Delivery::Drop
        );
    }

    #[test]
    fn test_auth_ok_out_of_order_is_ignored() {
        let mut hs = Handshake::new(Some("token".to_string()));
        let step = hs.on_frame(AUTH_OK);
        assert_eq!(step.next, HandshakeState::AwaitingGreeting);
        assert!(step.outgoing.is_none());
    }

    #[test]
    fn test_message_ids_start_at_one_per_attempt() {
        let first = streaming();
        assert_eq!(first.next_id, 2);
        let second = Handshake::new(Some("token".to_string()));
        assert_eq!(second.next_id, 1);
    }

    #[test]
    fn test_pure_transition_table() {
        let step = transition(
            HandshakeState::Streaming,
            &InboundKind::AuthRequired,
            AUTH_REQUIRED,
            Some("t"),
            5,
        );
        assert_eq!(step, Transition::stay(HandshakeState::Streaming));

        let step = transition(
            HandshakeState::AwaitingAuthResult,
            &InboundKind::AuthOk,
            AUTH_OK,
            Some("t"),
            7,
        );
        assert_eq!(step.outgoing, Some(OutboundMessage::subscribe(7)));
    }
}
