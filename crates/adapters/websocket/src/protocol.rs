//! Hub websocket messages.
//!
//! Every message is a JSON object tagged by `type`. Only the subset the
//! mirror needs is modelled; anything else decodes as [`Inbound::Other`].

use serde::{Deserialize, Serialize};

use hamirror_domain::delta::DeltaMessage;
use hamirror_domain::entity::EntityId;

/// Messages sent to the hub.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound<'a> {
    Auth {
        access_token: &'a str,
    },
    SubscribeEntities {
        id: u64,
        entity_ids: &'a [EntityId],
    },
    UnsubscribeEvents {
        id: u64,
        subscription: u64,
    },
    Ping {
        id: u64,
    },
}

impl Outbound<'_> {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages received from the hub.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        error: Option<ResultError>,
    },
    /// A frame for the subscription whose request carried `id`.
    Event { id: u64, event: DeltaMessage },
    Pong { id: u64 },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthOk { .. } => "auth_ok",
            Self::AuthInvalid { .. } => "auth_invalid",
            Self::Result { .. } => "result",
            Self::Event { .. } => "event",
            Self::Pong { .. } => "pong",
            Self::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn as_json(message: &Outbound<'_>) -> Value {
        serde_json::from_str(&message.to_text().unwrap()).unwrap()
    }

    #[test]
    fn should_serialize_auth() {
        assert_eq!(
            as_json(&Outbound::Auth { access_token: "abc" }),
            json!({"type": "auth", "access_token": "abc"})
        );
    }

    #[test]
    fn should_serialize_subscribe_with_explicit_entity_ids() {
        let ids = [EntityId::parse("binary_sensor.front_door").unwrap()];
        assert_eq!(
            as_json(&Outbound::SubscribeEntities { id: 3, entity_ids: &ids }),
            json!({"id": 3, "type": "subscribe_entities", "entity_ids": ["binary_sensor.front_door"]})
        );
    }

    #[test]
    fn should_serialize_ping_and_parse_pong() {
        assert_eq!(
            as_json(&Outbound::Ping { id: 7 }),
            json!({"id": 7, "type": "ping"})
        );
        let pong = Inbound::parse(r#"{"id": 7, "type": "pong"}"#).unwrap();
        assert!(matches!(pong, Inbound::Pong { id: 7 }));
    }

    #[test]
    fn should_serialize_unsubscribe() {
        assert_eq!(
            as_json(&Outbound::UnsubscribeEvents { id: 4, subscription: 3 }),
            json!({"id": 4, "type": "unsubscribe_events", "subscription": 3})
        );
    }

    #[test]
    fn should_parse_handshake_messages() {
        let required = Inbound::parse(r#"{"type":"auth_required","ha_version":"2024.6.0"}"#).unwrap();
        assert!(matches!(required, Inbound::AuthRequired { ha_version: Some(v) } if v == "2024.6.0"));

        let invalid = Inbound::parse(r#"{"type":"auth_invalid","message":"Invalid password"}"#).unwrap();
        assert!(matches!(invalid, Inbound::AuthInvalid { message: Some(m) } if m == "Invalid password"));
    }

    #[test]
    fn should_parse_failed_result() {
        let text = r#"{"id":2,"type":"result","success":false,"error":{"code":"unknown_command","message":"Unknown command."}}"#;
        let Inbound::Result { id, success, error } = Inbound::parse(text).unwrap() else {
            panic!("expected result");
        };
        assert_eq!(id, 2);
        assert!(!success);
        assert_eq!(error.unwrap().code, "unknown_command");
    }

    #[test]
    fn should_parse_entity_event() {
        let text = r#"{"id":1,"type":"event","event":{"c":{"binary_sensor.front_door":{"+":{"s":"off","lc":1700000000.5}}}}}"#;
        let Inbound::Event { id, event } = Inbound::parse(text).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(id, 1);
        assert_eq!(event.changed.len(), 1);
        assert!(event.added.is_empty());
    }

    #[test]
    fn should_parse_unmodelled_message_as_other() {
        let other = Inbound::parse(r#"{"id":9,"type":"pong"}"#).unwrap();
        assert!(matches!(other, Inbound::Other));
        assert_eq!(other.kind(), "other");
    }
}
