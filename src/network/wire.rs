//! JSON shapes spoken by the backend.
//!
//! Collections come back as `{"Count": n, "Items": [...]}` and every attribute
//! is wrapped in a typed cell such as `{"S": "value"}`. Timestamps are epoch
//! milliseconds encoded as strings.

use serde::{Deserialize, Serialize};

use crate::common::{Conversation, Group, Message, Person};
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    #[serde(rename = "S")]
    pub s: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Items<T> {
    #[serde(default)]
    pub count: usize,
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct WireGroup {
    pub id: Cell,
    pub name: Cell,
    #[serde(rename = "createdAt")]
    pub created_at: Cell,
    #[serde(rename = "createdBy")]
    pub created_by: Cell,
}

#[derive(Debug, Deserialize)]
pub struct WirePerson {
    pub name: Cell,
    pub uid: Cell,
}

#[derive(Debug, Deserialize)]
pub struct WireConversation {
    pub id: Cell,
    #[serde(rename = "companionID")]
    pub companion_id: Cell,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "authorID")]
    pub author_id: Cell,
    pub message: Cell,
    #[serde(rename = "createdAt")]
    pub created_at: Cell,
}

#[derive(Debug, Deserialize)]
pub struct CreatedGroup {
    #[serde(rename = "groupID")]
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedConversation {
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
}

/// Body of a non-success response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupBody<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateConversationBody<'a> {
    pub companion: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AppendGroupBody<'a> {
    #[serde(rename = "groupID")]
    pub group_id: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AppendConversationBody<'a> {
    #[serde(rename = "conversationID")]
    pub conversation_id: &'a str,
    pub message: &'a str,
}

fn parse_timestamp(field: &str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|err| ApiError::Decode(format!("{field} `{raw}` is not a timestamp: {err}")))
}

impl TryFrom<WireMessage> for Message {
    type Error = ApiError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp("createdAt", &wire.created_at.s)?;
        Ok(Message::new(wire.author_id.s, wire.message.s, created_at))
    }
}

impl TryFrom<WireGroup> for Group {
    type Error = ApiError;

    fn try_from(wire: WireGroup) -> Result<Self, Self::Error> {
        Ok(Group {
            created_at: parse_timestamp("createdAt", &wire.created_at.s)?,
            id: wire.id.s,
            name: wire.name.s,
            created_by: wire.created_by.s,
        })
    }
}

impl From<WirePerson> for Person {
    fn from(wire: WirePerson) -> Self {
        Person {
            uid: wire.uid.s,
            name: wire.name.s,
        }
    }
}

impl From<WireConversation> for Conversation {
    fn from(wire: WireConversation) -> Self {
        Conversation {
            id: wire.id.s,
            companion_id: wire.companion_id.s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_page() {
        let json = r#"{
            "Count": 2,
            "Items": [
                {"authorID": {"S": "u1"}, "message": {"S": "hello"}, "createdAt": {"S": "1700000000100"}},
                {"authorID": {"S": "u2"}, "message": {"S": "hi"}, "createdAt": {"S": "1700000000050"}}
            ]
        }"#;

        let page: Items<WireMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(page.count, 2);

        let messages: Vec<Message> = page
            .items
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(messages[0].author_id, "u1");
        assert_eq!(messages[1].created_at, 1_700_000_000_050);
    }

    #[test]
    fn test_bad_timestamp_is_decode_error() {
        let wire = WireMessage {
            author_id: Cell { s: "u1".into() },
            message: Cell { s: "x".into() },
            created_at: Cell { s: "yesterday".into() },
        };
        assert!(matches!(Message::try_from(wire), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_decode_group_and_conversation() {
        let group: WireGroup = serde_json::from_str(
            r#"{"id": {"S": "g1"}, "name": {"S": "Rustaceans"}, "createdAt": {"S": "10"}, "createdBy": {"S": "u1"}}"#,
        )
        .unwrap();
        let group = Group::try_from(group).unwrap();
        assert_eq!(group.name, "Rustaceans");
        assert_eq!(group.created_at, 10);

        let conversation: WireConversation =
            serde_json::from_str(r#"{"id": {"S": "c1"}, "companionID": {"S": "u9"}}"#).unwrap();
        assert_eq!(Conversation::from(conversation).companion_id, "u9");
    }

    #[test]
    fn test_error_body_is_lenient() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"type": "InvalidIDException", "message": "no such group"}"#)
                .unwrap();
        assert_eq!(body.kind.as_deref(), Some("InvalidIDException"));
        assert_eq!(body.message.as_deref(), Some("no such group"));

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(empty.message.is_none());
    }
}
