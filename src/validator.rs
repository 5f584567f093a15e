//! Request validation and the wire shapes of every message.

use serde_json::Value;
use thiserror::Error;

use crate::frame::Frame;
use crate::protocol::ClientMessage;
use crate::schema::{Field, FieldType, SchemaIssues, TaggedUnion, Variant};

/// Name of the discriminant field in both directions.
pub const TAG_FIELD: &str = "message";

const ID: Field = Field::required("id", FieldType::String);
const OPTIONAL_ID: Field = Field::optional("id", FieldType::String);

const CONFIG_FIELDS: &[Field] = &[Field::required("guild", FieldType::String)];

const MESSAGE_CHANNEL: Field = Field::optional("channel_id", FieldType::String);
const MESSAGE_AUTHOR: Field = Field::optional("author_id", FieldType::String);
const MESSAGE_CONTENT: Field = Field::optional("content", FieldType::String);
const MESSAGE_ATTACHMENTS: Field = Field::optional("attachment_urls", FieldType::StringArray);

const USER_NAME: Field = Field::optional("name", FieldType::String);
const USER_DISCRIMINATOR: Field =
    Field::optional("discriminator", FieldType::Integer { min: 0, max: 9999 });
const USER_AVATAR: Field = Field::optional("avatar_url", FieldType::String);

/// Every request a client may send.
pub static CLIENT_MESSAGES: TaggedUnion = TaggedUnion {
    tag_field: TAG_FIELD,
    variants: &[
        Variant {
            tag: "get_config",
            fields: &[ID],
        },
        Variant {
            tag: "update_config",
            fields: &[Field::required("config", FieldType::Object(CONFIG_FIELDS))],
        },
        Variant {
            tag: "save_message",
            fields: &[
                OPTIONAL_ID,
                MESSAGE_CHANNEL,
                MESSAGE_AUTHOR,
                MESSAGE_CONTENT,
                MESSAGE_ATTACHMENTS,
            ],
        },
        Variant {
            tag: "get_message",
            fields: &[ID],
        },
        Variant {
            tag: "save_user",
            fields: &[OPTIONAL_ID, USER_NAME, USER_DISCRIMINATOR, USER_AVATAR],
        },
        Variant {
            tag: "get_user",
            fields: &[ID],
        },
        Variant {
            tag: "put_test_data",
            fields: &[Field::required("data", FieldType::String)],
        },
        Variant {
            tag: "get_test_data",
            fields: &[ID],
        },
    ],
};

/// Outgoing `config` response.
pub static CONFIG_RESPONSE: Variant = Variant {
    tag: "config",
    fields: &[Field::required("config", FieldType::Object(CONFIG_FIELDS))],
};

/// Outgoing `message` response.
pub static MESSAGE_RESPONSE: Variant = Variant {
    tag: "message",
    fields: &[
        ID,
        MESSAGE_CHANNEL,
        MESSAGE_AUTHOR,
        MESSAGE_CONTENT,
        MESSAGE_ATTACHMENTS,
    ],
};

/// Outgoing `user` response.
pub static USER_RESPONSE: Variant = Variant {
    tag: "user",
    fields: &[ID, USER_NAME, USER_DISCRIMINATOR, USER_AVATAR],
};

/// Outgoing `test_data` response.
pub static TEST_DATA_RESPONSE: Variant = Variant {
    tag: "test_data",
    fields: &[ID, Field::required("data", FieldType::String)],
};

/// Why a frame was not accepted as a request.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The frame is not JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    /// The frame is JSON but matches no request shape.
    #[error("{0}")]
    Schema(SchemaIssues),
}

/// Parse a frame and check it against [`CLIENT_MESSAGES`].
pub fn validate(frame: &Frame) -> Result<ClientMessage, ValidationError> {
    let value: Value = serde_json::from_slice(frame.as_bytes()).map_err(ValidationError::Syntax)?;
    CLIENT_MESSAGES
        .check(&value)
        .map_err(ValidationError::Schema)?;
    serde_json::from_value(value)
        .map_err(|e| ValidationError::Schema(SchemaIssues::root(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;
    use crate::protocol::SaveRecord;
    use rstest::rstest;
    use serde_json::json;

    fn frame(text: &str) -> Frame {
        let mut buffer = FrameBuffer::new();
        buffer.feed(text.as_bytes());
        buffer.feed(b"\n");
        buffer.next_frame().expect("a complete frame")
    }

    fn schema_paths(text: &str) -> Vec<String> {
        match validate(&frame(text)) {
            Err(ValidationError::Schema(issues)) => {
                issues.issues().iter().map(|i| i.dotted_path()).collect()
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[rstest]
    #[case(r#"{"message":"get_user","id":"42"}"#, ClientMessage::GetUser { id: "42".into() })]
    #[case(
        r#"{"message":"get_test_data","id":"k"}"#,
        ClientMessage::GetTestData { id: "k".into() }
    )]
    #[case(
        r#"{"message":"put_test_data","data":"blob"}"#,
        ClientMessage::PutTestData { data: "blob".into() }
    )]
    #[case(r#"{"message":"save_message","text":"hi"}"#, ClientMessage::SaveMessage(SaveRecord {
        id: None,
        fields: json!({"text": "hi"}).as_object().cloned().unwrap(),
    }))]
    fn accepts_well_formed_requests(#[case] text: &str, #[case] expected: ClientMessage) {
        assert_eq!(validate(&frame(text)).unwrap(), expected);
    }

    #[test]
    fn update_config_keeps_nested_fields() {
        let message =
            validate(&frame(r#"{"message":"update_config","config":{"guild":"g","prefix":"!"}}"#))
                .unwrap();
        let ClientMessage::UpdateConfig { config } = message else {
            panic!("expected update_config");
        };
        assert_eq!(config.guild, "g");
        assert_eq!(config.fields.get("prefix"), Some(&json!("!")));
    }

    #[rstest]
    #[case("{\"message\":")]
    #[case("not json")]
    #[case("{\"message\":\"get_user\",\"id\":\"1\"} trailing")]
    fn malformed_json_is_a_syntax_error(#[case] text: &str) {
        assert!(matches!(
            validate(&frame(text)),
            Err(ValidationError::Syntax(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_a_syntax_error() {
        let mut buffer = FrameBuffer::new();
        buffer.feed(b"{\"message\":\"get_user\",\"id\":\"\xff\"}\n");
        let frame = buffer.next_frame().unwrap();
        assert!(matches!(validate(&frame), Err(ValidationError::Syntax(_))));
    }

    #[test]
    fn unknown_tag_names_the_discriminant() {
        let err = validate(&frame(r#"{"message":"bogus"}"#)).unwrap_err();
        assert!(err.to_string().contains("Invalid discriminator value"));
        assert_eq!(schema_paths(r#"{"message":"bogus"}"#), vec!["message"]);
    }

    #[test]
    fn every_bad_field_is_reported() {
        assert_eq!(
            schema_paths(
                r#"{"message":"save_user","id":5,"discriminator":"0001","avatar_url":null}"#
            ),
            vec!["id", "discriminator", "avatar_url"]
        );
        assert_eq!(
            schema_paths(r#"{"message":"update_config","config":{"prefix":"!"}}"#),
            vec!["config.guild"]
        );
        assert_eq!(
            schema_paths(r#"{"message":"save_message","attachment_urls":["a",2]}"#),
            vec!["attachment_urls.1"]
        );
    }

    #[test]
    fn schema_error_renders_the_format_tree() {
        let err = validate(&frame(r#"{"message":"get_message"}"#)).unwrap_err();
        let rendered: Value = serde_json::from_str(&err.to_string()).unwrap();
        assert_eq!(rendered, json!({"_errors": [], "id": {"_errors": ["Required"]}}));
    }

    #[test]
    fn response_shapes_check_stored_fields() {
        let good = json!({"message": "user", "id": "1", "discriminator": 42});
        assert!(USER_RESPONSE.check(TAG_FIELD, &good).is_ok());
        let bad = json!({"message": "user", "id": "1", "discriminator": 10000});
        assert!(USER_RESPONSE.check(TAG_FIELD, &bad).is_err());
    }
}
