//! Envelope normalization
//!
//! Messages reach a queue either directly or through an SNS topic
//! subscription, in which case the original payload is wrapped in a JSON
//! notification envelope. SNS does not flag wrapped deliveries, so detection
//! is a heuristic: a body that is a JSON object with a non-empty string
//! `Message` field is treated as an envelope. Anything else is passed to the
//! handler untouched.

mod types;

use std::collections::HashMap;

pub use types::{
    AttributeType, EnvelopeAttribute, MessageAttribute, MessageOrigin, NormalizedMessage,
    RawMessage,
};
use types::NotificationEnvelope;

/// Builds the handler-facing view of a raw queue message
///
/// Never fails: a body that does not look like a notification envelope is
/// used verbatim as the content.
#[must_use]
pub fn normalize(raw: &RawMessage) -> NormalizedMessage {
    let (content, attributes, origin) = match unwrap_notification(&raw.body) {
        Some((message, envelope)) => (
            message,
            envelope
                .message_attributes
                .unwrap_or_default()
                .into_iter()
                .map(|(name, attribute)| (name, attribute.value))
                .collect(),
            MessageOrigin::Notification {
                topic_arn: envelope.topic_arn,
            },
        ),
        None => (
            raw.body.clone(),
            direct_attributes(&raw.message_attributes),
            MessageOrigin::Queue,
        ),
    };

    NormalizedMessage {
        content,
        attributes,
        id: raw.message_id.clone(),
        ack_token: raw.ack_token.clone(),
        origin,
        system_attributes: raw.system_attributes.clone(),
    }
}

/// Returns the inner message and the rest of the envelope when `body` is a
/// notification envelope with a non-empty `Message`
fn unwrap_notification(body: &str) -> Option<(String, NotificationEnvelope)> {
    // Structs also deserialize from JSON arrays, so insist on an object first
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if !value.is_object() {
        return None;
    }

    let mut envelope: NotificationEnvelope = serde_json::from_value(value).ok()?;
    let message = envelope.message.take().filter(|m| !m.is_empty())?;

    Some((message, envelope))
}

/// Binary attributes have no string value and are dropped
fn direct_attributes(attributes: &HashMap<String, MessageAttribute>) -> HashMap<String, String> {
    attributes
        .iter()
        .filter_map(|(name, attribute)| {
            attribute
                .string_value
                .as_ref()
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn raw_message(body: &str) -> RawMessage {
        RawMessage {
            body: body.to_string(),
            ack_token: "receipt-handle".to_string(),
            message_id: "message-id".to_string(),
            ..RawMessage::default()
        }
    }

    #[test]
    fn test_direct_message_keeps_body_verbatim() {
        let raw = raw_message(r#"{"content":"fake-content"}"#);

        let message = normalize(&raw);

        assert_eq!(message.content, r#"{"content":"fake-content"}"#);
        assert!(message.attributes.is_empty());
        assert_eq!(message.origin, MessageOrigin::Queue);
        assert_eq!(message.id, "message-id");
        assert_eq!(message.ack_token, "receipt-handle");
    }

    #[test]
    fn test_direct_message_uses_native_attributes() {
        let mut raw = raw_message(r#"{"content": "fake-content"}"#);
        raw.message_attributes
            .insert("attribute1".to_string(), MessageAttribute::string("value1"));
        raw.message_attributes.insert(
            "count".to_string(),
            MessageAttribute {
                data_type: "Number".to_string(),
                string_value: Some("42".to_string()),
            },
        );
        raw.message_attributes.insert(
            "thumbnail".to_string(),
            MessageAttribute {
                data_type: "Binary".to_string(),
                string_value: None,
            },
        );

        let message = normalize(&raw);

        let expected = HashMap::from([
            ("attribute1".to_string(), "value1".to_string()),
            ("count".to_string(), "42".to_string()),
        ]);
        assert_eq!(message.attributes, expected);
    }

    #[test]
    fn test_notification_message_is_unwrapped() {
        let raw = raw_message(
            r#"{"Message":"{\"asda\":\"asdas\"}","MessageAttributes":{"attribute1":{"Type":"String","Value":"value1"}}}"#,
        );

        let message = normalize(&raw);

        assert_eq!(message.content, r#"{"asda":"asdas"}"#);
        assert_eq!(
            message.attributes,
            HashMap::from([("attribute1".to_string(), "value1".to_string())])
        );
        assert_eq!(message.origin, MessageOrigin::Notification { topic_arn: None });
    }

    #[test]
    fn test_notification_envelope_replaces_native_attributes() {
        let mut raw = raw_message(
            r#"
            {
                "Type": "Notification",
                "MessageId": "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324",
                "TopicArn": "arn:aws:sns:us-east-1:123456789012:orders",
                "Message": "{\n  \"asda\": \"asdas\"\n}",
                "MessageAttributes": {
                    "attribute1": { "Type": "String", "Value": "value1" },
                    "priority": { "Type": "Number", "Value": "3" }
                }
            }
            "#,
        );
        raw.message_attributes
            .insert("native".to_string(), MessageAttribute::string("ignored"));

        let message = normalize(&raw);

        assert_eq!(message.content, "{\n  \"asda\": \"asdas\"\n}");
        assert_eq!(
            message.attributes,
            HashMap::from([
                ("attribute1".to_string(), "value1".to_string()),
                ("priority".to_string(), "3".to_string()),
            ])
        );
        assert_eq!(
            message.origin,
            MessageOrigin::Notification {
                topic_arn: Some("arn:aws:sns:us-east-1:123456789012:orders".to_string())
            }
        );
    }

    #[test]
    fn test_notification_without_attributes() {
        for body in [
            r#"{"Message": "hello"}"#,
            r#"{"Message": "hello", "MessageAttributes": null}"#,
        ] {
            let message = normalize(&raw_message(body));

            assert_eq!(message.content, "hello");
            assert!(message.attributes.is_empty());
        }
    }

    #[test]
    fn test_bodies_that_are_not_envelopes_pass_through() {
        for body in [
            "",
            "plain text payload",
            "42",
            r#"["hello"]"#,
            r#"{"Message": ""}"#,
            r#"{"Message": {"nested": true}}"#,
            r#"{"Message": "hi", "MessageAttributes": {"a": {"Type": "String", "Value": 1}}}"#,
            r#"{"Message": "truncated"#,
        ] {
            let mut raw = raw_message(body);
            raw.message_attributes
                .insert("attribute1".to_string(), MessageAttribute::string("value1"));

            let message = normalize(&raw);

            assert_eq!(message.content, body, "body {body:?} should pass through");
            assert_eq!(message.origin, MessageOrigin::Queue);
            assert_eq!(
                message.attributes,
                HashMap::from([("attribute1".to_string(), "value1".to_string())])
            );
        }
    }

    #[test]
    fn test_unknown_attribute_type_is_preserved() {
        let attribute: EnvelopeAttribute =
            serde_json::from_str(r#"{"Type": "Custom.Type", "Value": "x"}"#).unwrap();
        assert_eq!(attribute.kind, AttributeType::Other("Custom.Type".to_string()));

        let attribute: EnvelopeAttribute =
            serde_json::from_str(r#"{"Type": "String.Array", "Value": "[\"a\"]"}"#).unwrap();
        assert_eq!(attribute.kind, AttributeType::StringArray);

        let message = normalize(&raw_message(
            r#"{"Message": "m", "MessageAttributes": {"a": {"Type": "Custom.Type", "Value": "x"}}}"#,
        ));
        assert_eq!(message.attributes.get("a").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_attributes_missing_type_or_value_still_unwrap() {
        let raw = raw_message(
            r#"{"Message": "inner", "MessageAttributes": {"a": {"Value": "v1"}, "b": {"Type": "String"}}}"#,
        );

        let message = normalize(&raw);

        assert_eq!(message.content, "inner");
        assert_eq!(message.origin, MessageOrigin::Notification { topic_arn: None });
        assert_eq!(
            message.attributes,
            HashMap::from([
                ("a".to_string(), "v1".to_string()),
                ("b".to_string(), String::new()),
            ])
        );

        let attribute: EnvelopeAttribute = serde_json::from_str(r#"{"Value": "v1"}"#).unwrap();
        assert_eq!(attribute.kind, AttributeType::Other(String::new()));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let mut raw = raw_message(
            r#"{"Message": "payload", "MessageAttributes": {"a": {"Type": "String", "Value": "b"}}}"#,
        );
        raw.system_attributes
            .insert("ApproximateReceiveCount".to_string(), "2".to_string());

        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn test_system_attributes_are_carried_over() {
        let mut raw = raw_message("body");
        raw.system_attributes
            .insert("ApproximateReceiveCount".to_string(), "3".to_string());

        let message = normalize(&raw);

        assert_eq!(message.receive_count(), Some(3));
        assert_eq!(
            message.system_attributes.get("ApproximateReceiveCount"),
            Some(&"3".to_string())
        );
        assert_eq!(normalize(&raw_message("body")).receive_count(), None);
    }

    #[test]
    fn test_deserialize_content() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Order {
            name: String,
        }

        let message = normalize(&raw_message(
            r#"{"Message": "{\n  \"name\": \"test\"\n}", "MessageAttributes": {}}"#,
        ));
        let order: Order = message.deserialize_content().unwrap();
        assert_eq!(
            order,
            Order {
                name: "test".to_string()
            }
        );

        let message = normalize(&raw_message("not json"));
        assert!(message.deserialize_content::<Order>().is_err());
    }
}
