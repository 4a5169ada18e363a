use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize};

/// Custom attribute attached to a message sent directly to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    /// SQS data type, e.g. `String`, `Number` or `Binary.gif`
    pub data_type: String,
    /// Value for `String` and `Number` types, `None` for binary attributes
    pub string_value: Option<String>,
}

impl MessageAttribute {
    /// Creates a `String` attribute
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
        }
    }
}

/// Message exactly as the gateway delivered it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// Message body, possibly an SNS notification envelope
    pub body: String,
    /// Custom message attributes
    pub message_attributes: HashMap<String, MessageAttribute>,
    /// System attributes such as `ApproximateReceiveCount` or `SentTimestamp`
    pub system_attributes: HashMap<String, String>,
    /// Receipt handle used to delete or release the message
    pub ack_token: String,
    /// Unique message identifier
    pub message_id: String,
}

/// Where the payload of a message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Sent directly to the queue
    Queue,
    /// Delivered through an SNS topic subscription
    Notification {
        /// ARN of the publishing topic, when the envelope carried one
        topic_arn: Option<String>,
    },
}

/// Uniform view of a message handed to the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Payload, unwrapped from the SNS envelope when there was one
    pub content: String,
    /// Attribute name to string value
    pub attributes: HashMap<String, String>,
    /// Message identifier
    pub id: String,
    /// Receipt handle
    pub ack_token: String,
    /// Delivery path of the payload
    pub origin: MessageOrigin,
    /// System attributes of the queue message
    pub system_attributes: HashMap<String, String>,
}

impl NormalizedMessage {
    /// Parses `content` as JSON into `T`
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the content does not match `T`
    pub fn deserialize_content<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.content)
    }

    /// Number of times the queue has handed out this message, if SQS reported it
    #[must_use]
    pub fn receive_count(&self) -> Option<u32> {
        self.system_attributes
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
    }
}

/// Value type of an SNS message attribute
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AttributeType {
    /// `String`
    String,
    /// `Number`
    Number,
    /// `Binary`, value is base64
    Binary,
    /// `String.Array`, value is a JSON array
    StringArray,
    /// Any other type name, kept as sent
    Other(String),
}

impl Default for AttributeType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for AttributeType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "String" => Self::String,
            "Number" => Self::Number,
            "Binary" => Self::Binary,
            "String.Array" => Self::StringArray,
            _ => Self::Other(kind),
        }
    }
}

/// Attribute inside an SNS notification envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvelopeAttribute {
    /// Declared type, `Other("")` when absent
    #[serde(rename = "Type", default)]
    pub kind: AttributeType,
    /// Value as sent by SNS, empty when absent
    #[serde(rename = "Value", default)]
    pub value: String,
}

/// The subset of the SNS notification envelope the normalizer relies on
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct NotificationEnvelope {
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "MessageAttributes", default)]
    pub message_attributes: Option<HashMap<String, EnvelopeAttribute>>,
    #[serde(rename = "TopicArn", default)]
    pub topic_arn: Option<String>,
}
