// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Payload validation against the message definitions of a channel.
//!
//! A channel may declare several messages; a record is accepted when any one of them
//! accepts its value, key and headers. Only JSON Schema is understood, other schema formats
//! are skipped.

mod schema;

pub use schema::{compile_schema, SchemaValidator};

use bytes::BytesMut;
use serde_json::{Map, Value};
use tracing::trace;

use crate::message::Record;
use crate::service::config::ChannelConfig;
use crate::AppResult;

#[derive(Debug)]
struct MessageValidator {
    name: String,
    json_payload: bool,
    payload: Option<SchemaValidator>,
    key: Option<SchemaValidator>,
    headers: Option<SchemaValidator>,
}

impl MessageValidator {
    fn validate(&self, record: &Record) -> Result<(), String> {
        if let Some(payload) = &self.payload {
            let value = decode_value(record.value.as_ref(), self.json_payload)
                .map_err(|e| format!("message {}: invalid payload: {}", self.name, e))?;
            payload
                .validate(&value)
                .map_err(|e| format!("message {}: invalid payload: {}", self.name, e))?;
        }
        if let Some(key) = &self.key {
            let value = decode_value(record.key.as_ref(), false)
                .map_err(|e| format!("message {}: invalid key: {}", self.name, e))?;
            key.validate(&value)
                .map_err(|e| format!("message {}: invalid key: {}", self.name, e))?;
        }
        if let Some(headers) = &self.headers {
            let mut object = Map::new();
            for header in &record.headers {
                let value = decode_value(header.value.as_ref(), false)
                    .map_err(|e| format!("message {}: invalid header: {}", self.name, e))?;
                object.insert(header.key.clone(), value);
            }
            headers
                .validate(&Value::Object(object))
                .map_err(|e| format!("message {}: invalid header: {}", self.name, e))?;
        }
        Ok(())
    }
}

/// Decodes raw record bytes for validation.
///
/// JSON content is parsed; anything else is taken as text, falling back to JSON when the
/// text happens to be a JSON scalar or document.
fn decode_value(bytes: Option<&BytesMut>, json: bool) -> Result<Value, String> {
    let Some(bytes) = bytes else {
        return Ok(Value::Null);
    };
    if json {
        return serde_json::from_slice(bytes).map_err(|e| e.to_string());
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.into()))),
        Err(_) => Err("value is not valid UTF-8".to_string()),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(content_type) => {
            let content_type = content_type.to_ascii_lowercase();
            content_type.contains("json")
        }
    }
}

#[derive(Debug, Default)]
pub struct Validator {
    messages: Vec<MessageValidator>,
    enforce: bool,
}

impl Validator {
    /// Builds a validator from every message declared on the channel.
    pub fn from_channel(channel: &ChannelConfig) -> AppResult<Validator> {
        let mut messages = Vec::with_capacity(channel.messages.len());
        for (id, message) in &channel.messages {
            let name = message.name.clone().unwrap_or_else(|| id.clone());
            messages.push(MessageValidator {
                json_payload: is_json_content_type(message.content_type.as_deref()),
                payload: compile_schema(message.payload.as_ref())?,
                key: compile_schema(message.bindings.kafka.key.as_ref())?,
                headers: compile_schema(message.headers.as_ref())?,
                name,
            });
        }
        Ok(Validator {
            messages,
            enforce: channel.bindings.kafka.value_schema_validation,
        })
    }

    /// Whether failed records reject the batch.
    pub fn enforce(&self) -> bool {
        self.enforce
    }

    /// Checks a record against the channel's messages, returning the reasons of the last
    /// rejecting message when none accepts it.
    pub fn validate(&self, record: &Record) -> Result<(), String> {
        if record.compressed.is_some() || self.messages.is_empty() {
            return Ok(());
        }
        let mut errors = Vec::new();
        for message in &self.messages {
            match message.validate(record) {
                Ok(()) => {
                    trace!("record accepted by message {}", message.name);
                    return Ok(());
                }
                Err(e) => errors.push(e),
            }
        }
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::RecordHeader;
    use crate::service::config::{KafkaMessageBindings, MessageBindings, MessageConfig};

    fn channel(messages: Vec<(&str, MessageConfig)>) -> ChannelConfig {
        let mut channel = ChannelConfig::default();
        for (id, message) in messages {
            channel.messages.insert(id.to_string(), message);
        }
        channel
    }

    fn object_message() -> MessageConfig {
        MessageConfig {
            payload: Some(json!({
                "type": "object",
                "required": ["id"],
                "properties": {"id": {"type": "integer"}}
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_validation() {
        let validator = Validator::from_channel(&channel(vec![("order", object_message())])).unwrap();
        assert!(validator.enforce());
        assert!(validator
            .validate(&Record::new(None, Some(r#"{"id": 1}"#)))
            .is_ok());

        let error = validator
            .validate(&Record::new(None, Some(r#"{"id": "x"}"#)))
            .unwrap_err();
        assert!(error.contains("order"));

        let error = validator
            .validate(&Record::new(None, Some("not json")))
            .unwrap_err();
        assert!(error.contains("invalid payload"));
    }

    #[test]
    fn test_any_message_variant_accepts() {
        let text = MessageConfig {
            content_type: Some("text/plain".to_string()),
            payload: Some(json!({"type": "string", "maxLength": 3})),
            ..Default::default()
        };
        let validator =
            Validator::from_channel(&channel(vec![("order", object_message()), ("text", text)]))
                .unwrap();
        assert!(validator.validate(&Record::new(None, Some("abc"))).is_ok());
        assert!(validator.validate(&Record::new(None, Some(r#"{"id":2}"#))).is_ok());
        assert!(validator.validate(&Record::new(None, Some("abcd"))).is_err());
    }

    #[test]
    fn test_key_and_headers() {
        let message = MessageConfig {
            headers: Some(json!({
                "type": "object",
                "properties": {"version": {"type": "integer", "minimum": 2}}
            })),
            bindings: MessageBindings {
                kafka: KafkaMessageBindings {
                    key: Some(json!({"type": "string", "pattern": "^foo-"})),
                },
            },
            ..Default::default()
        };
        let validator = Validator::from_channel(&channel(vec![("m", message)])).unwrap();

        let mut record = Record::new(Some("foo-1"), Some("bar"));
        record.headers.push(RecordHeader::new("version", "2"));
        assert!(validator.validate(&record).is_ok());

        record.headers[0] = RecordHeader::new("version", "1");
        assert!(validator.validate(&record).unwrap_err().contains("header"));

        let record = Record::new(Some("bar-1"), Some("bar"));
        assert!(validator.validate(&record).unwrap_err().contains("key"));
    }

    #[test]
    fn test_channel_without_messages_accepts_everything() {
        let validator = Validator::from_channel(&ChannelConfig::default()).unwrap();
        assert!(validator.validate(&Record::new(None, Some("anything"))).is_ok());
    }
}
