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

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::log::partition::Partition;
use crate::service::config::{Action, BrokerBindings, ChannelConfig, OperationConfig};
use crate::validation::{compile_schema, SchemaValidator, Validator};
use crate::AppResult;

/// Names a topic may not take besides the character and length rules.
const RESERVED_TOPIC_NAMES: [&str; 2] = [".", ".."];
const MAX_TOPIC_NAME_LENGTH: usize = 249;

/// Checks a topic name the way Kafka does.
pub fn validate_topic_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("topic name is empty".to_string());
    }
    if RESERVED_TOPIC_NAMES.contains(&name) {
        return Err(format!("topic name cannot be '{}'", name));
    }
    if name.len() > MAX_TOPIC_NAME_LENGTH {
        return Err(format!(
            "topic name is longer than {} characters",
            MAX_TOPIC_NAME_LENGTH
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(format!(
            "topic name {} contains illegal character '{}'",
            name, c
        ));
    }
    Ok(())
}

/// Effective time and size limits of a topic's partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_ms: i64,
    /// unlimited when not positive
    pub retention_bytes: i64,
    pub roll_ms: i64,
}

/// A client id or group id rejected by an operation binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRejection {
    ClientId(String),
    GroupId(String),
}

#[derive(Debug)]
struct OperationRule {
    action: Action,
    client_id: Option<SchemaValidator>,
    group_id: Option<SchemaValidator>,
}

impl OperationRule {
    fn compile(operation: &OperationConfig) -> AppResult<OperationRule> {
        Ok(OperationRule {
            action: operation.action,
            client_id: compile_schema(operation.bindings.kafka.client_id.as_ref())?,
            group_id: compile_schema(operation.bindings.kafka.group_id.as_ref())?,
        })
    }
}

#[derive(Debug)]
struct TopicSettings {
    channel: ChannelConfig,
    validator: Arc<Validator>,
    rules: Vec<OperationRule>,
}

impl TopicSettings {
    fn build(channel: &ChannelConfig, operations: &[OperationConfig]) -> AppResult<TopicSettings> {
        Ok(TopicSettings {
            channel: channel.clone(),
            validator: Arc::new(Validator::from_channel(channel)?),
            rules: operations
                .iter()
                .map(OperationRule::compile)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}

/// A topic backed by one channel of the configuration.
///
/// The partition list only grows. When a reload asks for fewer partitions the extra ones
/// are flagged as deleted and stop being served, and growing back revives them.
#[derive(Debug)]
pub struct Topic {
    pub name: String,
    settings: RwLock<TopicSettings>,
    partitions: RwLock<Vec<Arc<Partition>>>,
    leader: i32,
}

impl Topic {
    pub fn new(
        name: impl Into<String>,
        channel: &ChannelConfig,
        operations: &[OperationConfig],
        leader: i32,
    ) -> AppResult<Topic> {
        let name = name.into();
        let settings = TopicSettings::build(channel, operations)?;
        let count = channel.bindings.kafka.partitions.max(1);
        let partitions = (0..count)
            .map(|index| Arc::new(Partition::new(name.clone(), index, leader)))
            .collect();
        debug!("created topic {} with {} partitions", name, count);
        Ok(Topic {
            name,
            settings: RwLock::new(settings),
            partitions: RwLock::new(partitions),
            leader,
        })
    }

    /// Applies a reloaded channel definition.
    pub fn update(&self, channel: &ChannelConfig, operations: &[OperationConfig]) -> AppResult<()> {
        let settings = TopicSettings::build(channel, operations)?;
        let count = channel.bindings.kafka.partitions.max(1) as usize;
        {
            let mut partitions = self.partitions.write();
            for (index, partition) in partitions.iter().enumerate() {
                partition.set_deleted(index >= count);
            }
            while partitions.len() < count {
                let index = partitions.len() as i32;
                partitions.push(Arc::new(Partition::new(self.name.clone(), index, self.leader)));
            }
            if count < partitions.len() {
                info!(
                    "topic {} shrunk to {} partitions, {} marked deleted",
                    self.name,
                    count,
                    partitions.len() - count
                );
            }
        }
        *self.settings.write() = settings;
        Ok(())
    }

    /// Live partitions in index order.
    pub fn partitions(&self) -> Vec<Arc<Partition>> {
        self.partitions
            .read()
            .iter()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect()
    }

    pub fn partition(&self, index: i32) -> Option<Arc<Partition>> {
        if index < 0 {
            return None;
        }
        self.partitions
            .read()
            .get(index as usize)
            .filter(|p| !p.is_deleted())
            .cloned()
    }

    pub fn validator(&self) -> Arc<Validator> {
        self.settings.read().validator.clone()
    }

    /// Whether the topic is served by the named server. A channel without a server list is
    /// served everywhere.
    pub fn is_available_on(&self, server: &str) -> bool {
        let settings = self.settings.read();
        settings.channel.servers.is_empty()
            || settings.channel.servers.iter().any(|s| s.name() == server)
    }

    pub fn retention_policy(&self, broker: &BrokerBindings) -> RetentionPolicy {
        let bindings = &self.settings.read().channel.bindings.kafka;
        RetentionPolicy {
            retention_ms: bindings.retention_ms.unwrap_or(broker.log_retention_ms),
            retention_bytes: bindings.retention_bytes.unwrap_or(broker.log_retention_bytes),
            roll_ms: bindings.segment_ms.unwrap_or(broker.log_roll_ms),
        }
    }

    /// Checks a producer's client id against the send operations of the topic.
    pub fn validate_producer(&self, client_id: &str) -> Result<(), String> {
        let settings = self.settings.read();
        check_any(
            settings
                .rules
                .iter()
                .filter(|r| r.action == Action::Send)
                .filter_map(|r| r.client_id.as_ref()),
            client_id,
        )
        .map_err(|e| format!("invalid producer clientId '{}' for topic {}: {}", client_id, self.name, e))
    }

    /// Checks a consumer's client id and group id against the receive operations.
    pub fn validate_consumer(&self, client_id: &str, group_id: &str) -> Result<(), ClientRejection> {
        let settings = self.settings.read();
        let receives: Vec<&OperationRule> = settings
            .rules
            .iter()
            .filter(|r| r.action == Action::Receive)
            .collect();
        check_any(receives.iter().filter_map(|r| r.client_id.as_ref()), client_id).map_err(|e| {
            ClientRejection::ClientId(format!(
                "invalid clientId '{}' for topic {}: {}",
                client_id, self.name, e
            ))
        })?;
        check_any(receives.iter().filter_map(|r| r.group_id.as_ref()), group_id).map_err(|e| {
            ClientRejection::GroupId(format!(
                "invalid groupId '{}' for topic {}: {}",
                group_id, self.name, e
            ))
        })
    }
}

/// Passes when there is no schema or when any one of them accepts the value.
fn check_any<'a>(
    schemas: impl Iterator<Item = &'a SchemaValidator>,
    value: &str,
) -> Result<(), String> {
    let mut errors = Vec::new();
    for schema in schemas {
        match schema.validate_str(value) {
            Ok(()) => return Ok(()),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::config::{OperationBindings, OperationBindingsConfig, Reference};

    fn operation(action: Action, client_id: Option<serde_json::Value>) -> OperationConfig {
        OperationConfig {
            action,
            channel: Reference::Name("foo".to_string()),
            bindings: OperationBindingsConfig {
                kafka: OperationBindings {
                    client_id,
                    group_id: Some(json!({"type": "string", "enum": ["orders"]})),
                },
            },
        }
    }

    #[test]
    fn test_topic_names() {
        assert!(validate_topic_name("foo.bar_baz-1").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name(".").is_err());
        assert!(validate_topic_name("..").is_err());
        assert!(validate_topic_name("foo bar").is_err());
        assert!(validate_topic_name(&"a".repeat(249)).is_ok());
        assert!(validate_topic_name(&"a".repeat(250)).is_err());
    }

    #[test]
    fn test_partitions_grow_and_shrink() {
        let topic = Topic::new("foo", &ChannelConfig::with_partitions(2), &[], 0).unwrap();
        assert_eq!(topic.partitions().len(), 2);

        topic.update(&ChannelConfig::with_partitions(4), &[]).unwrap();
        assert_eq!(topic.partitions().len(), 4);

        topic.update(&ChannelConfig::with_partitions(1), &[]).unwrap();
        assert_eq!(topic.partitions().len(), 1);
        assert!(topic.partition(3).is_none());
        assert!(topic.partition(-1).is_none());

        topic.update(&ChannelConfig::with_partitions(3), &[]).unwrap();
        assert_eq!(topic.partitions().len(), 3);
        assert_eq!(topic.partition(2).map(|p| p.index), Some(2));
    }

    #[test]
    fn test_client_validation() {
        let operations = vec![
            operation(Action::Send, Some(json!({"type": "string", "pattern": "^producer-"}))),
            operation(Action::Receive, Some(json!({"type": "string", "pattern": "^[A-Z]{10}[0-5]$"}))),
        ];
        let topic = Topic::new("foo", &ChannelConfig::default(), &operations, 0).unwrap();
        assert!(topic.validate_producer("producer-1").is_ok());
        assert!(topic.validate_producer("MOKAPITEST1").is_err());

        assert!(topic.validate_consumer("MOKAPITEST1", "orders").is_ok());
        assert!(matches!(
            topic.validate_consumer("kafkatest", "orders"),
            Err(ClientRejection::ClientId(_))
        ));
        assert!(matches!(
            topic.validate_consumer("MOKAPITEST1", "other"),
            Err(ClientRejection::GroupId(_))
        ));
    }

    #[test]
    fn test_retention_policy_overrides() {
        let mut channel = ChannelConfig::default();
        channel.bindings.kafka.segment_ms = Some(10);
        let topic = Topic::new("foo", &channel, &[], 0).unwrap();
        let policy = topic.retention_policy(&BrokerBindings::default());
        assert_eq!(policy.roll_ms, 10);
        assert_eq!(policy.retention_ms, BrokerBindings::default().log_retention_ms);
        assert_eq!(policy.retention_bytes, -1);
    }

    #[test]
    fn test_availability() {
        let mut channel = ChannelConfig::default();
        channel.servers.push(Reference::Name("local".to_string()));
        let topic = Topic::new("foo", &channel, &[], 0).unwrap();
        assert!(topic.is_available_on("local"));
        assert!(!topic.is_available_on("remote"));
    }
}
