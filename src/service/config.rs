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

//! Configuration documents.
//!
//! [`AsyncApiConfig`] is the AsyncAPI style description of the mocked cluster: servers become
//! brokers, channels become topics and operations constrain who may produce or consume.
//! Kafka specific settings live in `bindings.kafka` blocks and use their dotted Kafka names.
//!
//! [`RuntimeConfig`] holds the process options (logging, connection limits) and is read with
//! the `config` crate so every value can be overridden from `MOCKAFKA__*` environment variables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppError, AppResult};

pub const DEFAULT_KAFKA_PORT: u16 = 9092;

const DEFAULT_RETENTION_CHECK_INTERVAL_MS: i64 = 300_000;
const DEFAULT_RETENTION_MS: i64 = 604_800_000;
const DEFAULT_ROLL_MS: i64 = 604_800_000;
const DEFAULT_INITIAL_REBALANCE_DELAY_MS: i64 = 3_000;
const DEFAULT_MIN_SESSION_TIMEOUT_MS: i64 = 6_000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AsyncApiConfig {
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

impl AsyncApiConfig {
    /// Reads a YAML or JSON document from disk.
    ///
    /// Channel and server names are used verbatim as topic and broker names, so the document
    /// is parsed with `serde_yaml` directly, which keeps keys case sensitive.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<AsyncApiConfig> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::DetailedIoError(format!(
                "read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(document: &str) -> AppResult<AsyncApiConfig> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Cluster name reported in metadata responses and metric labels.
    pub fn cluster_name(&self) -> &str {
        &self.info.title
    }

    /// Operations whose channel reference points at the named channel.
    pub fn operations_of(&self, channel: &str) -> Vec<OperationConfig> {
        self.operations
            .values()
            .filter(|op| op.channel.name() == channel)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

/// Either a plain name or an AsyncAPI `$ref` such as `#/channels/orders`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Reference {
    Name(String),
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Reference::Name(name) => name,
            Reference::Ref { reference } => reference.rsplit('/').next().unwrap_or(reference),
        }
    }
}

impl Default for Reference {
    fn default() -> Self {
        Reference::Name(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub bindings: ServerBindings,
}

impl ServerConfig {
    pub fn is_kafka(&self) -> bool {
        self.protocol.is_empty() || self.protocol.eq_ignore_ascii_case("kafka")
    }

    /// Splits `host:port`, the port defaults to 9092.
    pub fn host_port(&self) -> AppResult<(String, u16)> {
        match self.host.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    AppError::InvalidValue(format!("server host {}: {}", self.host, e))
                })?;
                Ok((host.to_string(), port))
            }
            None => Ok((self.host.clone(), DEFAULT_KAFKA_PORT)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerBindings {
    #[serde(default)]
    pub kafka: BrokerBindings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrokerBindings {
    #[serde(
        rename = "log.retention.check.interval.ms",
        default = "default_retention_check_interval_ms"
    )]
    pub log_retention_check_interval_ms: i64,
    #[serde(rename = "log.retention.ms", default = "default_retention_ms")]
    pub log_retention_ms: i64,
    #[serde(rename = "log.retention.bytes", default = "default_unlimited")]
    pub log_retention_bytes: i64,
    #[serde(rename = "log.roll.ms", default = "default_roll_ms")]
    pub log_roll_ms: i64,
    #[serde(
        rename = "group.initial.rebalance.delay.ms",
        default = "default_initial_rebalance_delay_ms"
    )]
    pub group_initial_rebalance_delay_ms: i64,
    #[serde(
        rename = "group.min.session.timeout.ms",
        default = "default_min_session_timeout_ms"
    )]
    pub group_min_session_timeout_ms: i64,
}

impl Default for BrokerBindings {
    fn default() -> Self {
        BrokerBindings {
            log_retention_check_interval_ms: DEFAULT_RETENTION_CHECK_INTERVAL_MS,
            log_retention_ms: DEFAULT_RETENTION_MS,
            log_retention_bytes: -1,
            log_roll_ms: DEFAULT_ROLL_MS,
            group_initial_rebalance_delay_ms: DEFAULT_INITIAL_REBALANCE_DELAY_MS,
            group_min_session_timeout_ms: DEFAULT_MIN_SESSION_TIMEOUT_MS,
        }
    }
}

fn default_retention_check_interval_ms() -> i64 {
    DEFAULT_RETENTION_CHECK_INTERVAL_MS
}
fn default_retention_ms() -> i64 {
    DEFAULT_RETENTION_MS
}
fn default_unlimited() -> i64 {
    -1
}
fn default_roll_ms() -> i64 {
    DEFAULT_ROLL_MS
}
fn default_initial_rebalance_delay_ms() -> i64 {
    DEFAULT_INITIAL_REBALANCE_DELAY_MS
}
fn default_min_session_timeout_ms() -> i64 {
    DEFAULT_MIN_SESSION_TIMEOUT_MS
}
fn default_partitions() -> i32 {
    1
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Topic name override, the channel key is used when absent.
    #[serde(default)]
    pub address: Option<String>,
    /// Servers the topic is available on, every server when empty.
    #[serde(default)]
    pub servers: Vec<Reference>,
    #[serde(default)]
    pub messages: BTreeMap<String, MessageConfig>,
    #[serde(default)]
    pub bindings: ChannelBindings,
}

impl ChannelConfig {
    pub fn with_partitions(partitions: i32) -> ChannelConfig {
        ChannelConfig {
            bindings: ChannelBindings {
                kafka: TopicBindings {
                    partitions,
                    ..Default::default()
                },
            },
            ..Default::default()
        }
    }

    pub fn topic_name<'a>(&'a self, channel_name: &'a str) -> &'a str {
        match &self.address {
            Some(address) if !address.is_empty() => address,
            _ => channel_name,
        }
    }

    pub fn server_names(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name().to_string()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChannelBindings {
    #[serde(default)]
    pub kafka: TopicBindings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TopicBindings {
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(rename = "retention.ms", default)]
    pub retention_ms: Option<i64>,
    #[serde(rename = "retention.bytes", default)]
    pub retention_bytes: Option<i64>,
    #[serde(rename = "segment.ms", default)]
    pub segment_ms: Option<i64>,
    #[serde(rename = "segment.bytes", default)]
    pub segment_bytes: Option<i64>,
    #[serde(rename = "confluent.value.schema.validation", default = "default_true")]
    pub value_schema_validation: bool,
}

impl Default for TopicBindings {
    fn default() -> Self {
        TopicBindings {
            partitions: 1,
            retention_ms: None,
            retention_bytes: None,
            segment_ms: None,
            segment_bytes: None,
            value_schema_validation: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MessageConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub bindings: MessageBindings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MessageBindings {
    #[serde(default)]
    pub kafka: KafkaMessageBindings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct KafkaMessageBindings {
    #[serde(default)]
    pub key: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Send,
    Receive,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OperationConfig {
    pub action: Action,
    pub channel: Reference,
    #[serde(default)]
    pub bindings: OperationBindingsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OperationBindingsConfig {
    #[serde(default)]
    pub kafka: OperationBindings,
}

/// Schemas the client id and group id of a producer or consumer must satisfy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OperationBindings {
    #[serde(rename = "clientId", default)]
    pub client_id: Option<Value>,
    #[serde(rename = "groupId", default)]
    pub group_id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_log_file_prefix() -> String {
    "mockafka.log".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            max_connections: default_max_connections(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

fn default_max_connections() -> usize {
    1024
}
fn default_max_frame_size() -> usize {
    100 * 1024 * 1024
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    /// Loads the runtime options, `None` keeps the defaults apart from environment overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> AppResult<RuntimeConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            let path_str = path.as_ref().to_str().ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
            builder = builder.add_source(config::File::with_name(path_str));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("MOCKAFKA").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
asyncapi: 3.0.0
info:
  title: Orders
  version: 1.0.0
servers:
  local:
    host: localhost:19092
    protocol: kafka
    bindings:
      kafka:
        log.retention.ms: 500
        log.roll.ms: 10
  mqtt:
    host: localhost:1883
    protocol: mqtt
channels:
  Orders:
    address: orders.v1
    servers:
      - $ref: '#/servers/local'
    messages:
      order:
        contentType: application/json
        payload:
          type: object
    bindings:
      kafka:
        partitions: 3
        retention.ms: 1000
        confluent.value.schema.validation: false
operations:
  consumeOrders:
    action: receive
    channel:
      $ref: '#/channels/Orders'
    bindings:
      kafka:
        clientId:
          type: string
          pattern: '^[A-Z]{10}[0-5]$'
"#;

    #[test]
    fn test_parse_async_api_document() {
        let config = AsyncApiConfig::from_yaml(DOCUMENT).unwrap();
        assert_eq!(config.cluster_name(), "Orders");

        let local = &config.servers["local"];
        assert!(local.is_kafka());
        assert_eq!(local.host_port().unwrap(), ("localhost".to_string(), 19092));
        assert_eq!(local.bindings.kafka.log_retention_ms, 500);
        assert_eq!(local.bindings.kafka.log_roll_ms, 10);
        assert_eq!(local.bindings.kafka.group_initial_rebalance_delay_ms, 3_000);
        assert!(!config.servers["mqtt"].is_kafka());

        let channel = &config.channels["Orders"];
        assert_eq!(channel.topic_name("Orders"), "orders.v1");
        assert_eq!(channel.server_names(), vec!["local".to_string()]);
        assert_eq!(channel.bindings.kafka.partitions, 3);
        assert_eq!(channel.bindings.kafka.retention_ms, Some(1000));
        assert!(!channel.bindings.kafka.value_schema_validation);

        let operations = config.operations_of("Orders");
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].action, Action::Receive);
        assert!(operations[0].bindings.kafka.client_id.is_some());
    }

    #[test]
    fn test_defaults() {
        let config = AsyncApiConfig::from_yaml("channels:\n  foo: {}\n").unwrap();
        let bindings = &config.channels["foo"].bindings.kafka;
        assert_eq!(bindings.partitions, 1);
        assert!(bindings.value_schema_validation);

        let server: ServerConfig = serde_yaml::from_str("host: broker").unwrap();
        assert_eq!(server.host_port().unwrap(), ("broker".to_string(), DEFAULT_KAFKA_PORT));
        assert_eq!(server.bindings.kafka.log_retention_bytes, -1);
    }

    #[test]
    fn test_invalid_port() {
        let server: ServerConfig = serde_yaml::from_str("host: broker:abc").unwrap();
        assert!(matches!(server.host_port(), Err(AppError::InvalidValue(_))));
    }
}
