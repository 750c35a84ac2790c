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

//! The broker registry.
//!
//! A [`Store`] holds the brokers, topics and consumer groups of one mocked cluster and
//! reconciles them against the configuration document. One coarse lock guards the maps;
//! it is never held while a partition or a group coordinator is called.

mod broker;
mod client_context;
mod hooks;
mod producer;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

pub use broker::Broker;
pub use client_context::ClientContext;
pub use hooks::{
    EventEmitter, Hooks, KafkaEvent, KafkaLog, LagKey, LogSink, Metrics, NoopEmitter,
    TracingLogSink,
};
pub use producer::Producers;

use crate::group_consume::{start_group, CoordinatorSettings, Group};
use crate::log::{validate_topic_name, Topic};
use crate::request::KafkaError;
use crate::service::config::{AsyncApiConfig, ChannelConfig, OperationConfig};
use crate::AppResult;

#[derive(Debug, Default)]
struct Registry {
    cluster_name: String,
    brokers: BTreeMap<String, Arc<Broker>>,
    topics: BTreeMap<String, Arc<Topic>>,
    /// topics created by clients, which reconciliation leaves alone
    created: BTreeSet<String>,
    groups: BTreeMap<String, Arc<Group>>,
    next_broker_id: i32,
}

impl Registry {
    /// Leader of a new topic: the first listed server that is a known broker, otherwise the
    /// broker with the smallest id.
    fn leader_for(&self, channel: &ChannelConfig) -> i32 {
        channel
            .server_names()
            .iter()
            .find_map(|name| self.brokers.get(name).map(|b| b.id))
            .or_else(|| self.brokers.values().map(|b| b.id).min())
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct Store {
    registry: RwLock<Registry>,
    producers: Producers,
    hooks: Hooks,
}

impl Store {
    pub fn new(hooks: Hooks) -> Arc<Store> {
        Arc::new(Store {
            registry: RwLock::new(Registry::default()),
            producers: Producers::default(),
            hooks,
        })
    }

    /// Builds a store from a configuration document. Must be called inside a tokio runtime.
    pub fn from_config(config: &AsyncApiConfig, hooks: Hooks) -> AppResult<Arc<Store>> {
        let store = Store::new(hooks);
        store.update(config)?;
        Ok(store)
    }

    /// Reconciles brokers and topics with `config`.
    ///
    /// Servers with a protocol other than kafka are ignored. Brokers and topics missing from
    /// the document are removed, except topics created through CreateTopics.
    pub fn update(self: &Arc<Self>, config: &AsyncApiConfig) -> AppResult<()> {
        let mut stopped = Vec::new();
        let result = self.reconcile(config, &mut stopped);
        for broker in stopped {
            broker.stop();
        }
        result
    }

    fn reconcile(
        self: &Arc<Self>,
        config: &AsyncApiConfig,
        stopped: &mut Vec<Arc<Broker>>,
    ) -> AppResult<()> {
        let mut registry = self.registry.write();
        registry.cluster_name = config.cluster_name().to_string();

        let servers: BTreeMap<&String, _> = config
            .servers
            .iter()
            .filter(|(_, server)| server.is_kafka())
            .collect();
        let removed: Vec<String> = registry
            .brokers
            .keys()
            .filter(|name| !servers.contains_key(name))
            .cloned()
            .collect();
        for name in removed {
            if let Some(broker) = registry.brokers.remove(&name) {
                info!("broker {} removed from configuration", name);
                stopped.push(broker);
            }
        }
        for (name, server) in servers {
            let id = match registry.brokers.get(name).cloned() {
                Some(broker) if broker.matches(server) => continue,
                Some(broker) => {
                    let id = broker.id;
                    stopped.push(broker);
                    id
                }
                None => {
                    registry.next_broker_id += 1;
                    registry.next_broker_id
                }
            };
            let broker = Broker::start(id, name, server, Arc::downgrade(self))?;
            registry.brokers.insert(name.clone(), broker);
        }

        let mut configured = BTreeSet::new();
        for (channel_name, channel) in &config.channels {
            let topic_name = channel.topic_name(channel_name);
            if let Err(e) = validate_topic_name(topic_name) {
                warn!("channel {} skipped: {}", channel_name, e);
                continue;
            }
            let operations = config.operations_of(channel_name);
            configured.insert(topic_name.to_string());
            registry.created.remove(topic_name);
            match registry.topics.get(topic_name).cloned() {
                Some(topic) => topic.update(channel, &operations)?,
                None => {
                    let leader = registry.leader_for(channel);
                    let topic = Topic::new(topic_name, channel, &operations, leader)?;
                    registry
                        .topics
                        .insert(topic_name.to_string(), Arc::new(topic));
                }
            }
        }
        let Registry { topics, created, .. } = &mut *registry;
        topics.retain(|name, _| {
            let keep = configured.contains(name) || created.contains(name);
            if !keep {
                info!("topic {} removed from configuration", name);
            }
            keep
        });
        debug!(
            "store holds {} brokers and {} topics",
            registry.brokers.len(),
            registry.topics.len()
        );
        Ok(())
    }

    /// Name of the cluster, used as the metadata cluster id and in metric labels.
    pub fn cluster_name(&self) -> String {
        self.registry.read().cluster_name.clone()
    }

    pub fn brokers(&self) -> Vec<Arc<Broker>> {
        self.registry.read().brokers.values().cloned().collect()
    }

    pub fn broker_by_port(&self, port: u16) -> Option<Arc<Broker>> {
        self.registry
            .read()
            .brokers
            .values()
            .find(|b| b.port == port)
            .cloned()
    }

    pub fn topic(&self, name: &str) -> Option<Arc<Topic>> {
        self.registry.read().topics.get(name).cloned()
    }

    /// Topics ordered by name.
    pub fn topics(&self) -> Vec<Arc<Topic>> {
        self.registry.read().topics.values().cloned().collect()
    }

    /// Creates a topic on behalf of a client.
    pub fn create_topic(
        &self,
        name: &str,
        channel: ChannelConfig,
        operations: Vec<OperationConfig>,
    ) -> Result<Arc<Topic>, KafkaError> {
        let mut registry = self.registry.write();
        if registry.topics.contains_key(name) {
            return Err(KafkaError::TopicAlreadyExists(name.to_string()));
        }
        let leader = registry.leader_for(&channel);
        let topic = Arc::new(Topic::new(name, &channel, &operations, leader)?);
        registry.topics.insert(name.to_string(), topic.clone());
        registry.created.insert(name.to_string());
        info!(
            "topic {} created with {} partitions",
            name,
            topic.partitions().len()
        );
        Ok(topic)
    }

    /// Returns the group, starting its coordinator on `broker` when it does not exist yet.
    pub fn get_or_create_group(&self, name: &str, broker: &Broker) -> Arc<Group> {
        if let Some(group) = self.group(name) {
            return group;
        }
        let mut registry = self.registry.write();
        registry
            .groups
            .entry(name.to_string())
            .or_insert_with(|| {
                start_group(name, broker.id, CoordinatorSettings::from(&broker.bindings))
            })
            .clone()
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.registry.read().groups.get(name).cloned()
    }

    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.registry.read().groups.values().cloned().collect()
    }

    pub fn init_producer_id(&self, producer_id: i64, epoch: i16) -> Result<(i64, i16), KafkaError> {
        self.producers.init(producer_id, epoch)
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Stops every group coordinator and retention task.
    pub fn close(&self) {
        let (brokers, groups) = {
            let registry = self.registry.read();
            (
                registry.brokers.values().cloned().collect::<Vec<_>>(),
                registry.groups.values().cloned().collect::<Vec<_>>(),
            )
        };
        for group in groups {
            group.stop();
        }
        for broker in brokers {
            broker.stop();
        }
        info!("store of cluster {} closed", self.cluster_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_consume::GroupState;

    const DOCUMENT: &str = r#"
info:
  title: test-cluster
servers:
  first:
    host: localhost:19092
    protocol: kafka
  second:
    host: localhost:19093
  web:
    host: localhost:8080
    protocol: http
channels:
  orders:
    address: orders.v1
    servers:
      - $ref: '#/servers/second'
    bindings:
      kafka:
        partitions: 3
  invoices: {}
operations:
  sendOrders:
    action: send
    channel:
      $ref: '#/channels/orders'
"#;

    fn config() -> AsyncApiConfig {
        AsyncApiConfig::from_yaml(DOCUMENT).unwrap()
    }

    #[tokio::test]
    async fn test_update_builds_brokers_and_topics() {
        let store = Store::from_config(&config(), Hooks::default()).unwrap();
        assert_eq!(store.cluster_name(), "test-cluster");
        let brokers = store.brokers();
        assert_eq!(brokers.len(), 2);
        assert_eq!(store.broker_by_port(19093).unwrap().name, "second");
        assert!(store.broker_by_port(8080).is_none());

        let orders = store.topic("orders.v1").unwrap();
        assert_eq!(orders.partitions().len(), 3);
        let second = store.broker_by_port(19093).unwrap();
        assert!(orders.partitions().iter().all(|p| p.leader == second.id));
        assert_eq!(store.topic("invoices").unwrap().partitions().len(), 1);
        store.close();
    }

    #[tokio::test]
    async fn test_reload_keeps_ids_and_client_topics() {
        let store = Store::from_config(&config(), Hooks::default()).unwrap();
        let first_id = store.broker_by_port(19092).unwrap().id;
        store
            .create_topic("created", ChannelConfig::with_partitions(2), Vec::new())
            .unwrap();
        assert!(matches!(
            store.create_topic("created", ChannelConfig::with_partitions(2), Vec::new()),
            Err(KafkaError::TopicAlreadyExists(_))
        ));

        let mut reloaded = config();
        reloaded.servers.remove("second");
        reloaded.channels.remove("invoices");
        store.update(&reloaded).unwrap();

        assert_eq!(store.brokers().len(), 1);
        assert_eq!(store.broker_by_port(19092).unwrap().id, first_id);
        assert!(store.topic("invoices").is_none());
        assert!(store.topic("created").is_some());
        store.close();
    }

    #[tokio::test]
    async fn test_groups_are_created_once() {
        let store = Store::from_config(&config(), Hooks::default()).unwrap();
        let broker = store.broker_by_port(19092).unwrap();
        let group = store.get_or_create_group("g", &broker);
        let again = store.get_or_create_group("g", &broker);
        assert!(Arc::ptr_eq(&group, &again));
        assert_eq!(group.coordinator, broker.id);
        assert_eq!(group.state(), GroupState::Empty);
        assert_eq!(store.groups().len(), 1);
        store.close();
    }
}
