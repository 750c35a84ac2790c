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

use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use tracing::info;

use crate::log::retention_task;
use crate::service::config::{BrokerBindings, ServerConfig};
use crate::store::Store;
use crate::{AppResult, Shutdown};

/// One mocked Kafka server, created from a `servers` entry of the configuration.
///
/// Every broker runs its own retention task over the partitions it leads. The task holds
/// only a weak reference to the store and stops with [`Broker::stop`].
#[derive(Debug)]
pub struct Broker {
    pub id: i32,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub bindings: BrokerBindings,
    stop_tx: broadcast::Sender<()>,
}

impl Broker {
    /// Creates the broker and spawns its retention task. Must be called inside a tokio runtime.
    pub(crate) fn start(
        id: i32,
        name: &str,
        server: &ServerConfig,
        store: Weak<Store>,
    ) -> AppResult<Arc<Broker>> {
        let (host, port) = server.host_port()?;
        let (stop_tx, _) = broadcast::channel(1);
        let broker = Arc::new(Broker {
            id,
            name: name.to_string(),
            host,
            port,
            bindings: server.bindings.kafka.clone(),
            stop_tx,
        });

        let topics = move || {
            store
                .upgrade()
                .map(|store| store.topics())
                .unwrap_or_default()
        };
        tokio::spawn(retention_task(
            id,
            broker.bindings.clone(),
            topics,
            Shutdown::subscribe(&broker.stop_tx),
        ));
        info!(
            "broker {} ({}) listening address {}:{}",
            broker.name, broker.id, broker.host, broker.port
        );
        Ok(broker)
    }

    /// Whether a reloaded server entry describes this broker unchanged.
    pub fn matches(&self, server: &ServerConfig) -> bool {
        match server.host_port() {
            Ok((host, port)) => {
                host == self.host && port == self.port && server.bindings.kafka == self.bindings
            }
            Err(_) => false,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Stops the retention task.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}
