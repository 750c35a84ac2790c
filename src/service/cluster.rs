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

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{error, info};

use crate::protocol::ApiRegistry;
use crate::store::Store;
use crate::{AppError, AppResult};

use super::config::NetworkConfig;
use super::{Server, Shutdown};

/// The running listeners of one [`Store`], one per configured broker.
///
/// Listeners are bound once at start; brokers added by a later reload are served after a
/// restart.
#[derive(Debug)]
pub struct Cluster {
    store: Arc<Store>,
    addresses: Vec<SocketAddr>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
}

impl Cluster {
    pub async fn start(store: Arc<Store>, network: &NetworkConfig) -> AppResult<Cluster> {
        let registry = Arc::new(ApiRegistry::kafka());
        let limit_connections = Arc::new(Semaphore::new(network.max_connections));
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);

        let mut addresses = Vec::new();
        for broker in store.brokers() {
            let listener = TcpListener::bind(broker.address()).await.map_err(|e| {
                AppError::DetailedIoError(format!("bind {}: {}", broker.address(), e))
            })?;
            let local_addr = listener.local_addr()?;
            info!("broker {} serving on {}", broker.name, local_addr);
            addresses.push(local_addr);

            let server = Server::new(
                listener,
                broker.port,
                store.clone(),
                registry.clone(),
                limit_connections.clone(),
                notify_shutdown.clone(),
                shutdown_complete_tx.clone(),
                network.max_frame_size,
            );
            let mut shutdown = Shutdown::subscribe(&notify_shutdown);
            let name = broker.name.clone();
            tokio::spawn(async move {
                tokio::select! {
                    res = server.run() => {
                        if let Err(err) = res {
                            error!("broker {} stopped accepting: {}", name, err);
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("broker {} received shutdown signal", name);
                    }
                }
            });
        }

        Ok(Cluster {
            store,
            addresses,
            notify_shutdown,
            shutdown_complete_tx,
            shutdown_complete_rx,
        })
    }

    /// Bound listener addresses, in broker name order.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Stops accepting, waits for every open connection to finish its current request and
    /// closes the store.
    pub async fn shutdown(self) {
        let Cluster {
            store,
            notify_shutdown,
            shutdown_complete_tx,
            mut shutdown_complete_rx,
            ..
        } = self;
        let _ = notify_shutdown.send(());
        drop(notify_shutdown);
        drop(shutdown_complete_tx);
        // resolves once every server and connection handler dropped its sender
        let _ = shutdown_complete_rx.recv().await;
        store.close();
        info!("cluster shut down");
    }
}
