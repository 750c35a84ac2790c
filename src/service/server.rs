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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::network::{Connection, RequestFrame, ResponseWriter};
use crate::protocol::ApiRegistry;
use crate::request::{RequestContext, RequestProcessor};
use crate::store::{ClientContext, Store};
use crate::{AppError, AppResult};

use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// handler for each connection
struct ConnectionHandler {
    notify_shutdown: broadcast::Sender<()>,
    _shutdown_complete_tx: mpsc::Sender<()>,
    connection_id: u64,
    connection: Connection,
    writer: ResponseWriter,
    client: Arc<ClientContext>,
    store: Arc<Store>,
    registry: Arc<ApiRegistry>,
}

impl ConnectionHandler {
    /// Reads and serves requests one at a time until the client goes away, a frame can not
    /// be decoded, or shutdown is signalled.
    async fn handle_connection(&mut self) -> AppResult<()> {
        let mut shutdown = Shutdown::subscribe(&self.notify_shutdown);
        loop {
            // None when the client closed the connection between two frames
            let maybe_frame = tokio::select! {
                res = self.connection.read_frame() => res?,
                _ = shutdown.recv() => {
                    debug!("connection {} exit read loop after recv shutdown signal", self.connection_id);
                    return Ok(());
                }
            };
            let Some(RequestFrame {
                request_header,
                mut request_body,
            }) = maybe_frame
            else {
                break;
            };

            self.client.set_client_id(request_header.client_id());
            let request = self
                .registry
                .decode_request(&request_header, &mut request_body)?;
            let context = RequestContext::new(
                request_header,
                self.store.clone(),
                self.client.clone(),
                self.writer.clone(),
                self.registry.clone(),
            );
            RequestProcessor::process_request(request, &context).await?;
        }
        let (name, version) = self.client.software();
        debug!(
            "connection {} of client {} ({} {}) closed by client",
            self.connection_id,
            self.client.client_id(),
            name.as_deref().unwrap_or("unknown"),
            version.as_deref().unwrap_or("")
        );
        Ok(())
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        debug!("connection handler {} dropped", self.connection_id);
    }
}

/// Accept loop of one broker listener.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    /// configured port of the broker, which identifies it to handlers
    broker_port: u16,
    store: Arc<Store>,
    registry: Arc<ApiRegistry>,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
    max_frame_size: usize,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listener: TcpListener,
        broker_port: u16,
        store: Arc<Store>,
        registry: Arc<ApiRegistry>,
        limit_connections: Arc<Semaphore>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
        max_frame_size: usize,
    ) -> Self {
        Server {
            listener,
            broker_port,
            store,
            registry,
            limit_connections,
            notify_shutdown,
            shutdown_complete_tx,
            max_frame_size,
        }
    }

    /// Accepts connections until accepting fails for good.
    ///
    /// Each connection holds a semaphore permit for its lifetime, so at most
    /// `max_connections` clients are served at once across all listeners sharing the
    /// semaphore.
    ///
    // Graceful shutdown sequence:
    // 1. The run loop is dropped by the caller once the shutdown signal is broadcast.
    // 2. Every connection handler stops reading at its next frame boundary; a request in
    //    flight is answered first.
    // 3. When the last handler drops its `shutdown_complete_tx`, the owner waiting on the
    //    receiver knows every connection is gone and closes the store.
    pub async fn run(&self) -> AppResult<()> {
        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::IllegalStateError(format!("connection limit: {}", e)))?;

            let socket = self.accept().await?;
            let peer = socket.peer_addr().ok();
            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            debug!("accept connection {} from {:?}", connection_id, peer);

            let (connection, writer) =
                Connection::new(socket, self.registry.clone(), self.max_frame_size);
            let mut handler = ConnectionHandler {
                notify_shutdown: self.notify_shutdown.clone(),
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                connection_id,
                connection,
                writer,
                client: Arc::new(ClientContext::new(peer, self.broker_port)),
                store: self.store.clone(),
                registry: self.registry.clone(),
            };

            tokio::spawn(async move {
                if let Err(err) = handler.handle_connection().await {
                    match err {
                        AppError::IoError(e) => {
                            warn!("connection {} io error: {}", handler.connection_id, e)
                        }
                        err => error!("connection {} error: {}", handler.connection_id, err),
                    }
                }
                // whether gracefully or unexpectedly closed, release connection
                drop(permit);
            });
        }
    }

    async fn accept(&self) -> AppResult<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::Accept(err.to_string()));
                    }
                    warn!("accept failed, retry in {}s: {}", backoff, err);
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        info!("listener of port {} closed", self.broker_port);
    }
}
