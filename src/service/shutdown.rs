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

use tokio::sync::broadcast;

/// Stop signal of a long running task: a listener, a connection, a group coordinator or a
/// broker's retention loop.
///
/// The signal fires on the first broadcast, or once every sender is gone, so a task whose
/// owner was dropped without calling stop still exits.
#[derive(Debug)]
pub struct Shutdown {
    stopped: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn subscribe(sender: &broadcast::Sender<()>) -> Shutdown {
        Shutdown {
            stopped: false,
            notify: sender.subscribe(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Resolves once the signal fired. Returns immediately on every later call.
    pub async fn recv(&mut self) {
        if self.stopped {
            return;
        }
        // Ok, Closed and Lagged all mean a stop was requested or nobody is left to request it
        let _ = self.notify.recv().await;
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_stop_reaches_every_subscriber() {
        let (stop_tx, _) = broadcast::channel(1);
        let mut listener = Shutdown::subscribe(&stop_tx);
        let mut retention = Shutdown::subscribe(&stop_tx);
        stop_tx.send(()).unwrap();

        listener.recv().await;
        retention.recv().await;
        assert!(listener.is_stopped());
        assert!(retention.is_stopped());
        // a stopped signal stays stopped
        listener.recv().await;
    }

    #[tokio::test]
    async fn test_dropped_owner_stops_task() {
        let (stop_tx, _) = broadcast::channel(1);
        let mut shutdown = Shutdown::subscribe(&stop_tx);
        assert!(timeout(Duration::from_millis(10), shutdown.recv()).await.is_err());
        assert!(!shutdown.is_stopped());

        drop(stop_tx);
        shutdown.recv().await;
        assert!(shutdown.is_stopped());
    }
}
