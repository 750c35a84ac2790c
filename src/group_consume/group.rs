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

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error};

use crate::group_consume::coordinator::{JoinData, SyncData};
use crate::group_consume::group_state::GroupState;
use crate::store::ClientContext;
use crate::{AppError, AppResult, Shutdown};

/// A consumer taking part in one generation of a group.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: String,
    pub client: Arc<ClientContext>,
    pub group_instance_id: Option<String>,
    pub session_timeout_ms: i32,
    /// topic -> partitions assigned by the leader
    pub partitions: BTreeMap<String, Vec<i32>>,
}

/// The members agreed on by one rebalance round.
#[derive(Debug, Clone)]
pub struct Generation {
    pub id: i32,
    pub leader: String,
    pub protocol: String,
    pub protocol_type: String,
    pub rebalance_timeout_ms: i32,
    pub members: BTreeMap<String, Member>,
    /// raw assignments sent by the leader, empty until it syncs
    pub assignments: BTreeMap<String, BytesMut>,
}

#[derive(Debug, Default)]
struct GroupStatus {
    state: GroupState,
    generation: Option<Generation>,
}

/// A consumer group and the channels into its coordinator task.
///
/// State and generation are written by the coordinator only. Handlers read them, send joins
/// and syncs to the coordinator and update the committed offsets, which outlive every
/// generation.
#[derive(Debug)]
pub struct Group {
    pub name: String,
    /// id of the broker coordinating the group
    pub coordinator: i32,
    status: RwLock<GroupStatus>,
    commits: RwLock<BTreeMap<String, BTreeMap<i32, i64>>>,
    join_tx: mpsc::UnboundedSender<JoinData>,
    sync_tx: mpsc::UnboundedSender<SyncData>,
    stop_tx: broadcast::Sender<()>,
}

impl Group {
    pub(crate) fn new(
        name: impl Into<String>,
        coordinator: i32,
        join_tx: mpsc::UnboundedSender<JoinData>,
        sync_tx: mpsc::UnboundedSender<SyncData>,
        stop_tx: broadcast::Sender<()>,
    ) -> Group {
        Group {
            name: name.into(),
            coordinator,
            status: RwLock::new(GroupStatus::default()),
            commits: RwLock::new(BTreeMap::new()),
            join_tx,
            sync_tx,
            stop_tx,
        }
    }

    pub fn state(&self) -> GroupState {
        self.status.read().state
    }

    pub fn generation(&self) -> Option<Generation> {
        self.status.read().generation.clone()
    }

    pub fn generation_id(&self) -> Option<i32> {
        self.status.read().generation.as_ref().map(|g| g.id)
    }

    /// Protocol type of the current generation, empty when there is none.
    pub fn protocol_type(&self) -> String {
        self.status
            .read()
            .generation
            .as_ref()
            .map(|g| g.protocol_type.clone())
            .unwrap_or_default()
    }

    /// Moves the group to `target` when the state machine allows it.
    pub(crate) fn transition_to(&self, target: GroupState) -> bool {
        let mut status = self.status.write();
        if status.state == target {
            return true;
        }
        if !GroupState::can_transition_to(status.state, target) {
            error!(
                "group {} can not move from {} to {}",
                self.name, status.state, target
            );
            return false;
        }
        debug!("group {} moves from {} to {}", self.name, status.state, target);
        status.state = target;
        true
    }

    pub(crate) fn set_generation(&self, generation: Option<Generation>) {
        self.status.write().generation = generation;
    }

    pub(crate) fn update_generation<F>(&self, update: F)
    where
        F: FnOnce(&mut Generation),
    {
        if let Some(generation) = self.status.write().generation.as_mut() {
            update(generation);
        }
    }

    pub fn commit(&self, topic: &str, partition: i32, offset: i64) {
        self.commits
            .write()
            .entry(topic.to_string())
            .or_default()
            .insert(partition, offset);
    }

    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.commits
            .read()
            .get(topic)
            .and_then(|partitions| partitions.get(&partition).copied())
    }

    /// Every committed offset, by topic and partition.
    pub fn commits(&self) -> BTreeMap<String, BTreeMap<i32, i64>> {
        self.commits.read().clone()
    }

    pub fn join(&self, join: JoinData) -> AppResult<()> {
        self.join_tx.send(join).map_err(|_| {
            AppError::ChannelSendError(format!("coordinator of group {} stopped", self.name))
        })
    }

    pub fn sync(&self, sync: SyncData) -> AppResult<()> {
        self.sync_tx.send(sync).map_err(|_| {
            AppError::ChannelSendError(format!("coordinator of group {} stopped", self.name))
        })
    }

    pub(crate) fn shutdown_signal(&self) -> Shutdown {
        Shutdown::subscribe(&self.stop_tx)
    }

    /// Stops the coordinator task and any pending rebalance timer.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        let (join_tx, _) = mpsc::unbounded_channel();
        let (sync_tx, _) = mpsc::unbounded_channel();
        let (stop_tx, _) = broadcast::channel(1);
        Group::new("g", 0, join_tx, sync_tx, stop_tx)
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        let group = group();
        assert_eq!(group.state(), GroupState::Empty);
        assert!(!group.transition_to(GroupState::Stable));
        assert_eq!(group.state(), GroupState::Empty);
        assert!(group.transition_to(GroupState::PreparingRebalance));
        assert!(group.transition_to(GroupState::CompletingRebalance));
        assert!(group.transition_to(GroupState::Stable));
        assert_eq!(group.state(), GroupState::Stable);
    }

    #[test]
    fn test_commits_outlive_generations() {
        let group = group();
        group.commit("foo", 0, 5);
        group.commit("foo", 1, 2);
        group.set_generation(None);
        assert_eq!(group.committed("foo", 0), Some(5));
        assert_eq!(group.committed("bar", 0), None);
        assert_eq!(group.commits()["foo"].len(), 2);
    }

    #[test]
    fn test_send_to_stopped_coordinator_fails() {
        let group = group();
        let (writer, _) = crate::network::ResponseWriter::channel();
        let sync = SyncData {
            request: Default::default(),
            client: Arc::new(ClientContext::new(None, 9092)),
            writer,
            header: crate::protocol::ResponseHeader::new(
                crate::protocol::ApiKey::SyncGroup,
                crate::protocol::ApiVersion::new(0, false),
                1,
            ),
        };
        assert!(group.sync(sync).is_err());
    }
}
