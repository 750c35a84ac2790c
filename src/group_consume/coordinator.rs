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

//! The actor that owns the state of one consumer group.
//!
//! Joins and syncs arrive over channels together with the writer of the connection that
//! sent them. The coordinator answers them itself once the rebalance round they belong to
//! is decided, so the connection is free to read further requests in the meantime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::group_consume::group::{Generation, Group, Member};
use crate::group_consume::group_state::GroupState;
use crate::network::ResponseWriter;
use crate::protocol::api::{ConsumerAssignment, CONSUMER_PROTOCOL_TYPE};
use crate::protocol::ResponseHeader;
use crate::request::{
    ErrorCode, JoinGroupMember, JoinGroupRequest, JoinGroupResponse, SyncGroupRequest,
    SyncGroupResponse,
};
use crate::service::config::BrokerBindings;
use crate::store::ClientContext;
use crate::Shutdown;

/// Extra time a member gets beyond its session timeout before it is dropped.
const SESSION_GRACE: Duration = Duration::from_secs(2);

/// A JoinGroup request waiting for the rebalance round to finish.
#[derive(Debug)]
pub struct JoinData {
    pub request: JoinGroupRequest,
    pub client: Arc<ClientContext>,
    pub writer: ResponseWriter,
    pub header: ResponseHeader,
}

impl JoinData {
    fn respond(&self, response: JoinGroupResponse) {
        if let Err(e) = self.writer.write(&self.header, response) {
            debug!("join response to {} dropped: {}", self.request.member_id, e);
        }
    }

    fn reject(&self, error_code: ErrorCode) {
        self.respond(JoinGroupResponse::error(
            error_code,
            self.request.member_id.clone(),
        ));
    }
}

/// A SyncGroup request, parked until the leader sends the assignments.
#[derive(Debug)]
pub struct SyncData {
    pub request: SyncGroupRequest,
    pub client: Arc<ClientContext>,
    pub writer: ResponseWriter,
    pub header: ResponseHeader,
}

impl SyncData {
    fn respond(&self, response: SyncGroupResponse) {
        if let Err(e) = self.writer.write(&self.header, response) {
            debug!("sync response to {} dropped: {}", self.request.member_id, e);
        }
    }

    fn reject(&self, error_code: ErrorCode) {
        self.respond(SyncGroupResponse::error(error_code));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub initial_rebalance_delay: Duration,
    pub min_session_timeout: Duration,
}

impl From<&BrokerBindings> for CoordinatorSettings {
    fn from(bindings: &BrokerBindings) -> Self {
        CoordinatorSettings {
            initial_rebalance_delay: Duration::from_millis(
                bindings.group_initial_rebalance_delay_ms.max(0) as u64,
            ),
            min_session_timeout: Duration::from_millis(
                bindings.group_min_session_timeout_ms.max(1) as u64,
            ),
        }
    }
}

/// Creates a group and spawns its coordinator. Must be called inside a tokio runtime.
pub fn start_group(name: &str, coordinator: i32, settings: CoordinatorSettings) -> Arc<Group> {
    let (join_tx, join_rx) = mpsc::unbounded_channel();
    let (sync_tx, sync_rx) = mpsc::unbounded_channel();
    let (stop_tx, _) = broadcast::channel(1);
    let group = Arc::new(Group::new(name, coordinator, join_tx, sync_tx, stop_tx));

    let (finish_tx, finish_rx) = mpsc::unbounded_channel();
    let shutdown = group.shutdown_signal();
    let actor = GroupCoordinator {
        group: group.clone(),
        settings,
        joins: Vec::new(),
        syncs: Vec::new(),
        round: 0,
        last_generation: 0,
        completing_since: None,
        finish_tx,
    };
    tokio::spawn(actor.run(join_rx, sync_rx, finish_rx, shutdown));
    debug!("started coordinator of group {} on broker {}", name, coordinator);
    group
}

/// Picks the protocol proposed by most joiners, the first one seen wins a tie.
fn choose_protocol(joins: &[JoinData]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for join in joins {
        for protocol in &join.request.protocols {
            match counts.iter_mut().find(|(name, _)| *name == protocol.name) {
                Some((_, count)) => *count += 1,
                None => counts.push((&protocol.name, 1)),
            }
        }
    }
    let mut chosen: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if chosen.map_or(true, |(_, best)| count > best) {
            chosen = Some((name, count));
        }
    }
    chosen.map(|(name, _)| name.to_string()).unwrap_or_default()
}

fn parse_assignment(protocol_type: &str, assignment: &BytesMut) -> BTreeMap<String, Vec<i32>> {
    if protocol_type != CONSUMER_PROTOCOL_TYPE || assignment.is_empty() {
        return BTreeMap::new();
    }
    match ConsumerAssignment::parse(assignment.clone()) {
        Ok(parsed) => parsed
            .topics
            .into_iter()
            .map(|t| (t.topic, t.partitions))
            .collect(),
        Err(e) => {
            warn!("unreadable consumer assignment: {}", e);
            BTreeMap::new()
        }
    }
}

struct GroupCoordinator {
    group: Arc<Group>,
    settings: CoordinatorSettings,
    joins: Vec<JoinData>,
    syncs: Vec<SyncData>,
    /// bumped on every prepared rebalance so that stale finish timers are ignored
    round: u64,
    last_generation: i32,
    completing_since: Option<Instant>,
    finish_tx: mpsc::UnboundedSender<u64>,
}

impl GroupCoordinator {
    async fn run(
        mut self,
        mut join_rx: mpsc::UnboundedReceiver<JoinData>,
        mut sync_rx: mpsc::UnboundedReceiver<SyncData>,
        mut finish_rx: mpsc::UnboundedReceiver<u64>,
        mut shutdown: Shutdown,
    ) {
        let period = self.settings.min_session_timeout;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                Some(join) = join_rx.recv() => self.on_join(join),
                Some(sync) = sync_rx.recv() => self.on_sync(sync),
                Some(round) = finish_rx.recv() => self.finish_join(round),
                _ = ticker.tick() => self.on_tick(),
                _ = shutdown.recv() => {
                    debug!("coordinator of group {} receiving shutdown signal", self.group.name);
                    break;
                }
            }
        }
    }

    fn on_join(&mut self, join: JoinData) {
        trace!(
            "group {} received join from {} in state {}",
            self.group.name,
            join.request.member_id,
            self.group.state()
        );
        match self.group.state() {
            GroupState::CompletingRebalance => {
                join.reject(ErrorCode::RebalanceInProgress);
                return;
            }
            GroupState::Stable | GroupState::Empty => self.prepare_rebalance(),
            GroupState::PreparingRebalance => {}
        }
        match self
            .joins
            .iter_mut()
            .find(|j| j.request.member_id == join.request.member_id)
        {
            Some(parked) => *parked = join,
            None => self.joins.push(join),
        }
    }

    /// Opens a new rebalance round that closes after the initial rebalance delay.
    fn prepare_rebalance(&mut self) {
        if !self.group.transition_to(GroupState::PreparingRebalance) {
            return;
        }
        self.joins.clear();
        for sync in self.syncs.drain(..) {
            sync.reject(ErrorCode::RebalanceInProgress);
        }
        self.completing_since = None;
        self.round += 1;

        let round = self.round;
        let delay = self.settings.initial_rebalance_delay;
        let finish_tx = self.finish_tx.clone();
        let mut shutdown = self.group.shutdown_signal();
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {
                    let _ = finish_tx.send(round);
                }
                _ = shutdown.recv() => {}
            }
        });
        debug!(
            "group {} preparing rebalance round {}, closing in {:?}",
            self.group.name, round, delay
        );
    }

    fn finish_join(&mut self, round: u64) {
        if round != self.round || self.group.state() != GroupState::PreparingRebalance {
            return;
        }
        let joins = std::mem::take(&mut self.joins);
        if joins.is_empty() {
            self.group.set_generation(None);
            self.group.transition_to(GroupState::Empty);
            info!("group {} is empty, nobody joined", self.group.name);
            return;
        }

        self.last_generation += 1;
        let protocol = choose_protocol(&joins);
        let protocol_type = joins[0].request.protocol_type.clone();
        let leader = joins[0].request.member_id.clone();
        let mut members = BTreeMap::new();
        let mut member_metadata = Vec::with_capacity(joins.len());
        for join in &joins {
            let request = &join.request;
            members.insert(
                request.member_id.clone(),
                Member {
                    id: request.member_id.clone(),
                    client: join.client.clone(),
                    group_instance_id: request.group_instance_id.clone(),
                    session_timeout_ms: request.session_timeout_ms,
                    partitions: BTreeMap::new(),
                },
            );
            member_metadata.push(JoinGroupMember {
                member_id: request.member_id.clone(),
                group_instance_id: request.group_instance_id.clone(),
                metadata: request
                    .protocols
                    .iter()
                    .find(|p| p.name == protocol)
                    .map(|p| p.metadata.clone())
                    .unwrap_or_default(),
            });
        }
        let generation = Generation {
            id: self.last_generation,
            leader: leader.clone(),
            protocol: protocol.clone(),
            protocol_type: protocol_type.clone(),
            rebalance_timeout_ms: joins
                .iter()
                .map(|j| j.request.rebalance_timeout_ms)
                .max()
                .unwrap_or_default(),
            members,
            assignments: BTreeMap::new(),
        };
        self.group.set_generation(Some(generation));
        self.group.transition_to(GroupState::CompletingRebalance);
        self.completing_since = Some(Instant::now());

        for join in &joins {
            let is_leader = join.request.member_id == leader;
            join.respond(JoinGroupResponse {
                throttle_time_ms: 0,
                error_code: ErrorCode::None.code(),
                generation_id: self.last_generation,
                protocol_type: Some(protocol_type.clone()),
                protocol_name: Some(protocol.clone()),
                leader: leader.clone(),
                member_id: join.request.member_id.clone(),
                members: if is_leader {
                    member_metadata.clone()
                } else {
                    Vec::new()
                },
            });
        }
        info!(
            "group {} completed join of generation {} with {} members, leader {}, protocol {}",
            self.group.name,
            self.last_generation,
            joins.len(),
            leader,
            protocol
        );
    }

    fn on_sync(&mut self, sync: SyncData) {
        let state = self.group.state();
        if state == GroupState::PreparingRebalance {
            sync.reject(ErrorCode::RebalanceInProgress);
            return;
        }
        let Some(generation) = self.group.generation() else {
            sync.reject(ErrorCode::UnknownMemberId);
            return;
        };
        let member_id = &sync.request.member_id;
        if state == GroupState::Empty || !generation.members.contains_key(member_id) {
            sync.reject(ErrorCode::UnknownMemberId);
            return;
        }
        if sync.request.generation_id != generation.id {
            sync.reject(ErrorCode::IllegalGeneration);
            return;
        }

        if state == GroupState::CompletingRebalance && *member_id == generation.leader {
            self.complete_sync(sync, &generation);
        } else if state == GroupState::Stable {
            let assignment = generation
                .assignments
                .get(member_id)
                .cloned()
                .unwrap_or_default();
            sync.respond(SyncGroupResponse::assigned(&generation, assignment));
        } else {
            trace!(
                "group {} parks sync of {} until the leader syncs",
                self.group.name,
                member_id
            );
            self.syncs.push(sync);
        }
    }

    /// Applies the leader's assignments and answers every parked sync.
    fn complete_sync(&mut self, mut leader_sync: SyncData, generation: &Generation) {
        let assignments: BTreeMap<String, BytesMut> =
            std::mem::take(&mut leader_sync.request.assignments)
                .into_iter()
                .map(|a| (a.member_id, a.assignment))
                .collect();
        let protocol_type = generation.protocol_type.clone();
        self.group.update_generation(|current| {
            for (id, member) in current.members.iter_mut() {
                member.partitions = assignments
                    .get(id)
                    .map(|a| parse_assignment(&protocol_type, a))
                    .unwrap_or_default();
            }
            current.assignments = assignments.clone();
        });
        self.group.transition_to(GroupState::Stable);
        self.completing_since = None;
        info!(
            "group {} received assignment from leader {} for generation {}",
            self.group.name, generation.leader, generation.id
        );

        let mut syncs = std::mem::take(&mut self.syncs);
        syncs.push(leader_sync);
        for sync in syncs {
            let assignment = assignments
                .get(&sync.request.member_id)
                .cloned()
                .unwrap_or_default();
            sync.respond(SyncGroupResponse::assigned(generation, assignment));
        }
    }

    fn on_tick(&mut self) {
        let state = self.group.state();
        match state {
            GroupState::Stable => self.expire_members(),
            GroupState::CompletingRebalance => {
                let timeout = self
                    .group
                    .generation()
                    .map(|g| Duration::from_millis(g.rebalance_timeout_ms.max(0) as u64))
                    .unwrap_or_default();
                if self
                    .completing_since
                    .is_some_and(|since| since.elapsed() > timeout)
                {
                    warn!(
                        "leader of group {} did not sync within {:?}, rebalancing",
                        self.group.name, timeout
                    );
                    self.prepare_rebalance();
                }
            }
            GroupState::Empty | GroupState::PreparingRebalance => {}
        }

        let state = self.group.state();
        if self.group.generation().is_none()
            && state != GroupState::Empty
            && state != GroupState::PreparingRebalance
        {
            self.group.transition_to(GroupState::Empty);
        }
    }

    /// Drops members whose heartbeats stopped and starts a rebalance if any was dropped.
    fn expire_members(&mut self) {
        let Some(generation) = self.group.generation() else {
            return;
        };
        let now = Instant::now();
        let expired: Vec<String> = generation
            .members
            .values()
            .filter(|member| {
                let session =
                    Duration::from_millis(member.session_timeout_ms.max(0) as u64) + SESSION_GRACE;
                match member.client.last_heartbeat(&self.group.name, &member.id) {
                    Some(last) => now.duration_since(last) > session,
                    None => true,
                }
            })
            .map(|member| member.id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        for id in &expired {
            info!("member {} of group {} timed out", id, self.group.name);
            if let Some(member) = generation.members.get(id) {
                member.client.leave_group(&self.group.name, id);
            }
        }
        self.group.update_generation(|current| {
            for id in &expired {
                current.members.remove(id);
            }
        });
        self.prepare_rebalance();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Buf;
    use rstest::{fixture, rstest};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::protocol::api::{ConsumerAssignment, TopicAssignment};
    use crate::protocol::{ApiKey, ApiVersion, ProtocolCodec};
    use crate::request::{JoinGroupProtocol, SyncGroupAssignment};

    struct TestMember {
        id: String,
        client: Arc<ClientContext>,
        writer: ResponseWriter,
        responses: UnboundedReceiver<BytesMut>,
    }

    impl TestMember {
        fn new(id: &str) -> TestMember {
            let (writer, responses) = ResponseWriter::channel();
            TestMember {
                id: id.to_string(),
                client: Arc::new(ClientContext::new(None, 9092)),
                writer,
                responses,
            }
        }

        fn join(&self, group: &Group, protocols: &[&str]) {
            self.client.join_group(&group.name, &self.id);
            let request = JoinGroupRequest {
                group_id: group.name.clone(),
                session_timeout_ms: 10_000,
                rebalance_timeout_ms: 30_000,
                member_id: self.id.clone(),
                protocol_type: CONSUMER_PROTOCOL_TYPE.to_string(),
                protocols: protocols
                    .iter()
                    .map(|name| JoinGroupProtocol {
                        name: name.to_string(),
                        metadata: BytesMut::from(self.id.as_bytes()),
                    })
                    .collect(),
                ..Default::default()
            };
            group
                .join(JoinData {
                    request,
                    client: self.client.clone(),
                    writer: self.writer.clone(),
                    header: header(ApiKey::JoinGroup),
                })
                .unwrap();
        }

        fn sync(&self, group: &Group, generation_id: i32, assignments: Vec<SyncGroupAssignment>) {
            let request = SyncGroupRequest {
                group_id: group.name.clone(),
                generation_id,
                member_id: self.id.clone(),
                assignments,
                ..Default::default()
            };
            group
                .sync(SyncData {
                    request,
                    client: self.client.clone(),
                    writer: self.writer.clone(),
                    header: header(ApiKey::SyncGroup),
                })
                .unwrap();
        }

        async fn join_response(&mut self) -> JoinGroupResponse {
            let mut frame = self.responses.recv().await.unwrap();
            frame.advance(8);
            JoinGroupResponse::read_from(&mut frame, &ApiVersion::new(0, false)).unwrap()
        }

        async fn sync_response(&mut self) -> SyncGroupResponse {
            let mut frame = self.responses.recv().await.unwrap();
            frame.advance(8);
            SyncGroupResponse::read_from(&mut frame, &ApiVersion::new(0, false)).unwrap()
        }
    }

    fn header(api_key: ApiKey) -> ResponseHeader {
        ResponseHeader::new(api_key, ApiVersion::new(0, false), 7)
    }

    #[fixture]
    fn settings() -> CoordinatorSettings {
        CoordinatorSettings {
            initial_rebalance_delay: Duration::from_millis(3000),
            min_session_timeout: Duration::from_millis(6000),
        }
    }

    fn assignment(topic: &str, partitions: Vec<i32>) -> BytesMut {
        ConsumerAssignment {
            version: 0,
            topics: vec![TopicAssignment {
                topic: topic.to_string(),
                partitions,
            }],
            user_data: None,
        }
        .to_bytes()
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_join_and_sync(settings: CoordinatorSettings) {
        let group = start_group("g", 0, settings);
        let mut leader = TestMember::new("m-1");
        let mut follower = TestMember::new("m-2");

        leader.join(&group, &["range", "roundrobin"]);
        follower.join(&group, &["roundrobin"]);
        tokio::task::yield_now().await;
        assert_eq!(group.state(), GroupState::PreparingRebalance);

        let joined = leader.join_response().await;
        assert_eq!(joined.generation_id, 1);
        assert_eq!(joined.leader, "m-1");
        assert_eq!(joined.protocol_name.as_deref(), Some("roundrobin"));
        assert_eq!(joined.members.len(), 2);
        let joined = follower.join_response().await;
        assert!(joined.members.is_empty());
        assert_eq!(group.state(), GroupState::CompletingRebalance);

        follower.sync(&group, 1, Vec::new());
        leader.sync(
            &group,
            1,
            vec![
                SyncGroupAssignment {
                    member_id: "m-1".to_string(),
                    assignment: assignment("foo", vec![0]),
                },
                SyncGroupAssignment {
                    member_id: "m-2".to_string(),
                    assignment: assignment("foo", vec![1]),
                },
            ],
        );
        let synced = follower.sync_response().await;
        assert_eq!(synced.error_code, 0);
        let parsed = ConsumerAssignment::parse(synced.assignment).unwrap();
        assert_eq!(parsed.topics[0].partitions, vec![1]);
        assert_eq!(leader.sync_response().await.error_code, 0);

        assert_eq!(group.state(), GroupState::Stable);
        let generation = group.generation().unwrap();
        assert_eq!(generation.members["m-1"].partitions["foo"], vec![0]);
        group.stop();
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_sync_errors(settings: CoordinatorSettings) {
        let group = start_group("g", 0, settings);
        let mut member = TestMember::new("m-1");

        member.sync(&group, 1, Vec::new());
        assert_eq!(
            member.sync_response().await.error_code,
            ErrorCode::UnknownMemberId.code()
        );

        member.join(&group, &["range"]);
        member.sync(&group, 1, Vec::new());
        assert_eq!(
            member.sync_response().await.error_code,
            ErrorCode::RebalanceInProgress.code()
        );

        assert_eq!(member.join_response().await.generation_id, 1);
        member.sync(&group, 5, Vec::new());
        assert_eq!(
            member.sync_response().await.error_code,
            ErrorCode::IllegalGeneration.code()
        );

        let mut late = TestMember::new("m-2");
        late.join(&group, &["range"]);
        assert_eq!(
            late.join_response().await.error_code,
            ErrorCode::RebalanceInProgress.code()
        );
        group.stop();
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_generation_increases_and_members_expire(settings: CoordinatorSettings) {
        let group = start_group("g", 0, settings);
        let mut member = TestMember::new("m-1");
        member.join(&group, &["range"]);
        assert_eq!(member.join_response().await.generation_id, 1);
        member.sync(&group, 1, Vec::new());
        member.sync_response().await;
        assert_eq!(group.state(), GroupState::Stable);

        member.join(&group, &["range"]);
        assert_eq!(member.join_response().await.generation_id, 2);
        member.sync(&group, 2, Vec::new());
        member.sync_response().await;

        // no heartbeats: the session of 10s plus grace runs out at the third tick
        tokio::time::sleep(Duration::from_millis(18_500)).await;
        assert_eq!(group.state(), GroupState::PreparingRebalance);
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(group.state(), GroupState::Empty);
        assert!(group.generation().is_none());
        assert!(member.client.member_id("g").is_none());
        group.stop();
    }

    #[test]
    fn test_choose_protocol() {
        let join = |protocols: &[&str]| {
            let (writer, _) = ResponseWriter::channel();
            JoinData {
                request: JoinGroupRequest {
                    protocols: protocols
                        .iter()
                        .map(|name| JoinGroupProtocol {
                            name: name.to_string(),
                            metadata: BytesMut::new(),
                        })
                        .collect(),
                    ..Default::default()
                },
                client: Arc::new(ClientContext::new(None, 9092)),
                writer,
                header: header(ApiKey::JoinGroup),
            }
        };
        assert_eq!(choose_protocol(&[join(&["a", "b"]), join(&["b"])]), "b");
        assert_eq!(choose_protocol(&[join(&["a", "b"]), join(&["b", "a"])]), "a");
        assert_eq!(choose_protocol(&[]), "");
    }
}
