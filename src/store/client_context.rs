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

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Membership {
    member_id: String,
    last_heartbeat: Instant,
}

#[derive(Debug, Default)]
struct ClientState {
    client_id: String,
    software_name: Option<String>,
    software_version: Option<String>,
    groups: HashMap<String, Membership>,
    allow_auto_topic_creation: bool,
}

/// What the broker remembers about one client connection.
///
/// Group memberships recorded here outlive the connection for as long as a group member
/// refers to them, which is how the coordinator notices members that went away.
#[derive(Debug)]
pub struct ClientContext {
    pub peer: Option<SocketAddr>,
    /// port of the listener the connection arrived on
    pub local_port: u16,
    state: Mutex<ClientState>,
}

impl ClientContext {
    pub fn new(peer: Option<SocketAddr>, local_port: u16) -> ClientContext {
        ClientContext {
            peer,
            local_port,
            state: Mutex::new(ClientState::default()),
        }
    }

    pub fn client_id(&self) -> String {
        self.state.lock().client_id.clone()
    }

    pub fn set_client_id(&self, client_id: &str) {
        let mut state = self.state.lock();
        if state.client_id != client_id {
            state.client_id = client_id.to_string();
        }
    }

    pub fn set_software(&self, name: String, version: String) {
        let mut state = self.state.lock();
        state.software_name = Some(name);
        state.software_version = Some(version);
    }

    pub fn software(&self) -> (Option<String>, Option<String>) {
        let state = self.state.lock();
        (state.software_name.clone(), state.software_version.clone())
    }

    pub fn set_allow_auto_topic_creation(&self, allow: bool) {
        self.state.lock().allow_auto_topic_creation = allow;
    }

    pub fn allow_auto_topic_creation(&self) -> bool {
        self.state.lock().allow_auto_topic_creation
    }

    /// Records the member id the client uses in a group and counts the join as a heartbeat.
    pub fn join_group(&self, group: &str, member_id: &str) {
        self.state.lock().groups.insert(
            group.to_string(),
            Membership {
                member_id: member_id.to_string(),
                last_heartbeat: Instant::now(),
            },
        );
    }

    pub fn member_id(&self, group: &str) -> Option<String> {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|m| m.member_id.clone())
    }

    pub fn heartbeat(&self, group: &str) {
        if let Some(membership) = self.state.lock().groups.get_mut(group) {
            membership.last_heartbeat = Instant::now();
        }
    }

    /// Last heartbeat of `member_id` in the group, `None` once the client uses another id
    /// or left the group.
    pub fn last_heartbeat(&self, group: &str, member_id: &str) -> Option<Instant> {
        self.state
            .lock()
            .groups
            .get(group)
            .filter(|m| m.member_id == member_id)
            .map(|m| m.last_heartbeat)
    }

    /// Forgets the membership unless the client already rejoined under another id.
    pub fn leave_group(&self, group: &str, member_id: &str) {
        let mut state = self.state.lock();
        if state.groups.get(group).is_some_and(|m| m.member_id == member_id) {
            state.groups.remove(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_membership_heartbeats() {
        let client = ClientContext::new(None, 9092);
        assert!(client.member_id("g").is_none());

        client.join_group("g", "m-1");
        let joined = client.last_heartbeat("g", "m-1").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        client.heartbeat("g");
        let beat = client.last_heartbeat("g", "m-1").unwrap();
        assert_eq!(beat - joined, Duration::from_secs(1));

        assert!(client.last_heartbeat("g", "m-2").is_none());
        client.leave_group("g", "m-2");
        assert_eq!(client.member_id("g").as_deref(), Some("m-1"));
        client.leave_group("g", "m-1");
        assert!(client.member_id("g").is_none());
    }

    #[test]
    fn test_client_metadata() {
        let client = ClientContext::new(None, 9092);
        client.set_client_id("MOKAPITEST1");
        client.set_software("apache-kafka-java".into(), "3.7.0".into());
        client.set_allow_auto_topic_creation(true);
        assert_eq!(client.client_id(), "MOKAPITEST1");
        assert_eq!(client.software().0.as_deref(), Some("apache-kafka-java"));
        assert!(client.allow_auto_topic_creation());
    }
}
