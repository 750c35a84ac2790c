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

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupState {
    /// Group has no members, either never joined or every member left or timed out.
    ///
    /// action: respond to heartbeats with REBALANCE_IN_PROGRESS
    ///         respond to sync group with UNKNOWN_MEMBER_ID
    ///         allow offset commits and fetches from known members
    /// transition: join group from any member => PreparingRebalance
    #[default]
    Empty,

    /// Group is collecting joins until the initial rebalance delay passes.
    ///
    /// action: respond to heartbeats with REBALANCE_IN_PROGRESS
    ///         respond to sync group with REBALANCE_IN_PROGRESS
    ///         park join group requests until the delay passes
    /// transition: some members joined by the end of the delay => CompletingRebalance
    ///             nobody joined => Empty
    PreparingRebalance,

    /// Join responses are out, the group waits for the leader's assignment.
    ///
    /// action: respond to heartbeats with REBALANCE_IN_PROGRESS
    ///         respond to join group with REBALANCE_IN_PROGRESS
    ///         park sync group requests of followers until the leader syncs
    /// transition: sync group with assignments from the leader => Stable
    ///             leader does not sync within the rebalance timeout => PreparingRebalance
    CompletingRebalance,

    /// Group has a generation and every member knows its assignment.
    ///
    /// action: respond to member heartbeats normally
    ///         respond to sync group with the member's assignment
    /// transition: join group => PreparingRebalance
    ///             member session timeout => PreparingRebalance
    Stable,
}

impl GroupState {
    pub const fn can_transition_to(current: GroupState, target: GroupState) -> bool {
        matches!(
            (current, target),
            (GroupState::Empty, GroupState::PreparingRebalance)
                | (GroupState::Stable, GroupState::PreparingRebalance)
                | (GroupState::CompletingRebalance, GroupState::PreparingRebalance)
                | (GroupState::PreparingRebalance, GroupState::CompletingRebalance)
                | (GroupState::PreparingRebalance, GroupState::Empty)
                | (GroupState::CompletingRebalance, GroupState::Stable)
                | (GroupState::Stable, GroupState::Empty)
                | (GroupState::CompletingRebalance, GroupState::Empty)
        )
    }

    /// The name Kafka uses in ListGroups and DescribeGroups responses.
    pub const fn as_str(&self) -> &'static str {
        match self {
            GroupState::Empty => "Empty",
            GroupState::PreparingRebalance => "PreparingRebalance",
            GroupState::CompletingRebalance => "CompletingRebalance",
            GroupState::Stable => "Stable",
        }
    }
}

impl Display for GroupState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(GroupState::can_transition_to(
            GroupState::Empty,
            GroupState::PreparingRebalance
        ));
        assert!(GroupState::can_transition_to(
            GroupState::CompletingRebalance,
            GroupState::Stable
        ));
        assert!(!GroupState::can_transition_to(
            GroupState::Empty,
            GroupState::Stable
        ));
        assert_eq!(GroupState::CompletingRebalance.to_string(), "CompletingRebalance");
    }
}
