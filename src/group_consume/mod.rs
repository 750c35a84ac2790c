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

//! Consumer groups.
//!
//! Every [`Group`] is driven by its own coordinator task which owns the rebalance protocol:
//! it collects joins until the initial rebalance delay passes, elects the first joiner as
//! leader, hands the leader's assignments to the followers and expires members whose
//! heartbeats stop. Committed offsets live on the group and survive every rebalance.

mod coordinator;
mod group;
mod group_state;

pub use coordinator::{start_group, CoordinatorSettings, JoinData, SyncData};
pub use group::{Generation, Group, Member};
pub use group_state::GroupState;
