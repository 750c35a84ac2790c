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

//! In-memory segmented logs.

mod partition;
mod retention;
mod segment;
mod topic;

pub use partition::{AppendResult, Partition, RecordError};
pub use retention::{clean_partition, clean_topics, retention_task, CleanReport};
pub use segment::{Segment, SegmentInfo};
pub use topic::{validate_topic_name, ClientRejection, RetentionPolicy, Topic};
