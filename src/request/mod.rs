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

//! Request types and their handlers.
//!
//! A frame is decoded into an [`ApiRequest`] by the [`ApiRegistry`](crate::protocol::ApiRegistry),
//! dispatched by the [`RequestProcessor`] to the matching [`ApiHandler`] and the response, if
//! any, is queued on the connection's writer.

mod api;
mod errors;
mod request_context;
mod request_header;
mod request_processor;

pub use api::*;
pub use errors::{ErrorCode, KafkaError};
pub use request_context::RequestContext;
pub use request_header::RequestHeader;
pub use request_processor::RequestProcessor;

#[derive(Debug)]
pub enum ApiRequest {
    Produce(ProduceRequest),
    Fetch(FetchRequest),
    ListOffsets(ListOffsetsRequest),
    Metadata(MetadataRequest),
    OffsetCommit(OffsetCommitRequest),
    OffsetFetch(OffsetFetchRequest),
    FindCoordinator(FindCoordinatorRequest),
    JoinGroup(JoinGroupRequest),
    Heartbeat(HeartbeatRequest),
    SyncGroup(SyncGroupRequest),
    ListGroups(ListGroupsRequest),
    ApiVersions(ApiVersionsRequest),
    CreateTopics(CreateTopicsRequest),
    InitProducerId(InitProducerIdRequest),
}
