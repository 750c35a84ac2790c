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

mod api_versions;
mod create_topics;
mod fetch;
mod find_coordinator;
mod handler;
mod heartbeat;
mod init_producer_id;
mod join_group;
mod list_groups;
mod list_offsets;
mod metadata;
mod offset_commit;
mod offset_fetch;
mod produce;
mod sync_group;

pub use handler::ApiHandler;

// request and response
pub use api_versions::{ApiVersionRange, ApiVersionsRequest, ApiVersionsResponse};
pub use create_topics::{
    CreatableTopic, CreatableTopicAssignment, CreatableTopicConfig, CreatableTopicConfigs,
    CreatableTopicResult, CreateTopicsRequest, CreateTopicsResponse,
};
pub use fetch::{
    AbortedTransaction, FetchPartition, FetchRequest, FetchResponse, FetchTopic,
    FetchableTopicResponse, ForgottenTopic, PartitionData,
};
pub use find_coordinator::{FindCoordinatorRequest, FindCoordinatorResponse};
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse};
pub use init_producer_id::{InitProducerIdRequest, InitProducerIdResponse};
pub use join_group::{JoinGroupMember, JoinGroupProtocol, JoinGroupRequest, JoinGroupResponse};
pub use list_groups::{ListGroupsRequest, ListGroupsResponse, ListedGroup};
pub use list_offsets::{
    ListOffsetsPartition, ListOffsetsPartitionResponse, ListOffsetsRequest, ListOffsetsResponse,
    ListOffsetsTopic, ListOffsetsTopicResponse,
};
pub use metadata::{
    MetadataBroker, MetadataPartition, MetadataRequest, MetadataResponse, MetadataTopic,
};
pub use offset_commit::{
    OffsetCommitPartition, OffsetCommitPartitionResponse, OffsetCommitRequest,
    OffsetCommitResponse, OffsetCommitTopic, OffsetCommitTopicResponse,
};
pub use offset_fetch::{
    OffsetFetchPartitionResponse, OffsetFetchRequest, OffsetFetchResponse, OffsetFetchTopic,
    OffsetFetchTopicResponse,
};
pub use produce::{
    BatchIndexAndErrorMessage, PartitionProduceData, PartitionProduceResponse, ProduceRequest,
    ProduceResponse, TopicProduceData, TopicProduceResponse,
};
pub use sync_group::{SyncGroupAssignment, SyncGroupRequest, SyncGroupResponse};

// handlers
pub use api_versions::ApiVersionsRequestHandler;
pub use create_topics::CreateTopicsRequestHandler;
pub use fetch::FetchRequestHandler;
pub use find_coordinator::FindCoordinatorRequestHandler;
pub use heartbeat::HeartbeatRequestHandler;
pub use init_producer_id::InitProducerIdRequestHandler;
pub use join_group::JoinGroupRequestHandler;
pub use list_groups::ListGroupsRequestHandler;
pub use list_offsets::ListOffsetsRequestHandler;
pub use metadata::MetadataRequestHandler;
pub use offset_commit::OffsetCommitRequestHandler;
pub use offset_fetch::OffsetFetchRequestHandler;
pub use produce::ProduceRequestHandler;
pub use sync_group::SyncGroupRequestHandler;
