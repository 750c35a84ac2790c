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

use tracing::{debug, instrument};

use crate::group_consume::Group;
use crate::log::ClientRejection;
use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetFetchTopic {
    pub name: String,
    pub partition_indexes: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetFetchRequest {
    pub group_id: String,
    /// `None` asks for every committed partition of the group
    pub topics: Option<Vec<OffsetFetchTopic>>,
    pub require_stable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetFetchPartitionResponse {
    pub partition_index: i32,
    pub committed_offset: i64,
    pub committed_leader_epoch: i32,
    pub metadata: Option<String>,
    pub error_code: i16,
}

impl OffsetFetchPartitionResponse {
    fn new(partition_index: i32, committed_offset: i64, error_code: ErrorCode) -> Self {
        OffsetFetchPartitionResponse {
            partition_index,
            committed_offset,
            committed_leader_epoch: -1,
            metadata: Some(String::new()),
            error_code: error_code.code(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetFetchTopicResponse {
    pub name: String,
    pub partitions: Vec<OffsetFetchPartitionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetFetchResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<OffsetFetchTopicResponse>,
    pub error_code: i16,
}

pub struct OffsetFetchRequestHandler;

impl OffsetFetchRequestHandler {
    fn fetch_partition(
        context: &RequestContext,
        group: &Group,
        topic_name: &str,
        partition_index: i32,
    ) -> Result<i64, KafkaError> {
        let topic = context
            .store
            .topic(topic_name)
            .ok_or_else(|| KafkaError::UnknownTopicOrPartition(topic_name.to_string()))?;
        if topic.partition(partition_index).is_none() {
            return Err(KafkaError::UnknownTopicOrPartition(format!(
                "{}-{}",
                topic_name, partition_index
            )));
        }
        if context.client.member_id(&group.name).is_none() {
            return Err(KafkaError::UnknownMemberId(format!(
                "client {} is not a member of group {}",
                context.request_header.client_id(),
                group.name
            )));
        }
        topic
            .validate_consumer(context.request_header.client_id(), &group.name)
            .map_err(|rejection| match rejection {
                ClientRejection::ClientId(msg) => KafkaError::Unknown(msg),
                ClientRejection::GroupId(msg) => KafkaError::InvalidGroupId(msg),
            })?;
        Ok(group.committed(topic_name, partition_index).unwrap_or(-1))
    }
}

impl ApiHandler for OffsetFetchRequestHandler {
    type Request = OffsetFetchRequest;
    type Response = OffsetFetchResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: OffsetFetchRequest,
        context: &RequestContext,
    ) -> AppResult<Option<OffsetFetchResponse>> {
        let Some(group) = context.store.group(&request.group_id) else {
            return Ok(Some(OffsetFetchResponse {
                throttle_time_ms: 0,
                topics: Vec::new(),
                error_code: ErrorCode::GroupIdNotFound.code(),
            }));
        };
        let requested: Vec<(String, Vec<i32>)> = match request.topics {
            Some(topics) => topics
                .into_iter()
                .map(|t| (t.name, t.partition_indexes))
                .collect(),
            None => group
                .commits()
                .into_iter()
                .map(|(topic, partitions)| (topic, partitions.into_keys().collect()))
                .collect(),
        };

        let topics = requested
            .into_iter()
            .map(|(name, partition_indexes)| {
                let partitions = partition_indexes
                    .into_iter()
                    .map(|index| match Self::fetch_partition(context, &group, &name, index) {
                        Ok(offset) => {
                            OffsetFetchPartitionResponse::new(index, offset, ErrorCode::None)
                        }
                        Err(e) => {
                            debug!("offset fetch of group {} rejected: {}", group.name, e);
                            OffsetFetchPartitionResponse::new(index, -1, ErrorCode::from(&e))
                        }
                    })
                    .collect();
                OffsetFetchTopicResponse { name, partitions }
            })
            .collect();
        Ok(Some(OffsetFetchResponse {
            throttle_time_ms: 0,
            topics,
            error_code: ErrorCode::None.code(),
        }))
    }
}
