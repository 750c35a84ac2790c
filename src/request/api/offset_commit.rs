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

use crate::log::ClientRejection;
use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::store::LagKey;
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCommitPartition {
    pub partition_index: i32,
    pub committed_offset: i64,
    pub committed_leader_epoch: i32,
    /// v1 only
    pub commit_timestamp: i64,
    pub committed_metadata: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCommitTopic {
    pub name: String,
    pub partitions: Vec<OffsetCommitPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCommitRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub group_instance_id: Option<String>,
    /// v2 to v4, ignored
    pub retention_time_ms: i64,
    pub topics: Vec<OffsetCommitTopic>,
}

impl Default for OffsetCommitRequest {
    fn default() -> Self {
        OffsetCommitRequest {
            group_id: String::new(),
            generation_id: -1,
            member_id: String::new(),
            group_instance_id: None,
            retention_time_ms: -1,
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCommitPartitionResponse {
    pub partition_index: i32,
    pub error_code: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCommitTopicResponse {
    pub name: String,
    pub partitions: Vec<OffsetCommitPartitionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCommitResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<OffsetCommitTopicResponse>,
}

pub struct OffsetCommitRequestHandler;

impl OffsetCommitRequestHandler {
    fn commit_partition(
        context: &RequestContext,
        group_id: &str,
        topic_name: &str,
        request: &OffsetCommitPartition,
    ) -> Result<(), KafkaError> {
        let store = &context.store;
        let topic = store
            .topic(topic_name)
            .ok_or_else(|| KafkaError::UnknownTopicOrPartition(topic_name.to_string()))?;
        let partition = topic.partition(request.partition_index).ok_or_else(|| {
            KafkaError::UnknownTopicOrPartition(format!(
                "{}-{}",
                topic_name, request.partition_index
            ))
        })?;
        if context.client.member_id(group_id).is_none() {
            return Err(KafkaError::UnknownMemberId(format!(
                "client {} is not a member of group {}",
                context.request_header.client_id(),
                group_id
            )));
        }
        let group = store
            .group(group_id)
            .ok_or_else(|| KafkaError::GroupIdNotFound(group_id.to_string()))?;
        topic
            .validate_consumer(context.request_header.client_id(), group_id)
            .map_err(|rejection| match rejection {
                ClientRejection::ClientId(msg) => KafkaError::Unknown(msg),
                ClientRejection::GroupId(msg) => KafkaError::InvalidGroupId(msg),
            })?;

        let tail = partition.tail();
        if request.committed_offset > tail {
            return Err(KafkaError::OffsetOutOfRange(format!(
                "offset {} of {}-{} is beyond the end {}",
                request.committed_offset, topic_name, request.partition_index, tail
            )));
        }
        group.commit(topic_name, request.partition_index, request.committed_offset);
        store.hooks().metrics.set_lag(
            LagKey {
                cluster: store.cluster_name(),
                group: group_id.to_string(),
                topic: topic_name.to_string(),
                partition: request.partition_index,
            },
            tail - request.committed_offset,
        );
        Ok(())
    }
}

impl ApiHandler for OffsetCommitRequestHandler {
    type Request = OffsetCommitRequest;
    type Response = OffsetCommitResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: OffsetCommitRequest,
        context: &RequestContext,
    ) -> AppResult<Option<OffsetCommitResponse>> {
        let topics = request
            .topics
            .into_iter()
            .map(|topic| {
                let partitions = topic
                    .partitions
                    .iter()
                    .map(|partition| {
                        let result =
                            Self::commit_partition(context, &request.group_id, &topic.name, partition);
                        let error_code = match result {
                            Ok(()) => ErrorCode::None,
                            Err(e) => {
                                debug!("commit of group {} rejected: {}", request.group_id, e);
                                ErrorCode::from(&e)
                            }
                        };
                        OffsetCommitPartitionResponse {
                            partition_index: partition.partition_index,
                            error_code: error_code.code(),
                        }
                    })
                    .collect();
                OffsetCommitTopicResponse {
                    name: topic.name,
                    partitions,
                }
            })
            .collect();
        Ok(Some(OffsetCommitResponse {
            throttle_time_ms: 0,
            topics,
        }))
    }
}
