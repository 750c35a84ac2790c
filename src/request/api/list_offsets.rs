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

use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::AppResult;

use super::ApiHandler;

const LATEST_TIMESTAMP: i64 = -1;
const EARLIEST_TIMESTAMP: i64 = -2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsPartition {
    pub partition_index: i32,
    pub current_leader_epoch: i32,
    pub timestamp: i64,
    /// v0 only
    pub max_num_offsets: i32,
}

impl Default for ListOffsetsPartition {
    fn default() -> Self {
        ListOffsetsPartition {
            partition_index: 0,
            current_leader_epoch: -1,
            timestamp: LATEST_TIMESTAMP,
            max_num_offsets: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOffsetsTopic {
    pub name: String,
    pub partitions: Vec<ListOffsetsPartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequest {
    pub replica_id: i32,
    pub isolation_level: i8,
    pub topics: Vec<ListOffsetsTopic>,
}

impl Default for ListOffsetsRequest {
    fn default() -> Self {
        ListOffsetsRequest {
            replica_id: -1,
            isolation_level: 0,
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsPartitionResponse {
    pub partition_index: i32,
    pub error_code: i16,
    pub old_style_offsets: Vec<i64>,
    pub timestamp: i64,
    pub offset: i64,
    pub leader_epoch: i32,
}

impl ListOffsetsPartitionResponse {
    fn error(partition_index: i32, error: &KafkaError) -> ListOffsetsPartitionResponse {
        ListOffsetsPartitionResponse {
            partition_index,
            error_code: ErrorCode::from(error).code(),
            old_style_offsets: Vec::new(),
            timestamp: -1,
            offset: -1,
            leader_epoch: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOffsetsTopicResponse {
    pub name: String,
    pub partitions: Vec<ListOffsetsPartitionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOffsetsResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<ListOffsetsTopicResponse>,
}

pub struct ListOffsetsRequestHandler;

impl ListOffsetsRequestHandler {
    fn list_partition(
        context: &RequestContext,
        topic_name: &str,
        request: &ListOffsetsPartition,
    ) -> Result<ListOffsetsPartitionResponse, KafkaError> {
        let topic = context
            .store
            .topic(topic_name)
            .ok_or_else(|| KafkaError::UnknownTopicOrPartition(topic_name.to_string()))?;
        let partition = topic.partition(request.partition_index).ok_or_else(|| {
            KafkaError::UnknownTopicOrPartition(format!(
                "{}-{}",
                topic_name, request.partition_index
            ))
        })?;
        let offset = match request.timestamp {
            EARLIEST_TIMESTAMP | 0 => partition.head(),
            LATEST_TIMESTAMP => partition.tail(),
            timestamp => {
                return Err(KafkaError::Unknown(format!(
                    "lookup of offsets by timestamp {} is not supported",
                    timestamp
                )))
            }
        };

        let mut response = ListOffsetsPartitionResponse {
            partition_index: request.partition_index,
            error_code: ErrorCode::None.code(),
            old_style_offsets: Vec::new(),
            timestamp: -1,
            offset,
            leader_epoch: 0,
        };
        if context.request_header.api_version.as_i16() == 0 {
            if request.max_num_offsets != 1 {
                return Err(KafkaError::Unknown(format!(
                    "max_num_offsets {} is not supported",
                    request.max_num_offsets
                )));
            }
            response.old_style_offsets = vec![offset];
        }
        Ok(response)
    }
}

impl ApiHandler for ListOffsetsRequestHandler {
    type Request = ListOffsetsRequest;
    type Response = ListOffsetsResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: ListOffsetsRequest,
        context: &RequestContext,
    ) -> AppResult<Option<ListOffsetsResponse>> {
        let topics = request
            .topics
            .into_iter()
            .map(|topic| {
                let partitions = topic
                    .partitions
                    .iter()
                    .map(|partition| {
                        Self::list_partition(context, &topic.name, partition).unwrap_or_else(
                            |e| {
                                debug!("list offsets of {}: {}", topic.name, e);
                                ListOffsetsPartitionResponse::error(partition.partition_index, &e)
                            },
                        )
                    })
                    .collect();
                ListOffsetsTopicResponse {
                    name: topic.name,
                    partitions,
                }
            })
            .collect();
        Ok(Some(ListOffsetsResponse {
            throttle_time_ms: 0,
            topics,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::message::{Record, RecordBatch};
    use crate::protocol::ApiKey;
    use crate::store::{Hooks, Store};
    use crate::AsyncApiConfig;

    const DOCUMENT: &str = r#"
info:
  title: offsets-test
servers:
  local:
    host: localhost:19302
channels:
  foo: {}
"#;

    fn store_with_records(count: usize) -> Arc<Store> {
        let config = AsyncApiConfig::from_yaml(DOCUMENT).unwrap();
        let store = Store::from_config(&config, Hooks::default()).unwrap();
        let topic = store.topic("foo").unwrap();
        let records = (0..count)
            .map(|i| Record::new(Some(format!("k{}", i)), Some(format!("v{}", i))))
            .collect();
        topic
            .partition(0)
            .unwrap()
            .append(RecordBatch::new(records), &topic.validator(), store.hooks());
        store
    }

    async fn list(
        store: &Arc<Store>,
        version: i16,
        timestamp: i64,
        max_num_offsets: i32,
    ) -> ListOffsetsPartitionResponse {
        let context = RequestContext::on_port(store.clone(), ApiKey::ListOffsets, version, 19302);
        let request = ListOffsetsRequest {
            topics: vec![ListOffsetsTopic {
                name: "foo".to_string(),
                partitions: vec![ListOffsetsPartition {
                    timestamp,
                    max_num_offsets,
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        let mut response = ListOffsetsRequestHandler
            .handle_request(request, &context)
            .await
            .unwrap()
            .unwrap();
        response.topics.remove(0).partitions.remove(0)
    }

    #[tokio::test]
    async fn test_earliest_and_latest() {
        let store = store_with_records(3);
        let partition = store.topic("foo").unwrap().partition(0).unwrap();

        assert_eq!(list(&store, 5, EARLIEST_TIMESTAMP, 1).await.offset, 0);
        assert_eq!(list(&store, 5, LATEST_TIMESTAMP, 1).await.offset, 3);

        partition.add_segment(chrono::Utc::now().timestamp_millis());
        partition.remove_closed_segments();
        assert_eq!(list(&store, 5, EARLIEST_TIMESTAMP, 1).await.offset, 3);
        assert_eq!(list(&store, 5, 0, 1).await.offset, 3);
        store.close();
    }

    #[tokio::test]
    async fn test_old_style_offsets() {
        let store = store_with_records(2);

        let single = list(&store, 0, LATEST_TIMESTAMP, 1).await;
        assert_eq!(single.error_code, ErrorCode::None.code());
        assert_eq!(single.old_style_offsets, vec![2]);

        let many = list(&store, 0, LATEST_TIMESTAMP, 5).await;
        assert_eq!(many.error_code, ErrorCode::Unknown.code());
        assert!(many.old_style_offsets.is_empty());
        store.close();
    }

    #[tokio::test]
    async fn test_timestamp_lookup_is_unsupported() {
        let store = store_with_records(1);
        let response = list(&store, 5, 1_700_000_000_000, 1).await;
        assert_eq!(response.error_code, ErrorCode::Unknown.code());
        assert_eq!(response.offset, -1);
        store.close();
    }
}
