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

use tracing::{instrument, trace, warn};

use crate::message::MemoryRecords;
use crate::protocol::Acks;
use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionProduceData {
    pub index: i32,
    pub records: MemoryRecords,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicProduceData {
    pub name: String,
    pub partition_data: Vec<PartitionProduceData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceRequest {
    pub transactional_id: Option<String>,
    pub required_acks: Acks,
    pub timeout: i32,
    pub topic_data: Vec<TopicProduceData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchIndexAndErrorMessage {
    pub batch_index: i32,
    pub batch_index_error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionProduceResponse {
    pub index: i32,
    pub error_code: i16,
    pub base_offset: i64,
    // -1 unless the topic uses LogAppendTime
    pub log_append_time_ms: i64,
    pub log_start_offset: i64,
    pub record_errors: Vec<BatchIndexAndErrorMessage>,
    pub error_message: Option<String>,
}

impl Default for PartitionProduceResponse {
    fn default() -> Self {
        PartitionProduceResponse {
            index: 0,
            error_code: ErrorCode::None.code(),
            base_offset: -1,
            log_append_time_ms: -1,
            log_start_offset: -1,
            record_errors: Vec::new(),
            error_message: None,
        }
    }
}

impl PartitionProduceResponse {
    fn error(index: i32, error: KafkaError) -> PartitionProduceResponse {
        PartitionProduceResponse {
            index,
            error_code: ErrorCode::from(&error).code(),
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicProduceResponse {
    pub name: String,
    pub partition_responses: Vec<PartitionProduceResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceResponse {
    pub responses: Vec<TopicProduceResponse>,
    pub throttle_time_ms: i32,
}

pub struct ProduceRequestHandler;

impl ProduceRequestHandler {
    fn produce_partition(
        context: &RequestContext,
        topic_name: &str,
        data: PartitionProduceData,
    ) -> PartitionProduceResponse {
        let store = &context.store;
        let Some(topic) = store.topic(topic_name) else {
            return PartitionProduceResponse::error(
                data.index,
                KafkaError::UnknownTopicOrPartition(topic_name.to_string()),
            );
        };
        if let Err(e) = topic.validate_producer(context.request_header.client_id()) {
            warn!("{}", e);
            return PartitionProduceResponse::error(data.index, KafkaError::Unknown(e));
        }
        let Some(partition) = topic.partition(data.index) else {
            return PartitionProduceResponse::error(
                data.index,
                KafkaError::UnknownTopicOrPartition(format!("{}-{}", topic_name, data.index)),
            );
        };
        let batches = match data.records.into_batches() {
            Ok(batches) => batches,
            Err(e) => {
                return PartitionProduceResponse::error(
                    data.index,
                    KafkaError::CorruptMessage(e.to_string()),
                )
            }
        };

        let validator = topic.validator();
        let hooks = store.hooks();
        let mut base_offset = None;
        let mut appended = 0u64;
        for batch in batches {
            let count = batch.offset_count();
            let result = partition.append(batch, &validator, hooks);
            if let Some(error) = result.error {
                warn!("produce to {}-{} rejected: {}", topic_name, data.index, error);
                let mut response = PartitionProduceResponse::error(data.index, error);
                response.record_errors = result
                    .record_errors
                    .into_iter()
                    .map(|e| BatchIndexAndErrorMessage {
                        batch_index: e.batch_index,
                        batch_index_error_message: Some(e.message),
                    })
                    .collect();
                return response;
            }
            base_offset.get_or_insert(result.base_offset);
            appended += count as u64;
        }

        let now = chrono::Utc::now().timestamp_millis();
        if appended > 0 {
            store
                .hooks()
                .metrics
                .add_messages(&store.cluster_name(), topic_name, appended, now);
        }
        trace!(
            "appended {} records to {}-{}",
            appended,
            topic_name,
            data.index
        );
        PartitionProduceResponse {
            index: data.index,
            base_offset: base_offset.unwrap_or_else(|| partition.tail()),
            log_start_offset: partition.head(),
            ..Default::default()
        }
    }
}

impl ApiHandler for ProduceRequestHandler {
    type Request = ProduceRequest;
    type Response = ProduceResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: ProduceRequest,
        context: &RequestContext,
    ) -> AppResult<Option<ProduceResponse>> {
        let acks = request.required_acks;
        let responses = request
            .topic_data
            .into_iter()
            .map(|topic| TopicProduceResponse {
                partition_responses: topic
                    .partition_data
                    .into_iter()
                    .map(|data| Self::produce_partition(context, &topic.name, data))
                    .collect(),
                name: topic.name,
            })
            .collect();

        // acks=0 producers do not read a response
        if acks == Acks::None {
            return Ok(None);
        }
        Ok(Some(ProduceResponse {
            responses,
            throttle_time_ms: 0,
        }))
    }
}
