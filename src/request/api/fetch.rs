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

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{instrument, trace};

use crate::message::{MemoryRecords, Record};
use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::store::Store;
use crate::AppResult;

use super::ApiHandler;

/// How much earlier than `max_wait_ms` a long poll gives up, leaving room for the response.
const MAX_WAIT_MARGIN: Duration = Duration::from_millis(200);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPartition {
    pub partition: i32,
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    pub last_fetched_epoch: i32,
    pub log_start_offset: i64,
    pub partition_max_bytes: i32,
}

impl Default for FetchPartition {
    fn default() -> Self {
        FetchPartition {
            partition: 0,
            current_leader_epoch: -1,
            fetch_offset: 0,
            last_fetched_epoch: -1,
            log_start_offset: -1,
            partition_max_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTopic {
    pub topic: String,
    pub partitions: Vec<FetchPartition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForgottenTopic {
    pub topic: String,
    pub partitions: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    /// 0 read uncommitted, 1 read committed; both see the same data here
    pub isolation_level: i8,
    pub session_id: i32,
    pub session_epoch: i32,
    pub topics: Vec<FetchTopic>,
    pub forgotten_topics_data: Vec<ForgottenTopic>,
    pub rack_id: String,
}

impl Default for FetchRequest {
    fn default() -> Self {
        FetchRequest {
            replica_id: -1,
            max_wait_ms: 0,
            min_bytes: 0,
            max_bytes: i32::MAX,
            isolation_level: 0,
            session_id: 0,
            session_epoch: -1,
            topics: Vec::new(),
            forgotten_topics_data: Vec::new(),
            rack_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionData {
    pub partition_index: i32,
    pub error_code: i16,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub log_start_offset: i64,
    pub aborted_transactions: Option<Vec<AbortedTransaction>>,
    pub preferred_read_replica: i32,
    pub records: MemoryRecords,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchableTopicResponse {
    pub topic: String,
    pub partitions: Vec<PartitionData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub session_id: i32,
    pub responses: Vec<FetchableTopicResponse>,
}

/// Progress of one requested partition across the polls of a fetch.
#[derive(Debug)]
struct PartitionFetch {
    index: i32,
    fetch_offset: i64,
    budget: i64,
    error: Option<KafkaError>,
    records: Vec<Record>,
    /// head and tail seen by the last poll, unknown until the partition is found
    offsets: Option<(i64, i64)>,
}

impl PartitionFetch {
    fn new(partition: &FetchPartition) -> PartitionFetch {
        PartitionFetch {
            index: partition.partition,
            fetch_offset: partition.fetch_offset,
            budget: partition.partition_max_bytes as i64,
            error: None,
            records: Vec::new(),
            offsets: None,
        }
    }

    /// Reads what became available since the last poll and returns the bytes added.
    ///
    /// Only the first record of an empty response may exceed the byte limits, so that a
    /// consumer always makes progress.
    fn poll(
        &mut self,
        store: &Store,
        topic_name: &str,
        remaining: i64,
        response_empty: bool,
    ) -> i64 {
        let Some(topic) = store.topic(topic_name) else {
            self.error = Some(KafkaError::UnknownTopicOrPartition(topic_name.to_string()));
            return 0;
        };
        let Some(partition) = topic.partition(self.index) else {
            self.error = Some(KafkaError::UnknownTopicOrPartition(format!(
                "{}-{}",
                topic_name, self.index
            )));
            return 0;
        };
        self.offsets = Some(partition.offsets());
        let limit = self.budget.min(remaining);
        if limit <= 0 && !response_empty {
            return 0;
        }
        match partition.read(self.fetch_offset, limit.max(0) as usize) {
            Ok(mut records) => {
                let Some(first) = records.first() else {
                    return 0;
                };
                let (base_offset, base_time) = (first.offset, first.time);
                let mut size = 0i64;
                let mut kept = 0;
                for record in &records {
                    let record_size = record.size(base_offset, base_time) as i64;
                    let oversize_allowed = kept == 0 && response_empty;
                    if size + record_size > limit && !oversize_allowed {
                        break;
                    }
                    size += record_size;
                    kept += 1;
                }
                records.truncate(kept);
                if let Some(last) = records.last() {
                    self.fetch_offset = last.last_offset() + 1;
                }
                self.budget -= size;
                self.records.extend(records);
                size
            }
            Err(e) => {
                self.error = Some(e);
                0
            }
        }
    }

    fn into_partition_data(self) -> PartitionData {
        let (head, tail) = self.offsets.unwrap_or((-1, -1));
        let error_code = self
            .error
            .as_ref()
            .map_or(ErrorCode::None, ErrorCode::from)
            .code();
        PartitionData {
            partition_index: self.index,
            error_code,
            high_watermark: tail,
            last_stable_offset: tail,
            log_start_offset: head,
            aborted_transactions: None,
            preferred_read_replica: -1,
            records: MemoryRecords::from_records(self.records),
        }
    }
}

pub struct FetchRequestHandler;

impl ApiHandler for FetchRequestHandler {
    type Request = FetchRequest;
    type Response = FetchResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: FetchRequest,
        context: &RequestContext,
    ) -> AppResult<Option<FetchResponse>> {
        let arrival = Instant::now();
        let max_wait = Duration::from_millis(request.max_wait_ms.max(0) as u64);
        let deadline = arrival + max_wait.saturating_sub(MAX_WAIT_MARGIN);
        let poll_interval = (max_wait / 5).min(MAX_POLL_INTERVAL);
        let min_bytes = request.min_bytes as i64;

        let mut topics: Vec<(String, Vec<PartitionFetch>)> = request
            .topics
            .iter()
            .map(|topic| {
                let partitions = topic.partitions.iter().map(PartitionFetch::new).collect();
                (topic.topic.clone(), partitions)
            })
            .collect();

        let mut total = 0i64;
        loop {
            for (topic, partitions) in topics.iter_mut() {
                for partition in partitions.iter_mut().filter(|p| p.error.is_none()) {
                    let remaining = request.max_bytes as i64 - total;
                    total += partition.poll(&context.store, topic, remaining, total == 0);
                }
            }
            if total >= min_bytes || Instant::now() >= deadline {
                break;
            }
            sleep(poll_interval).await;
        }
        trace!(
            "fetch collected {} bytes after {:?}",
            total,
            arrival.elapsed()
        );

        let responses = topics
            .into_iter()
            .map(|(topic, partitions)| FetchableTopicResponse {
                topic,
                partitions: partitions
                    .into_iter()
                    .map(PartitionFetch::into_partition_data)
                    .collect(),
            })
            .collect();
        Ok(Some(FetchResponse {
            throttle_time_ms: 0,
            error_code: ErrorCode::None.code(),
            session_id: 0,
            responses,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::message::RecordBatch;
    use crate::protocol::ApiKey;
    use crate::store::{Hooks, Store};
    use crate::AsyncApiConfig;

    const DOCUMENT: &str = r#"
info:
  title: fetch-test
servers:
  local:
    host: localhost:19301
channels:
  pair:
    bindings:
      kafka:
        partitions: 2
"#;

    fn store() -> Arc<Store> {
        let config = AsyncApiConfig::from_yaml(DOCUMENT).unwrap();
        Store::from_config(&config, Hooks::default()).unwrap()
    }

    fn append(store: &Store, partition: i32, pairs: &[(&str, &str)]) {
        let topic = store.topic("pair").unwrap();
        let records = pairs
            .iter()
            .map(|(key, value)| Record::new(Some(*key), Some(*value)))
            .collect();
        let result = topic.partition(partition).unwrap().append(
            RecordBatch::new(records),
            &topic.validator(),
            store.hooks(),
        );
        assert!(result.error.is_none());
    }

    fn request(max_bytes: i32, partitions: &[i32]) -> FetchRequest {
        FetchRequest {
            max_wait_ms: 0,
            min_bytes: 0,
            max_bytes,
            topics: vec![FetchTopic {
                topic: "pair".to_string(),
                partitions: partitions
                    .iter()
                    .map(|&partition| FetchPartition {
                        partition,
                        partition_max_bytes: 1000,
                        ..Default::default()
                    })
                    .collect(),
            }],
            ..Default::default()
        }
    }

    async fn fetch(store: &Arc<Store>, request: FetchRequest) -> FetchResponse {
        let context = RequestContext::on_port(store.clone(), ApiKey::Fetch, 11, 19301);
        FetchRequestHandler
            .handle_request(request, &context)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_only_first_record_may_exceed_response_limit() {
        let store = store();
        append(&store, 0, &[("k0", "first"), ("k1", "second")]);
        append(&store, 1, &[("k2", "third")]);

        let response = fetch(&store, request(1, &[0, 1])).await;
        let partitions = &response.responses[0].partitions;
        let first = partitions[0].records.clone().into_batches().unwrap();
        assert_eq!(first.iter().map(|b| b.records.len()).sum::<usize>(), 1);
        assert!(partitions[1].records.is_empty());
        assert_eq!(partitions[1].error_code, ErrorCode::None.code());
        assert_eq!(partitions[1].high_watermark, 1);
        store.close();
    }

    #[tokio::test]
    async fn test_fetch_below_log_start_after_retention() {
        let store = store();
        append(&store, 0, &[("k0", "v0"), ("k1", "v1")]);
        let partition = store.topic("pair").unwrap().partition(0).unwrap();
        partition.add_segment(chrono::Utc::now().timestamp_millis());
        partition.remove_closed_segments();

        let response = fetch(&store, request(1000, &[0])).await;
        let data = &response.responses[0].partitions[0];
        assert_eq!(data.error_code, ErrorCode::OffsetOutOfRange.code());
        assert_eq!(data.log_start_offset, 2);
        assert_eq!(data.high_watermark, 2);
        assert!(data.records.is_empty());
        store.close();
    }

    #[tokio::test]
    async fn test_unknown_partition() {
        let store = store();
        let response = fetch(&store, request(1000, &[7])).await;
        assert_eq!(
            response.responses[0].partitions[0].error_code,
            ErrorCode::UnknownTopicOrPartition.code()
        );
        store.close();
    }
}
