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

use std::sync::{Arc, LazyLock};

use bytes::BytesMut;

use crate::{
    message::MemoryRecords,
    protocol::{
        base::{PString, ProtocolType, I16, I32, I64, I8},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        AbortedTransaction, FetchPartition, FetchRequest, FetchResponse, FetchTopic,
        FetchableTopicResponse, ForgottenTopic, PartitionData,
    },
    AppResult,
};

const REPLICA_ID_KEY_NAME: &str = "replica_id";
const MAX_WAIT_KEY_NAME: &str = "max_wait_ms";
const MIN_BYTES_KEY_NAME: &str = "min_bytes";
const MAX_BYTES_KEY_NAME: &str = "max_bytes";
const ISOLATION_LEVEL_KEY_NAME: &str = "isolation_level";
const SESSION_ID_KEY_NAME: &str = "session_id";
const SESSION_EPOCH_KEY_NAME: &str = "session_epoch";
const TOPICS_KEY_NAME: &str = "topics";
const TOPIC_KEY_NAME: &str = "topic";
const PARTITIONS_KEY_NAME: &str = "partitions";
const PARTITION_KEY_NAME: &str = "partition";
const CURRENT_LEADER_EPOCH_KEY_NAME: &str = "current_leader_epoch";
const FETCH_OFFSET_KEY_NAME: &str = "fetch_offset";
const LAST_FETCHED_EPOCH_KEY_NAME: &str = "last_fetched_epoch";
const LOG_START_OFFSET_KEY_NAME: &str = "log_start_offset";
const PARTITION_MAX_BYTES_KEY_NAME: &str = "partition_max_bytes";
const FORGOTTEN_TOPICS_DATA_KEY_NAME: &str = "forgotten_topics_data";
const RACK_ID_KEY_NAME: &str = "rack_id";

const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const RESPONSES_KEY_NAME: &str = "responses";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const HIGH_WATERMARK_KEY_NAME: &str = "high_watermark";
const LAST_STABLE_OFFSET_KEY_NAME: &str = "last_stable_offset";
const ABORTED_TRANSACTIONS_KEY_NAME: &str = "aborted_transactions";
const PRODUCER_ID_KEY_NAME: &str = "producer_id";
const FIRST_OFFSET_KEY_NAME: &str = "first_offset";
const PREFERRED_READ_REPLICA_KEY_NAME: &str = "preferred_read_replica";
const RECORDS_KEY_NAME: &str = "records";

pub static FETCH_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            1,
            CURRENT_LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(9),
        ),
        (2, FETCH_OFFSET_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            3,
            LAST_FETCHED_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(12),
        ),
        (
            4,
            LOG_START_OFFSET_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::since(5),
        ),
        (
            5,
            PARTITION_MAX_BYTES_KEY_NAME,
            ProtocolType::I32(I32::default()),
            Versions::ALL,
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, TOPIC_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITIONS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let forgotten_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, TOPIC_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, PARTITIONS_KEY_NAME, ProtocolType::array_of::<i32>(None), Versions::ALL),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, REPLICA_ID_KEY_NAME, ProtocolType::I32(I32 { value: -1 }), Versions::ALL),
        (1, MAX_WAIT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (2, MIN_BYTES_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            3,
            MAX_BYTES_KEY_NAME,
            ProtocolType::I32(I32 { value: i32::MAX }),
            Versions::since(3),
        ),
        (
            4,
            ISOLATION_LEVEL_KEY_NAME,
            ProtocolType::I8(I8::default()),
            Versions::since(4),
        ),
        (5, SESSION_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(7)),
        (
            6,
            SESSION_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(7),
        ),
        (
            7,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
        (
            8,
            FORGOTTEN_TOPICS_DATA_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(forgotten_desc))),
            Versions::since(7),
        ),
        (
            9,
            RACK_ID_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::since(11),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static FETCH_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let aborted_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PRODUCER_ID_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (1, FIRST_OFFSET_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
    ];
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, HIGH_WATERMARK_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            3,
            LAST_STABLE_OFFSET_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::since(4),
        ),
        (
            4,
            LOG_START_OFFSET_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::since(5),
        ),
        (
            5,
            ABORTED_TRANSACTIONS_KEY_NAME,
            ProtocolType::nullable_array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                aborted_desc,
            ))),
            Versions::since(4),
        ),
        (
            6,
            PREFERRED_READ_REPLICA_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(11),
        ),
        (
            7,
            RECORDS_KEY_NAME,
            ProtocolType::Records(MemoryRecords::default()),
            Versions::ALL,
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, TOPIC_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITIONS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::since(7)),
        (2, SESSION_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(7)),
        (
            3,
            RESPONSES_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<FetchRequest> for FetchRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(FETCH_REQUEST_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<FetchRequest> {
        let value_set = FETCH_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        FetchRequest::decode_from_value_set(value_set)
    }
}

impl FetchRequest {
    fn encode_to_value_set(self, value_set: &mut ValueSet) {
        value_set.append_field_value(REPLICA_ID_KEY_NAME, self.replica_id.into());
        value_set.append_field_value(MAX_WAIT_KEY_NAME, self.max_wait_ms.into());
        value_set.append_field_value(MIN_BYTES_KEY_NAME, self.min_bytes.into());
        value_set.append_field_value(MAX_BYTES_KEY_NAME, self.max_bytes.into());
        value_set.append_field_value(ISOLATION_LEVEL_KEY_NAME, self.isolation_level.into());
        value_set.append_field_value(SESSION_ID_KEY_NAME, self.session_id.into());
        value_set.append_field_value(SESSION_EPOCH_KEY_NAME, self.session_epoch.into());

        let topic_schema = value_set.schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(TOPIC_KEY_NAME, topic.topic.into());
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| {
                        let mut partition_value_set = ValueSet::new(partition_schema.clone());
                        partition_value_set
                            .append_field_value(PARTITION_KEY_NAME, partition.partition.into());
                        partition_value_set.append_field_value(
                            CURRENT_LEADER_EPOCH_KEY_NAME,
                            partition.current_leader_epoch.into(),
                        );
                        partition_value_set
                            .append_field_value(FETCH_OFFSET_KEY_NAME, partition.fetch_offset.into());
                        partition_value_set.append_field_value(
                            LAST_FETCHED_EPOCH_KEY_NAME,
                            partition.last_fetched_epoch.into(),
                        );
                        partition_value_set.append_field_value(
                            LOG_START_OFFSET_KEY_NAME,
                            partition.log_start_offset.into(),
                        );
                        partition_value_set.append_field_value(
                            PARTITION_MAX_BYTES_KEY_NAME,
                            partition.partition_max_bytes.into(),
                        );
                        partition_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(PARTITIONS_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);

        let forgotten_schema = value_set
            .schema
            .sub_schema_of_ary_field(FORGOTTEN_TOPICS_DATA_KEY_NAME);
        let forgotten = self
            .forgotten_topics_data
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(forgotten_schema.clone());
                topic_value_set.append_field_value(TOPIC_KEY_NAME, topic.topic.into());
                topic_value_set.append_field_value(
                    PARTITIONS_KEY_NAME,
                    ProtocolType::array_of(Some(topic.partitions)),
                );
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(FORGOTTEN_TOPICS_DATA_KEY_NAME, forgotten);
        value_set.append_field_value(RACK_ID_KEY_NAME, self.rack_id.into());
    }

    fn decode_from_value_set(mut value_set: ValueSet) -> AppResult<FetchRequest> {
        let replica_id = value_set.get_field_value(REPLICA_ID_KEY_NAME).into();
        let max_wait_ms = value_set.get_field_value(MAX_WAIT_KEY_NAME).into();
        let min_bytes = value_set.get_field_value(MIN_BYTES_KEY_NAME).into();
        let max_bytes = value_set.get_field_value(MAX_BYTES_KEY_NAME).into();
        let isolation_level = value_set.get_field_value(ISOLATION_LEVEL_KEY_NAME).into();
        let session_id = value_set.get_field_value(SESSION_ID_KEY_NAME).into();
        let session_epoch = value_set.get_field_value(SESSION_EPOCH_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| FetchTopic {
                topic: topic.get_field_value(TOPIC_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| FetchPartition {
                        partition: partition.get_field_value(PARTITION_KEY_NAME).into(),
                        current_leader_epoch: partition
                            .get_field_value(CURRENT_LEADER_EPOCH_KEY_NAME)
                            .into(),
                        fetch_offset: partition.get_field_value(FETCH_OFFSET_KEY_NAME).into(),
                        last_fetched_epoch: partition
                            .get_field_value(LAST_FETCHED_EPOCH_KEY_NAME)
                            .into(),
                        log_start_offset: partition.get_field_value(LOG_START_OFFSET_KEY_NAME).into(),
                        partition_max_bytes: partition
                            .get_field_value(PARTITION_MAX_BYTES_KEY_NAME)
                            .into(),
                    })
                    .collect(),
            })
            .collect();
        let forgotten_topics_data = value_set
            .get_value_sets(FORGOTTEN_TOPICS_DATA_KEY_NAME)
            .into_iter()
            .map(|mut topic| ForgottenTopic {
                topic: topic.get_field_value(TOPIC_KEY_NAME).into(),
                partitions: topic.get_field_value(PARTITIONS_KEY_NAME).into(),
            })
            .collect();
        let rack_id = value_set.get_field_value(RACK_ID_KEY_NAME).into();
        Ok(FetchRequest {
            replica_id,
            max_wait_ms,
            min_bytes,
            max_bytes,
            isolation_level,
            session_id,
            session_epoch,
            topics,
            forgotten_topics_data,
            rack_id,
        })
    }
}

impl ProtocolCodec<FetchResponse> for FetchResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(FETCH_RESPONSE_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<FetchResponse> {
        let mut value_set = FETCH_RESPONSE_SCHEMA.clone().read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let error_code = value_set.get_field_value(ERROR_CODE_KEY_NAME).into();
        let session_id = value_set.get_field_value(SESSION_ID_KEY_NAME).into();
        let responses = value_set
            .get_value_sets(RESPONSES_KEY_NAME)
            .into_iter()
            .map(|mut topic| FetchableTopicResponse {
                topic: topic.get_field_value(TOPIC_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(PartitionData::decode_from_value_set)
                    .collect(),
            })
            .collect();
        Ok(FetchResponse {
            throttle_time_ms,
            error_code,
            session_id,
            responses,
        })
    }
}

impl FetchResponse {
    fn encode_to_value_set(self, value_set: &mut ValueSet) {
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(SESSION_ID_KEY_NAME, self.session_id.into());
        let topic_schema = value_set.schema.sub_schema_of_ary_field(RESPONSES_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let responses = self
            .responses
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(TOPIC_KEY_NAME, topic.topic.into());
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| partition.encode_to_value_set(&partition_schema))
                    .collect();
                topic_value_set.append_value_sets(PARTITIONS_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(RESPONSES_KEY_NAME, responses);
    }
}

impl PartitionData {
    fn encode_to_value_set(self, schema: &Arc<Schema>) -> ValueSet {
        let mut value_set = ValueSet::new(schema.clone());
        value_set.append_field_value(PARTITION_INDEX_KEY_NAME, self.partition_index.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(HIGH_WATERMARK_KEY_NAME, self.high_watermark.into());
        value_set.append_field_value(LAST_STABLE_OFFSET_KEY_NAME, self.last_stable_offset.into());
        value_set.append_field_value(LOG_START_OFFSET_KEY_NAME, self.log_start_offset.into());
        let aborted_schema = schema.sub_schema_of_ary_field(ABORTED_TRANSACTIONS_KEY_NAME);
        let aborted = self.aborted_transactions.map(|aborted| {
            aborted
                .into_iter()
                .map(|transaction| {
                    let mut aborted_value_set = ValueSet::new(aborted_schema.clone());
                    aborted_value_set
                        .append_field_value(PRODUCER_ID_KEY_NAME, transaction.producer_id.into());
                    aborted_value_set
                        .append_field_value(FIRST_OFFSET_KEY_NAME, transaction.first_offset.into());
                    aborted_value_set
                })
                .collect()
        });
        value_set.append_nullable_value_sets(ABORTED_TRANSACTIONS_KEY_NAME, aborted);
        value_set.append_field_value(
            PREFERRED_READ_REPLICA_KEY_NAME,
            self.preferred_read_replica.into(),
        );
        value_set.append_field_value(RECORDS_KEY_NAME, self.records.into());
        value_set
    }

    fn decode_from_value_set(mut value_set: ValueSet) -> PartitionData {
        PartitionData {
            partition_index: value_set.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
            high_watermark: value_set.get_field_value(HIGH_WATERMARK_KEY_NAME).into(),
            last_stable_offset: value_set.get_field_value(LAST_STABLE_OFFSET_KEY_NAME).into(),
            log_start_offset: value_set.get_field_value(LOG_START_OFFSET_KEY_NAME).into(),
            aborted_transactions: value_set
                .get_nullable_value_sets(ABORTED_TRANSACTIONS_KEY_NAME)
                .map(|aborted| {
                    aborted
                        .into_iter()
                        .map(|mut transaction| AbortedTransaction {
                            producer_id: transaction.get_field_value(PRODUCER_ID_KEY_NAME).into(),
                            first_offset: transaction.get_field_value(FIRST_OFFSET_KEY_NAME).into(),
                        })
                        .collect()
                }),
            preferred_read_replica: value_set
                .get_field_value(PREFERRED_READ_REPLICA_KEY_NAME)
                .into(),
            records: value_set.get_field_value(RECORDS_KEY_NAME).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Record;

    fn sample_request() -> FetchRequest {
        FetchRequest {
            replica_id: -1,
            max_wait_ms: 500,
            min_bytes: 1,
            max_bytes: 1_000,
            isolation_level: 0,
            session_id: 0,
            session_epoch: -1,
            topics: vec![FetchTopic {
                topic: "foo".to_string(),
                partitions: vec![FetchPartition {
                    partition: 0,
                    current_leader_epoch: -1,
                    fetch_offset: 0,
                    last_fetched_epoch: -1,
                    log_start_offset: -1,
                    partition_max_bytes: 1_000,
                }],
            }],
            forgotten_topics_data: vec![],
            rack_id: String::new(),
        }
    }

    #[test]
    fn test_request_classic_and_flexible() {
        for version in [ApiVersion::new(4, false), ApiVersion::new(12, true)] {
            let mut writer = BytesMut::new();
            sample_request().write_to(&mut writer, &version);
            let read = FetchRequest::read_from(&mut writer, &version).unwrap();
            assert_eq!(read, sample_request());
            assert!(writer.is_empty());
        }
    }

    #[test]
    fn test_v0_request_defaults() {
        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        sample_request().write_to(&mut writer, &version);
        let read = FetchRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.max_bytes, i32::MAX);
        assert_eq!(read.topics[0].partitions[0].partition_max_bytes, 1_000);
    }

    #[test]
    fn test_response_carries_records() {
        let mut record = Record::new(Some("foo-1"), Some("bar-1"));
        record.time = 10;
        let response = FetchResponse {
            throttle_time_ms: 0,
            error_code: 0,
            session_id: 0,
            responses: vec![FetchableTopicResponse {
                topic: "foo".to_string(),
                partitions: vec![PartitionData {
                    partition_index: 0,
                    error_code: 0,
                    high_watermark: 1,
                    last_stable_offset: 1,
                    log_start_offset: 0,
                    aborted_transactions: None,
                    preferred_read_replica: -1,
                    records: MemoryRecords::from_records(vec![record]),
                }],
            }],
        };
        let version = ApiVersion::new(12, true);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        let read = FetchResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read, response);
    }
}
