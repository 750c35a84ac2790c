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
        base::{NPString, PString, ProtocolType, I16, I32, I64},
        schema_base::{Schema, ValueSet},
        types::Versions,
        Acks, ApiVersion, ProtocolCodec,
    },
    request::{
        BatchIndexAndErrorMessage, PartitionProduceData, PartitionProduceResponse,
        ProduceRequest, ProduceResponse, TopicProduceData, TopicProduceResponse,
    },
    AppResult,
};

const TRANSACTIONAL_ID_KEY_NAME: &str = "transactional_id";
const ACKS_KEY_NAME: &str = "acks";
const TIMEOUT_KEY_NAME: &str = "timeout_ms";
const TOPIC_DATA_KEY_NAME: &str = "topic_data";
const NAME_KEY_NAME: &str = "name";
const PARTITION_DATA_KEY_NAME: &str = "partition_data";
const INDEX_KEY_NAME: &str = "index";
const RECORDS_KEY_NAME: &str = "records";

const RESPONSES_KEY_NAME: &str = "responses";
const PARTITION_RESPONSES_KEY_NAME: &str = "partition_responses";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const BASE_OFFSET_KEY_NAME: &str = "base_offset";
const LOG_APPEND_TIME_KEY_NAME: &str = "log_append_time_ms";
const LOG_START_OFFSET_KEY_NAME: &str = "log_start_offset";
const RECORD_ERRORS_KEY_NAME: &str = "record_errors";
const BATCH_INDEX_KEY_NAME: &str = "batch_index";
const BATCH_INDEX_ERROR_MESSAGE_KEY_NAME: &str = "batch_index_error_message";
const ERROR_MESSAGE_KEY_NAME: &str = "error_message";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";

pub static PRODUCE_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            1,
            RECORDS_KEY_NAME,
            ProtocolType::Records(MemoryRecords::default()),
            Versions::ALL,
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITION_DATA_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            TRANSACTIONAL_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(3),
        ),
        (1, ACKS_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, TIMEOUT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            3,
            TOPIC_DATA_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static PRODUCE_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let record_error_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, BATCH_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            1,
            BATCH_INDEX_ERROR_MESSAGE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::ALL,
        ),
    ];
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, BASE_OFFSET_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            3,
            LOG_APPEND_TIME_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::since(2),
        ),
        (
            4,
            LOG_START_OFFSET_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::since(5),
        ),
        (
            5,
            RECORD_ERRORS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                record_error_desc,
            ))),
            Versions::since(8),
        ),
        (
            6,
            ERROR_MESSAGE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(8),
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITION_RESPONSES_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            RESPONSES_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
        (1, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<ProduceRequest> for ProduceRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = PRODUCE_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPIC_DATA_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITION_DATA_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(TRANSACTIONAL_ID_KEY_NAME, self.transactional_id.into());
        value_set.append_field_value(ACKS_KEY_NAME, self.required_acks.into());
        value_set.append_field_value(TIMEOUT_KEY_NAME, self.timeout.into());
        let topics = self
            .topic_data
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                let partitions = topic
                    .partition_data
                    .into_iter()
                    .map(|partition| {
                        let mut partition_value_set = ValueSet::new(partition_schema.clone());
                        partition_value_set.append_field_value(INDEX_KEY_NAME, partition.index.into());
                        partition_value_set
                            .append_field_value(RECORDS_KEY_NAME, partition.records.into());
                        partition_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(PARTITION_DATA_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPIC_DATA_KEY_NAME, topics);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ProduceRequest> {
        let mut value_set = PRODUCE_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        let transactional_id = value_set.get_field_value(TRANSACTIONAL_ID_KEY_NAME).into();
        let acks: i16 = value_set.get_field_value(ACKS_KEY_NAME).into();
        let required_acks = Acks::from_i16(acks)?;
        let timeout = value_set.get_field_value(TIMEOUT_KEY_NAME).into();
        let topic_data = value_set
            .get_value_sets(TOPIC_DATA_KEY_NAME)
            .into_iter()
            .map(|mut topic| TopicProduceData {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partition_data: topic
                    .get_value_sets(PARTITION_DATA_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| PartitionProduceData {
                        index: partition.get_field_value(INDEX_KEY_NAME).into(),
                        records: partition.get_field_value(RECORDS_KEY_NAME).into(),
                    })
                    .collect(),
            })
            .collect();
        Ok(ProduceRequest {
            transactional_id,
            required_acks,
            timeout,
            topic_data,
        })
    }
}

impl ProtocolCodec<ProduceResponse> for ProduceResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(PRODUCE_RESPONSE_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ProduceResponse> {
        let mut value_set = PRODUCE_RESPONSE_SCHEMA.clone().read_from(buffer, api_version)?;
        let responses = value_set
            .get_value_sets(RESPONSES_KEY_NAME)
            .into_iter()
            .map(|mut topic| TopicProduceResponse {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partition_responses: topic
                    .get_value_sets(PARTITION_RESPONSES_KEY_NAME)
                    .into_iter()
                    .map(PartitionProduceResponse::decode_from_value_set)
                    .collect(),
            })
            .collect();
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        Ok(ProduceResponse {
            responses,
            throttle_time_ms,
        })
    }
}

impl ProduceResponse {
    fn encode_to_value_set(self, value_set: &mut ValueSet) {
        let topic_schema = value_set.schema.sub_schema_of_ary_field(RESPONSES_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITION_RESPONSES_KEY_NAME);
        let responses = self
            .responses
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                let partitions = topic
                    .partition_responses
                    .into_iter()
                    .map(|partition| partition.encode_to_value_set(&partition_schema))
                    .collect();
                topic_value_set.append_value_sets(PARTITION_RESPONSES_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(RESPONSES_KEY_NAME, responses);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
    }
}

impl PartitionProduceResponse {
    fn encode_to_value_set(self, schema: &Arc<Schema>) -> ValueSet {
        let mut value_set = ValueSet::new(schema.clone());
        value_set.append_field_value(INDEX_KEY_NAME, self.index.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(BASE_OFFSET_KEY_NAME, self.base_offset.into());
        value_set.append_field_value(LOG_APPEND_TIME_KEY_NAME, self.log_append_time_ms.into());
        value_set.append_field_value(LOG_START_OFFSET_KEY_NAME, self.log_start_offset.into());
        let error_schema = schema.sub_schema_of_ary_field(RECORD_ERRORS_KEY_NAME);
        let record_errors = self
            .record_errors
            .into_iter()
            .map(|record_error| {
                let mut error_value_set = ValueSet::new(error_schema.clone());
                error_value_set.append_field_value(BATCH_INDEX_KEY_NAME, record_error.batch_index.into());
                error_value_set.append_field_value(
                    BATCH_INDEX_ERROR_MESSAGE_KEY_NAME,
                    record_error.batch_index_error_message.into(),
                );
                error_value_set
            })
            .collect();
        value_set.append_value_sets(RECORD_ERRORS_KEY_NAME, record_errors);
        value_set.append_field_value(ERROR_MESSAGE_KEY_NAME, self.error_message.into());
        value_set
    }

    fn decode_from_value_set(mut value_set: ValueSet) -> PartitionProduceResponse {
        PartitionProduceResponse {
            index: value_set.get_field_value(INDEX_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
            base_offset: value_set.get_field_value(BASE_OFFSET_KEY_NAME).into(),
            log_append_time_ms: value_set.get_field_value(LOG_APPEND_TIME_KEY_NAME).into(),
            log_start_offset: value_set.get_field_value(LOG_START_OFFSET_KEY_NAME).into(),
            record_errors: value_set
                .get_value_sets(RECORD_ERRORS_KEY_NAME)
                .into_iter()
                .map(|mut record_error| BatchIndexAndErrorMessage {
                    batch_index: record_error.get_field_value(BATCH_INDEX_KEY_NAME).into(),
                    batch_index_error_message: record_error
                        .get_field_value(BATCH_INDEX_ERROR_MESSAGE_KEY_NAME)
                        .into(),
                })
                .collect(),
            error_message: value_set.get_field_value(ERROR_MESSAGE_KEY_NAME).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Record;

    fn sample_request() -> ProduceRequest {
        let mut first = Record::new(Some("foo-1"), Some("bar-1"));
        first.time = 1_000;
        let mut second = Record::new(Some("foo-2"), Some("bar-2"));
        second.offset = 1;
        second.time = 1_000;
        ProduceRequest {
            transactional_id: None,
            required_acks: Acks::All,
            timeout: 30_000,
            topic_data: vec![TopicProduceData {
                name: "foo".to_string(),
                partition_data: vec![PartitionProduceData {
                    index: 0,
                    records: MemoryRecords::from_records(vec![first, second]),
                }],
            }],
        }
    }

    #[test]
    fn test_request_classic_and_flexible() {
        for version in [ApiVersion::new(3, false), ApiVersion::new(9, true)] {
            let mut writer = BytesMut::new();
            sample_request().write_to(&mut writer, &version);
            let read = ProduceRequest::read_from(&mut writer, &version).unwrap();
            assert_eq!(read, sample_request());
            let batches = read.topic_data[0].partition_data[0]
                .records
                .clone()
                .into_batches()
                .unwrap();
            assert_eq!(batches[0].records.len(), 2);
        }
    }

    #[test]
    fn test_invalid_acks_rejected() {
        let version = ApiVersion::new(3, false);
        let mut writer = BytesMut::new();
        sample_request().write_to(&mut writer, &version);
        // acks follows the null transactional id
        writer[2..4].copy_from_slice(&5i16.to_be_bytes());
        assert!(ProduceRequest::read_from(&mut writer, &version).is_err());
    }

    #[test]
    fn test_response_record_errors_from_v8() {
        let response = ProduceResponse {
            responses: vec![TopicProduceResponse {
                name: "foo".to_string(),
                partition_responses: vec![PartitionProduceResponse {
                    index: 0,
                    error_code: 87,
                    base_offset: -1,
                    log_append_time_ms: -1,
                    log_start_offset: 0,
                    record_errors: vec![BatchIndexAndErrorMessage {
                        batch_index: 1,
                        batch_index_error_message: Some("invalid payload".to_string()),
                    }],
                    error_message: Some("invalid record".to_string()),
                }],
            }],
            throttle_time_ms: 0,
        };
        let version = ApiVersion::new(8, false);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        assert_eq!(ProduceResponse::read_from(&mut writer, &version).unwrap(), response);

        let version = ApiVersion::new(7, false);
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &version);
        let read = ProduceResponse::read_from(&mut writer, &version).unwrap();
        let partition = &read.responses[0].partition_responses[0];
        assert!(partition.record_errors.is_empty());
        assert_eq!(partition.error_message, None);
    }
}
