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
    protocol::{
        base::{PString, ProtocolType, I16, I32, I64, I8},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        ListOffsetsPartition, ListOffsetsPartitionResponse, ListOffsetsRequest,
        ListOffsetsResponse, ListOffsetsTopic, ListOffsetsTopicResponse,
    },
    AppResult,
};

const REPLICA_ID_KEY_NAME: &str = "replica_id";
const ISOLATION_LEVEL_KEY_NAME: &str = "isolation_level";
const TOPICS_KEY_NAME: &str = "topics";
const NAME_KEY_NAME: &str = "name";
const PARTITIONS_KEY_NAME: &str = "partitions";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const CURRENT_LEADER_EPOCH_KEY_NAME: &str = "current_leader_epoch";
const TIMESTAMP_KEY_NAME: &str = "timestamp";
const MAX_NUM_OFFSETS_KEY_NAME: &str = "max_num_offsets";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const OLD_STYLE_OFFSETS_KEY_NAME: &str = "old_style_offsets";
const OFFSET_KEY_NAME: &str = "offset";
const LEADER_EPOCH_KEY_NAME: &str = "leader_epoch";

pub static LIST_OFFSETS_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            1,
            CURRENT_LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(4),
        ),
        (2, TIMESTAMP_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            3,
            MAX_NUM_OFFSETS_KEY_NAME,
            ProtocolType::I32(I32 { value: 1 }),
            Versions::until(0),
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITIONS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, REPLICA_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            1,
            ISOLATION_LEVEL_KEY_NAME,
            ProtocolType::I8(I8::default()),
            Versions::since(2),
        ),
        (
            2,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static LIST_OFFSETS_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            2,
            OLD_STYLE_OFFSETS_KEY_NAME,
            ProtocolType::array_of::<i64>(None),
            Versions::until(0),
        ),
        (3, TIMESTAMP_KEY_NAME, ProtocolType::I64(I64 { value: -1 }), Versions::since(1)),
        (4, OFFSET_KEY_NAME, ProtocolType::I64(I64 { value: -1 }), Versions::since(1)),
        (
            5,
            LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(4),
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITIONS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(2)),
        (
            1,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<ListOffsetsRequest> for ListOffsetsRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = LIST_OFFSETS_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(REPLICA_ID_KEY_NAME, self.replica_id.into());
        value_set.append_field_value(ISOLATION_LEVEL_KEY_NAME, self.isolation_level.into());
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| {
                        let mut partition_value_set = ValueSet::new(partition_schema.clone());
                        partition_value_set.append_field_value(
                            PARTITION_INDEX_KEY_NAME,
                            partition.partition_index.into(),
                        );
                        partition_value_set.append_field_value(
                            CURRENT_LEADER_EPOCH_KEY_NAME,
                            partition.current_leader_epoch.into(),
                        );
                        partition_value_set
                            .append_field_value(TIMESTAMP_KEY_NAME, partition.timestamp.into());
                        partition_value_set.append_field_value(
                            MAX_NUM_OFFSETS_KEY_NAME,
                            partition.max_num_offsets.into(),
                        );
                        partition_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(PARTITIONS_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ListOffsetsRequest> {
        let mut value_set = LIST_OFFSETS_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let replica_id = value_set.get_field_value(REPLICA_ID_KEY_NAME).into();
        let isolation_level = value_set.get_field_value(ISOLATION_LEVEL_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| ListOffsetsTopic {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| ListOffsetsPartition {
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        current_leader_epoch: partition
                            .get_field_value(CURRENT_LEADER_EPOCH_KEY_NAME)
                            .into(),
                        timestamp: partition.get_field_value(TIMESTAMP_KEY_NAME).into(),
                        max_num_offsets: partition.get_field_value(MAX_NUM_OFFSETS_KEY_NAME).into(),
                    })
                    .collect(),
            })
            .collect();
        Ok(ListOffsetsRequest {
            replica_id,
            isolation_level,
            topics,
        })
    }
}

impl ProtocolCodec<ListOffsetsResponse> for ListOffsetsResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = LIST_OFFSETS_RESPONSE_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| {
                        let mut partition_value_set = ValueSet::new(partition_schema.clone());
                        partition_value_set.append_field_value(
                            PARTITION_INDEX_KEY_NAME,
                            partition.partition_index.into(),
                        );
                        partition_value_set
                            .append_field_value(ERROR_CODE_KEY_NAME, partition.error_code.into());
                        partition_value_set.append_field_value(
                            OLD_STYLE_OFFSETS_KEY_NAME,
                            ProtocolType::array_of(Some(partition.old_style_offsets)),
                        );
                        partition_value_set
                            .append_field_value(TIMESTAMP_KEY_NAME, partition.timestamp.into());
                        partition_value_set.append_field_value(OFFSET_KEY_NAME, partition.offset.into());
                        partition_value_set
                            .append_field_value(LEADER_EPOCH_KEY_NAME, partition.leader_epoch.into());
                        partition_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(PARTITIONS_KEY_NAME, partitions);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ListOffsetsResponse> {
        let mut value_set = LIST_OFFSETS_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| ListOffsetsTopicResponse {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| ListOffsetsPartitionResponse {
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        error_code: partition.get_field_value(ERROR_CODE_KEY_NAME).into(),
                        old_style_offsets: partition
                            .get_field_value(OLD_STYLE_OFFSETS_KEY_NAME)
                            .into(),
                        timestamp: partition.get_field_value(TIMESTAMP_KEY_NAME).into(),
                        offset: partition.get_field_value(OFFSET_KEY_NAME).into(),
                        leader_epoch: partition.get_field_value(LEADER_EPOCH_KEY_NAME).into(),
                    })
                    .collect(),
            })
            .collect();
        Ok(ListOffsetsResponse {
            throttle_time_ms,
            topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(max_num_offsets: i32) -> ListOffsetsRequest {
        ListOffsetsRequest {
            replica_id: -1,
            isolation_level: 0,
            topics: vec![ListOffsetsTopic {
                name: "foo".to_string(),
                partitions: vec![ListOffsetsPartition {
                    partition_index: 0,
                    current_leader_epoch: -1,
                    timestamp: -1,
                    max_num_offsets,
                }],
            }],
        }
    }

    #[test]
    fn test_max_num_offsets_only_in_v0() {
        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        request(3).write_to(&mut writer, &version);
        let read = ListOffsetsRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.topics[0].partitions[0].max_num_offsets, 3);

        let version = ApiVersion::new(6, true);
        let mut writer = BytesMut::new();
        request(3).write_to(&mut writer, &version);
        let read = ListOffsetsRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.topics[0].partitions[0].max_num_offsets, 1);
    }

    #[test]
    fn test_v0_response_old_style_offsets() {
        let response = ListOffsetsResponse {
            throttle_time_ms: 0,
            topics: vec![ListOffsetsTopicResponse {
                name: "foo".to_string(),
                partitions: vec![ListOffsetsPartitionResponse {
                    partition_index: 0,
                    error_code: 0,
                    old_style_offsets: vec![2],
                    timestamp: -1,
                    offset: 2,
                    leader_epoch: -1,
                }],
            }],
        };
        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        let read = ListOffsetsResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.topics[0].partitions[0].old_style_offsets, vec![2]);
        assert_eq!(read.topics[0].partitions[0].offset, -1);

        let version = ApiVersion::new(1, false);
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &version);
        let read = ListOffsetsResponse::read_from(&mut writer, &version).unwrap();
        assert!(read.topics[0].partitions[0].old_style_offsets.is_empty());
        assert_eq!(read.topics[0].partitions[0].offset, 2);
    }
}
