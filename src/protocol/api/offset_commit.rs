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
        base::{NPString, PString, ProtocolType, I16, I32, I64},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        OffsetCommitPartition, OffsetCommitPartitionResponse, OffsetCommitRequest,
        OffsetCommitResponse, OffsetCommitTopic, OffsetCommitTopicResponse,
    },
    AppResult,
};

const GROUP_ID_KEY_NAME: &str = "group_id";
const GENERATION_ID_KEY_NAME: &str = "generation_id";
const MEMBER_ID_KEY_NAME: &str = "member_id";
const GROUP_INSTANCE_ID_KEY_NAME: &str = "group_instance_id";
const RETENTION_TIME_KEY_NAME: &str = "retention_time_ms";
const TOPICS_KEY_NAME: &str = "topics";
const NAME_KEY_NAME: &str = "name";
const PARTITIONS_KEY_NAME: &str = "partitions";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const COMMITTED_OFFSET_KEY_NAME: &str = "committed_offset";
const COMMITTED_LEADER_EPOCH_KEY_NAME: &str = "committed_leader_epoch";
const COMMIT_TIMESTAMP_KEY_NAME: &str = "commit_timestamp";
const COMMITTED_METADATA_KEY_NAME: &str = "committed_metadata";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";

pub static OFFSET_COMMIT_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, COMMITTED_OFFSET_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            2,
            COMMITTED_LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(6),
        ),
        (
            3,
            COMMIT_TIMESTAMP_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::range(1, 1),
        ),
        (
            4,
            COMMITTED_METADATA_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::ALL,
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
        (0, GROUP_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            GENERATION_ID_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(1),
        ),
        (
            2,
            MEMBER_ID_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::since(1),
        ),
        (
            3,
            GROUP_INSTANCE_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(7),
        ),
        (
            4,
            RETENTION_TIME_KEY_NAME,
            ProtocolType::I64(I64 { value: -1 }),
            Versions::range(2, 4),
        ),
        (
            5,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static OFFSET_COMMIT_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
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
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(3)),
        (
            1,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<OffsetCommitRequest> for OffsetCommitRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = OFFSET_COMMIT_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(GROUP_ID_KEY_NAME, self.group_id.into());
        value_set.append_field_value(GENERATION_ID_KEY_NAME, self.generation_id.into());
        value_set.append_field_value(MEMBER_ID_KEY_NAME, self.member_id.into());
        value_set.append_field_value(GROUP_INSTANCE_ID_KEY_NAME, self.group_instance_id.into());
        value_set.append_field_value(RETENTION_TIME_KEY_NAME, self.retention_time_ms.into());
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
                            COMMITTED_OFFSET_KEY_NAME,
                            partition.committed_offset.into(),
                        );
                        partition_value_set.append_field_value(
                            COMMITTED_LEADER_EPOCH_KEY_NAME,
                            partition.committed_leader_epoch.into(),
                        );
                        partition_value_set.append_field_value(
                            COMMIT_TIMESTAMP_KEY_NAME,
                            partition.commit_timestamp.into(),
                        );
                        partition_value_set.append_field_value(
                            COMMITTED_METADATA_KEY_NAME,
                            partition.committed_metadata.into(),
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

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<OffsetCommitRequest> {
        let mut value_set = OFFSET_COMMIT_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let group_id = value_set.get_field_value(GROUP_ID_KEY_NAME).into();
        let generation_id = value_set.get_field_value(GENERATION_ID_KEY_NAME).into();
        let member_id = value_set.get_field_value(MEMBER_ID_KEY_NAME).into();
        let group_instance_id = value_set.get_field_value(GROUP_INSTANCE_ID_KEY_NAME).into();
        let retention_time_ms = value_set.get_field_value(RETENTION_TIME_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| OffsetCommitTopic {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| OffsetCommitPartition {
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        committed_offset: partition
                            .get_field_value(COMMITTED_OFFSET_KEY_NAME)
                            .into(),
                        committed_leader_epoch: partition
                            .get_field_value(COMMITTED_LEADER_EPOCH_KEY_NAME)
                            .into(),
                        commit_timestamp: partition
                            .get_field_value(COMMIT_TIMESTAMP_KEY_NAME)
                            .into(),
                        committed_metadata: partition
                            .get_field_value(COMMITTED_METADATA_KEY_NAME)
                            .into(),
                    })
                    .collect(),
            })
            .collect();
        Ok(OffsetCommitRequest {
            group_id,
            generation_id,
            member_id,
            group_instance_id,
            retention_time_ms,
            topics,
        })
    }
}

impl ProtocolCodec<OffsetCommitResponse> for OffsetCommitResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = OFFSET_COMMIT_RESPONSE_SCHEMA.clone();
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

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<OffsetCommitResponse> {
        let mut value_set = OFFSET_COMMIT_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| OffsetCommitTopicResponse {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| OffsetCommitPartitionResponse {
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        error_code: partition.get_field_value(ERROR_CODE_KEY_NAME).into(),
                    })
                    .collect(),
            })
            .collect();
        Ok(OffsetCommitResponse {
            throttle_time_ms,
            topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> OffsetCommitRequest {
        OffsetCommitRequest {
            group_id: "group".to_string(),
            generation_id: 1,
            member_id: "member-1".to_string(),
            group_instance_id: None,
            retention_time_ms: -1,
            topics: vec![OffsetCommitTopic {
                name: "foo".to_string(),
                partitions: vec![OffsetCommitPartition {
                    partition_index: 0,
                    committed_offset: 2,
                    committed_leader_epoch: -1,
                    commit_timestamp: -1,
                    committed_metadata: Some(String::new()),
                }],
            }],
        }
    }

    #[test]
    fn test_request_across_versions() {
        for version in [
            ApiVersion::new(2, false),
            ApiVersion::new(7, false),
            ApiVersion::new(8, true),
        ] {
            let mut writer = BytesMut::new();
            sample_request().write_to(&mut writer, &version);
            let read = OffsetCommitRequest::read_from(&mut writer, &version).unwrap();
            assert_eq!(read, sample_request());
        }
    }

    #[test]
    fn test_v0_request_has_no_member() {
        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        sample_request().write_to(&mut writer, &version);
        let read = OffsetCommitRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.member_id, "");
        assert_eq!(read.generation_id, -1);
    }
}
