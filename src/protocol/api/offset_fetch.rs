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
        base::{Bool, NPString, PString, ProtocolType, I16, I32, I64},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        OffsetFetchPartitionResponse, OffsetFetchRequest, OffsetFetchResponse, OffsetFetchTopic,
        OffsetFetchTopicResponse,
    },
    AppResult,
};

const GROUP_ID_KEY_NAME: &str = "group_id";
const TOPICS_KEY_NAME: &str = "topics";
const NAME_KEY_NAME: &str = "name";
const PARTITION_INDEXES_KEY_NAME: &str = "partition_indexes";
const REQUIRE_STABLE_KEY_NAME: &str = "require_stable";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const PARTITIONS_KEY_NAME: &str = "partitions";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const COMMITTED_OFFSET_KEY_NAME: &str = "committed_offset";
const COMMITTED_LEADER_EPOCH_KEY_NAME: &str = "committed_leader_epoch";
const METADATA_KEY_NAME: &str = "metadata";
const ERROR_CODE_KEY_NAME: &str = "error_code";

pub static OFFSET_FETCH_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PARTITION_INDEXES_KEY_NAME,
            ProtocolType::array_of::<i32>(None),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, GROUP_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            TOPICS_KEY_NAME,
            ProtocolType::nullable_array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                topic_desc,
            ))),
            Versions::ALL,
        ),
        (
            2,
            REQUIRE_STABLE_KEY_NAME,
            ProtocolType::Bool(Bool::default()),
            Versions::since(7),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static OFFSET_FETCH_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, COMMITTED_OFFSET_KEY_NAME, ProtocolType::I64(I64::default()), Versions::ALL),
        (
            2,
            COMMITTED_LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(5),
        ),
        (3, METADATA_KEY_NAME, ProtocolType::NPString(NPString::default()), Versions::ALL),
        (4, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
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
        (2, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::since(2)),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<OffsetFetchRequest> for OffsetFetchRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = OFFSET_FETCH_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(GROUP_ID_KEY_NAME, self.group_id.into());
        let topics = self.topics.map(|topics| {
            topics
                .into_iter()
                .map(|topic| {
                    let mut topic_value_set = ValueSet::new(topic_schema.clone());
                    topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                    topic_value_set.append_field_value(
                        PARTITION_INDEXES_KEY_NAME,
                        ProtocolType::array_of(Some(topic.partition_indexes)),
                    );
                    topic_value_set
                })
                .collect()
        });
        value_set.append_nullable_value_sets(TOPICS_KEY_NAME, topics);
        value_set.append_field_value(REQUIRE_STABLE_KEY_NAME, self.require_stable.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<OffsetFetchRequest> {
        let mut value_set = OFFSET_FETCH_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let group_id = value_set.get_field_value(GROUP_ID_KEY_NAME).into();
        let topics = value_set
            .get_nullable_value_sets(TOPICS_KEY_NAME)
            .map(|topics| {
                topics
                    .into_iter()
                    .map(|mut topic| OffsetFetchTopic {
                        name: topic.get_field_value(NAME_KEY_NAME).into(),
                        partition_indexes: topic.get_field_value(PARTITION_INDEXES_KEY_NAME).into(),
                    })
                    .collect()
            });
        let require_stable = value_set.get_field_value(REQUIRE_STABLE_KEY_NAME).into();
        Ok(OffsetFetchRequest {
            group_id,
            topics,
            require_stable,
        })
    }
}

impl ProtocolCodec<OffsetFetchResponse> for OffsetFetchResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = OFFSET_FETCH_RESPONSE_SCHEMA.clone();
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
                        partition_value_set.append_field_value(
                            COMMITTED_OFFSET_KEY_NAME,
                            partition.committed_offset.into(),
                        );
                        partition_value_set.append_field_value(
                            COMMITTED_LEADER_EPOCH_KEY_NAME,
                            partition.committed_leader_epoch.into(),
                        );
                        partition_value_set
                            .append_field_value(METADATA_KEY_NAME, partition.metadata.into());
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
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<OffsetFetchResponse> {
        let mut value_set = OFFSET_FETCH_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| OffsetFetchTopicResponse {
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| OffsetFetchPartitionResponse {
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        committed_offset: partition
                            .get_field_value(COMMITTED_OFFSET_KEY_NAME)
                            .into(),
                        committed_leader_epoch: partition
                            .get_field_value(COMMITTED_LEADER_EPOCH_KEY_NAME)
                            .into(),
                        metadata: partition.get_field_value(METADATA_KEY_NAME).into(),
                        error_code: partition.get_field_value(ERROR_CODE_KEY_NAME).into(),
                    })
                    .collect(),
            })
            .collect();
        let error_code = value_set.get_field_value(ERROR_CODE_KEY_NAME).into();
        Ok(OffsetFetchResponse {
            throttle_time_ms,
            topics,
            error_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_topics_means_all() {
        let request = OffsetFetchRequest {
            group_id: "group".to_string(),
            topics: None,
            require_stable: false,
        };
        for version in [ApiVersion::new(2, false), ApiVersion::new(7, true)] {
            let mut writer = BytesMut::new();
            request.clone().write_to(&mut writer, &version);
            assert_eq!(OffsetFetchRequest::read_from(&mut writer, &version).unwrap(), request);
        }
    }

    #[test]
    fn test_response_round_trip_v6() {
        let response = OffsetFetchResponse {
            throttle_time_ms: 0,
            topics: vec![OffsetFetchTopicResponse {
                name: "foo".to_string(),
                partitions: vec![OffsetFetchPartitionResponse {
                    partition_index: 0,
                    committed_offset: 2,
                    committed_leader_epoch: -1,
                    metadata: Some(String::new()),
                    error_code: 0,
                }],
            }],
            error_code: 0,
        };
        let version = ApiVersion::new(6, true);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        assert_eq!(OffsetFetchResponse::read_from(&mut writer, &version).unwrap(), response);
    }
}
