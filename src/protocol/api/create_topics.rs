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
        base::{Bool, NPString, PString, PUuid, ProtocolType, I16, I32, I8},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        CreatableTopic, CreatableTopicAssignment, CreatableTopicConfig, CreatableTopicConfigs,
        CreatableTopicResult, CreateTopicsRequest, CreateTopicsResponse,
    },
    AppResult,
};

const TOPICS_KEY_NAME: &str = "topics";
const NAME_KEY_NAME: &str = "name";
const NUM_PARTITIONS_KEY_NAME: &str = "num_partitions";
const REPLICATION_FACTOR_KEY_NAME: &str = "replication_factor";
const ASSIGNMENTS_KEY_NAME: &str = "assignments";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const BROKER_IDS_KEY_NAME: &str = "broker_ids";
const CONFIGS_KEY_NAME: &str = "configs";
const VALUE_KEY_NAME: &str = "value";
const TIMEOUT_KEY_NAME: &str = "timeout_ms";
const VALIDATE_ONLY_KEY_NAME: &str = "validate_only";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const TOPIC_ID_KEY_NAME: &str = "topic_id";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const ERROR_MESSAGE_KEY_NAME: &str = "error_message";
const READ_ONLY_KEY_NAME: &str = "read_only";
const CONFIG_SOURCE_KEY_NAME: &str = "config_source";
const IS_SENSITIVE_KEY_NAME: &str = "is_sensitive";

pub static CREATE_TOPICS_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let assignment_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, BROKER_IDS_KEY_NAME, ProtocolType::array_of::<i32>(None), Versions::ALL),
    ];
    let config_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, VALUE_KEY_NAME, ProtocolType::NPString(NPString::default()), Versions::ALL),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, NUM_PARTITIONS_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            2,
            REPLICATION_FACTOR_KEY_NAME,
            ProtocolType::I16(I16::default()),
            Versions::ALL,
        ),
        (
            3,
            ASSIGNMENTS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                assignment_desc,
            ))),
            Versions::ALL,
        ),
        (
            4,
            CONFIGS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(config_desc))),
            Versions::ALL,
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
        (1, TIMEOUT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            2,
            VALIDATE_ONLY_KEY_NAME,
            ProtocolType::Bool(Bool::default()),
            Versions::since(1),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static CREATE_TOPICS_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let config_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, VALUE_KEY_NAME, ProtocolType::NPString(NPString::default()), Versions::ALL),
        (2, READ_ONLY_KEY_NAME, ProtocolType::Bool(Bool::default()), Versions::ALL),
        (3, CONFIG_SOURCE_KEY_NAME, ProtocolType::I8(I8 { value: -1 }), Versions::ALL),
        (4, IS_SENSITIVE_KEY_NAME, ProtocolType::Bool(Bool::default()), Versions::ALL),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, TOPIC_ID_KEY_NAME, ProtocolType::PUuid(PUuid::default()), Versions::since(7)),
        (2, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            3,
            ERROR_MESSAGE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(1),
        ),
        (
            4,
            NUM_PARTITIONS_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(5),
        ),
        (
            5,
            REPLICATION_FACTOR_KEY_NAME,
            ProtocolType::I16(I16 { value: -1 }),
            Versions::since(5),
        ),
        (
            6,
            CONFIGS_KEY_NAME,
            ProtocolType::nullable_array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                config_desc,
            ))),
            Versions::since(5),
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

impl ProtocolCodec<CreateTopicsRequest> for CreateTopicsRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = CREATE_TOPICS_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let assignment_schema = topic_schema.sub_schema_of_ary_field(ASSIGNMENTS_KEY_NAME);
        let config_schema = topic_schema.sub_schema_of_ary_field(CONFIGS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                topic_value_set
                    .append_field_value(NUM_PARTITIONS_KEY_NAME, topic.num_partitions.into());
                topic_value_set.append_field_value(
                    REPLICATION_FACTOR_KEY_NAME,
                    topic.replication_factor.into(),
                );
                let assignments = topic
                    .assignments
                    .into_iter()
                    .map(|assignment| {
                        let mut assignment_value_set = ValueSet::new(assignment_schema.clone());
                        assignment_value_set.append_field_value(
                            PARTITION_INDEX_KEY_NAME,
                            assignment.partition_index.into(),
                        );
                        assignment_value_set.append_field_value(
                            BROKER_IDS_KEY_NAME,
                            ProtocolType::array_of(Some(assignment.broker_ids)),
                        );
                        assignment_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(ASSIGNMENTS_KEY_NAME, assignments);
                let configs = topic
                    .configs
                    .into_iter()
                    .map(|config| {
                        let mut config_value_set = ValueSet::new(config_schema.clone());
                        config_value_set.append_field_value(NAME_KEY_NAME, config.name.into());
                        config_value_set.append_field_value(VALUE_KEY_NAME, config.value.into());
                        config_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(CONFIGS_KEY_NAME, configs);
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.append_field_value(TIMEOUT_KEY_NAME, self.timeout_ms.into());
        value_set.append_field_value(VALIDATE_ONLY_KEY_NAME, self.validate_only.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<CreateTopicsRequest> {
        let mut value_set = CREATE_TOPICS_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| {
                let name = topic.get_field_value(NAME_KEY_NAME).into();
                let num_partitions = topic.get_field_value(NUM_PARTITIONS_KEY_NAME).into();
                let replication_factor = topic.get_field_value(REPLICATION_FACTOR_KEY_NAME).into();
                let assignments = topic
                    .get_value_sets(ASSIGNMENTS_KEY_NAME)
                    .into_iter()
                    .map(|mut assignment| CreatableTopicAssignment {
                        partition_index: assignment.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        broker_ids: assignment.get_field_value(BROKER_IDS_KEY_NAME).into(),
                    })
                    .collect();
                let configs = topic
                    .get_value_sets(CONFIGS_KEY_NAME)
                    .into_iter()
                    .map(|mut config| CreatableTopicConfig {
                        name: config.get_field_value(NAME_KEY_NAME).into(),
                        value: config.get_field_value(VALUE_KEY_NAME).into(),
                    })
                    .collect();
                CreatableTopic {
                    name,
                    num_partitions,
                    replication_factor,
                    assignments,
                    configs,
                }
            })
            .collect();
        let timeout_ms = value_set.get_field_value(TIMEOUT_KEY_NAME).into();
        let validate_only = value_set.get_field_value(VALIDATE_ONLY_KEY_NAME).into();
        Ok(CreateTopicsRequest {
            topics,
            timeout_ms,
            validate_only,
        })
    }
}

impl CreatableTopicResult {
    fn encode_to_value_set(self, topic_schema: &Arc<Schema>) -> ValueSet {
        let config_schema = topic_schema.sub_schema_of_ary_field(CONFIGS_KEY_NAME);
        let mut topic_value_set = ValueSet::new(topic_schema.clone());
        topic_value_set.append_field_value(NAME_KEY_NAME, self.name.into());
        topic_value_set.append_field_value(TOPIC_ID_KEY_NAME, self.topic_id.into());
        topic_value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        topic_value_set.append_field_value(ERROR_MESSAGE_KEY_NAME, self.error_message.into());
        topic_value_set.append_field_value(NUM_PARTITIONS_KEY_NAME, self.num_partitions.into());
        topic_value_set
            .append_field_value(REPLICATION_FACTOR_KEY_NAME, self.replication_factor.into());
        let configs = self.configs.map(|configs| {
            configs
                .into_iter()
                .map(|config| {
                    let mut config_value_set = ValueSet::new(config_schema.clone());
                    config_value_set.append_field_value(NAME_KEY_NAME, config.name.into());
                    config_value_set.append_field_value(VALUE_KEY_NAME, config.value.into());
                    config_value_set.append_field_value(READ_ONLY_KEY_NAME, config.read_only.into());
                    config_value_set
                        .append_field_value(CONFIG_SOURCE_KEY_NAME, config.config_source.into());
                    config_value_set
                        .append_field_value(IS_SENSITIVE_KEY_NAME, config.is_sensitive.into());
                    config_value_set
                })
                .collect()
        });
        topic_value_set.append_nullable_value_sets(CONFIGS_KEY_NAME, configs);
        topic_value_set
    }

    fn decode_from_value_set(mut topic: ValueSet) -> CreatableTopicResult {
        let configs = topic.get_nullable_value_sets(CONFIGS_KEY_NAME).map(|configs| {
            configs
                .into_iter()
                .map(|mut config| CreatableTopicConfigs {
                    name: config.get_field_value(NAME_KEY_NAME).into(),
                    value: config.get_field_value(VALUE_KEY_NAME).into(),
                    read_only: config.get_field_value(READ_ONLY_KEY_NAME).into(),
                    config_source: config.get_field_value(CONFIG_SOURCE_KEY_NAME).into(),
                    is_sensitive: config.get_field_value(IS_SENSITIVE_KEY_NAME).into(),
                })
                .collect()
        });
        CreatableTopicResult {
            name: topic.get_field_value(NAME_KEY_NAME).into(),
            topic_id: topic.get_field_value(TOPIC_ID_KEY_NAME).into(),
            error_code: topic.get_field_value(ERROR_CODE_KEY_NAME).into(),
            error_message: topic.get_field_value(ERROR_MESSAGE_KEY_NAME).into(),
            num_partitions: topic.get_field_value(NUM_PARTITIONS_KEY_NAME).into(),
            replication_factor: topic.get_field_value(REPLICATION_FACTOR_KEY_NAME).into(),
            configs,
        }
    }
}

impl ProtocolCodec<CreateTopicsResponse> for CreateTopicsResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = CREATE_TOPICS_RESPONSE_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        let topics = self
            .topics
            .into_iter()
            .map(|topic| topic.encode_to_value_set(&topic_schema))
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<CreateTopicsResponse> {
        let mut value_set = CREATE_TOPICS_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(CreatableTopicResult::decode_from_value_set)
            .collect();
        Ok(CreateTopicsResponse {
            throttle_time_ms,
            topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_request_round_trip() {
        let request = CreateTopicsRequest {
            topics: vec![CreatableTopic {
                name: "orders".to_string(),
                num_partitions: 3,
                replication_factor: 1,
                assignments: vec![CreatableTopicAssignment {
                    partition_index: 0,
                    broker_ids: vec![0],
                }],
                configs: vec![CreatableTopicConfig {
                    name: "retention.ms".to_string(),
                    value: Some("1000".to_string()),
                }],
            }],
            timeout_ms: 5000,
            validate_only: true,
        };
        for version in [ApiVersion::new(4, false), ApiVersion::new(7, true)] {
            let mut writer = BytesMut::new();
            request.clone().write_to(&mut writer, &version);
            assert_eq!(CreateTopicsRequest::read_from(&mut writer, &version).unwrap(), request);
        }
    }

    #[test]
    fn test_response_fields_by_version() {
        let response = CreateTopicsResponse {
            throttle_time_ms: 0,
            topics: vec![CreatableTopicResult {
                name: "orders".to_string(),
                topic_id: Uuid::new_v4(),
                error_code: 36,
                error_message: Some("exists".to_string()),
                num_partitions: 3,
                replication_factor: 1,
                configs: Some(vec![]),
            }],
        };

        let version = ApiVersion::new(7, true);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        assert_eq!(CreateTopicsResponse::read_from(&mut writer, &version).unwrap(), response);

        let version = ApiVersion::new(1, false);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        let read = CreateTopicsResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.topics[0].topic_id, Uuid::nil());
        assert_eq!(read.topics[0].num_partitions, -1);
        assert_eq!(read.topics[0].configs, None);
        assert_eq!(read.topics[0].error_message, Some("exists".to_string()));
    }
}
