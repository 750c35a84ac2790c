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
        base::{Bool, NPString, PString, ProtocolType, I16, I32},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{
        MetadataBroker, MetadataPartition, MetadataRequest, MetadataResponse, MetadataTopic,
    },
    AppResult,
};

const TOPICS_KEY_NAME: &str = "topics";
const NAME_KEY_NAME: &str = "name";
const ALLOW_AUTO_TOPIC_CREATION_KEY_NAME: &str = "allow_auto_topic_creation";
const INCLUDE_CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME: &str = "include_cluster_authorized_operations";
const INCLUDE_TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME: &str = "include_topic_authorized_operations";

const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const BROKERS_KEY_NAME: &str = "brokers";
const NODE_ID_KEY_NAME: &str = "node_id";
const HOST_KEY_NAME: &str = "host";
const PORT_KEY_NAME: &str = "port";
const RACK_KEY_NAME: &str = "rack";
const CLUSTER_ID_KEY_NAME: &str = "cluster_id";
const CONTROLLER_ID_KEY_NAME: &str = "controller_id";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const IS_INTERNAL_KEY_NAME: &str = "is_internal";
const PARTITIONS_KEY_NAME: &str = "partitions";
const PARTITION_INDEX_KEY_NAME: &str = "partition_index";
const LEADER_ID_KEY_NAME: &str = "leader_id";
const LEADER_EPOCH_KEY_NAME: &str = "leader_epoch";
const REPLICA_NODES_KEY_NAME: &str = "replica_nodes";
const ISR_NODES_KEY_NAME: &str = "isr_nodes";
const OFFLINE_REPLICAS_KEY_NAME: &str = "offline_replicas";
const TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME: &str = "topic_authorized_operations";
const CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME: &str = "cluster_authorized_operations";

// authorized operations are not computed
pub const AUTHORIZED_OPERATIONS_OMITTED: i32 = i32::MIN;

pub static METADATA_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![(
        0,
        NAME_KEY_NAME,
        ProtocolType::PString(PString::default()),
        Versions::ALL,
    )];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            TOPICS_KEY_NAME,
            ProtocolType::nullable_array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                topic_desc,
            ))),
            Versions::ALL,
        ),
        (
            1,
            ALLOW_AUTO_TOPIC_CREATION_KEY_NAME,
            ProtocolType::Bool(Bool { value: true }),
            Versions::since(4),
        ),
        (
            2,
            INCLUDE_CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME,
            ProtocolType::Bool(Bool::default()),
            Versions::range(8, 10),
        ),
        (
            3,
            INCLUDE_TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME,
            ProtocolType::Bool(Bool::default()),
            Versions::since(8),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static METADATA_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let broker_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NODE_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, HOST_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (2, PORT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (3, RACK_KEY_NAME, ProtocolType::NPString(NPString::default()), Versions::since(1)),
    ];
    let partition_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (1, PARTITION_INDEX_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (2, LEADER_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            3,
            LEADER_EPOCH_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(7),
        ),
        (4, REPLICA_NODES_KEY_NAME, ProtocolType::array_of::<i32>(None), Versions::ALL),
        (5, ISR_NODES_KEY_NAME, ProtocolType::array_of::<i32>(None), Versions::ALL),
        (
            6,
            OFFLINE_REPLICAS_KEY_NAME,
            ProtocolType::array_of::<i32>(None),
            Versions::since(5),
        ),
    ];
    let topic_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (1, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (2, IS_INTERNAL_KEY_NAME, ProtocolType::Bool(Bool::default()), Versions::since(1)),
        (
            3,
            PARTITIONS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(partition_desc))),
            Versions::ALL,
        ),
        (
            4,
            TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME,
            ProtocolType::I32(I32 {
                value: AUTHORIZED_OPERATIONS_OMITTED,
            }),
            Versions::since(8),
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(3)),
        (
            1,
            BROKERS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(broker_desc))),
            Versions::ALL,
        ),
        (
            2,
            CLUSTER_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(2),
        ),
        (
            3,
            CONTROLLER_ID_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(1),
        ),
        (
            4,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(topic_desc))),
            Versions::ALL,
        ),
        (
            5,
            CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME,
            ProtocolType::I32(I32 {
                value: AUTHORIZED_OPERATIONS_OMITTED,
            }),
            Versions::range(8, 10),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<MetadataRequest> for MetadataRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = METADATA_REQUEST_SCHEMA.clone();
        let topic_schema = schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        // version 0 has no null topic list, an empty list asks for every topic
        let topics = match self.topics {
            None if api_version.as_i16() == 0 => Some(vec![]),
            topics => topics,
        };
        let topics = topics.map(|topics| {
            topics
                .into_iter()
                .map(|name| {
                    let mut topic = ValueSet::new(topic_schema.clone());
                    topic.append_field_value(NAME_KEY_NAME, name.into());
                    topic
                })
                .collect()
        });
        value_set.append_nullable_value_sets(TOPICS_KEY_NAME, topics);
        value_set.append_field_value(
            ALLOW_AUTO_TOPIC_CREATION_KEY_NAME,
            self.allow_auto_topic_creation.into(),
        );
        value_set.append_field_value(
            INCLUDE_CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME,
            self.include_cluster_authorized_operations.into(),
        );
        value_set.append_field_value(
            INCLUDE_TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME,
            self.include_topic_authorized_operations.into(),
        );
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<MetadataRequest> {
        let mut value_set = METADATA_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        let topics = value_set.get_nullable_value_sets(TOPICS_KEY_NAME).map(|topics| {
            topics
                .into_iter()
                .map(|mut topic| topic.get_field_value(NAME_KEY_NAME).into())
                .collect()
        });
        Ok(MetadataRequest {
            topics,
            allow_auto_topic_creation: value_set
                .get_field_value(ALLOW_AUTO_TOPIC_CREATION_KEY_NAME)
                .into(),
            include_cluster_authorized_operations: value_set
                .get_field_value(INCLUDE_CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME)
                .into(),
            include_topic_authorized_operations: value_set
                .get_field_value(INCLUDE_TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME)
                .into(),
        })
    }
}

impl ProtocolCodec<MetadataResponse> for MetadataResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(METADATA_RESPONSE_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<MetadataResponse> {
        let mut value_set = METADATA_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        MetadataResponse::decode_from_value_set(&mut value_set)
    }
}

impl MetadataResponse {
    fn encode_to_value_set(self, value_set: &mut ValueSet) {
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());

        let broker_schema = value_set.schema.sub_schema_of_ary_field(BROKERS_KEY_NAME);
        let brokers = self
            .brokers
            .into_iter()
            .map(|broker| {
                let mut broker_value_set = ValueSet::new(broker_schema.clone());
                broker_value_set.append_field_value(NODE_ID_KEY_NAME, broker.node_id.into());
                broker_value_set.append_field_value(HOST_KEY_NAME, broker.host.into());
                broker_value_set.append_field_value(PORT_KEY_NAME, broker.port.into());
                broker_value_set.append_field_value(RACK_KEY_NAME, broker.rack.into());
                broker_value_set
            })
            .collect();
        value_set.append_value_sets(BROKERS_KEY_NAME, brokers);
        value_set.append_field_value(CLUSTER_ID_KEY_NAME, self.cluster_id.into());
        value_set.append_field_value(CONTROLLER_ID_KEY_NAME, self.controller_id.into());

        let topic_schema = value_set.schema.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let partition_schema = topic_schema.sub_schema_of_ary_field(PARTITIONS_KEY_NAME);
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(ERROR_CODE_KEY_NAME, topic.error_code.into());
                topic_value_set.append_field_value(NAME_KEY_NAME, topic.name.into());
                topic_value_set.append_field_value(IS_INTERNAL_KEY_NAME, topic.is_internal.into());
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|partition| {
                        let mut partition_value_set = ValueSet::new(partition_schema.clone());
                        partition_value_set
                            .append_field_value(ERROR_CODE_KEY_NAME, partition.error_code.into());
                        partition_value_set.append_field_value(
                            PARTITION_INDEX_KEY_NAME,
                            partition.partition_index.into(),
                        );
                        partition_value_set
                            .append_field_value(LEADER_ID_KEY_NAME, partition.leader_id.into());
                        partition_value_set.append_field_value(
                            LEADER_EPOCH_KEY_NAME,
                            partition.leader_epoch.into(),
                        );
                        partition_value_set.append_field_value(
                            REPLICA_NODES_KEY_NAME,
                            ProtocolType::array_of(Some(partition.replica_nodes)),
                        );
                        partition_value_set.append_field_value(
                            ISR_NODES_KEY_NAME,
                            ProtocolType::array_of(Some(partition.isr_nodes)),
                        );
                        partition_value_set.append_field_value(
                            OFFLINE_REPLICAS_KEY_NAME,
                            ProtocolType::array_of(Some(partition.offline_replicas)),
                        );
                        partition_value_set
                    })
                    .collect();
                topic_value_set.append_value_sets(PARTITIONS_KEY_NAME, partitions);
                topic_value_set.append_field_value(
                    TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME,
                    topic.topic_authorized_operations.into(),
                );
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.append_field_value(
            CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME,
            self.cluster_authorized_operations.into(),
        );
    }

    fn decode_from_value_set(value_set: &mut ValueSet) -> AppResult<MetadataResponse> {
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let brokers = value_set
            .get_value_sets(BROKERS_KEY_NAME)
            .into_iter()
            .map(|mut broker| MetadataBroker {
                node_id: broker.get_field_value(NODE_ID_KEY_NAME).into(),
                host: broker.get_field_value(HOST_KEY_NAME).into(),
                port: broker.get_field_value(PORT_KEY_NAME).into(),
                rack: broker.get_field_value(RACK_KEY_NAME).into(),
            })
            .collect();
        let cluster_id = value_set.get_field_value(CLUSTER_ID_KEY_NAME).into();
        let controller_id = value_set.get_field_value(CONTROLLER_ID_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| MetadataTopic {
                error_code: topic.get_field_value(ERROR_CODE_KEY_NAME).into(),
                name: topic.get_field_value(NAME_KEY_NAME).into(),
                is_internal: topic.get_field_value(IS_INTERNAL_KEY_NAME).into(),
                partitions: topic
                    .get_value_sets(PARTITIONS_KEY_NAME)
                    .into_iter()
                    .map(|mut partition| MetadataPartition {
                        error_code: partition.get_field_value(ERROR_CODE_KEY_NAME).into(),
                        partition_index: partition.get_field_value(PARTITION_INDEX_KEY_NAME).into(),
                        leader_id: partition.get_field_value(LEADER_ID_KEY_NAME).into(),
                        leader_epoch: partition.get_field_value(LEADER_EPOCH_KEY_NAME).into(),
                        replica_nodes: partition.get_field_value(REPLICA_NODES_KEY_NAME).into(),
                        isr_nodes: partition.get_field_value(ISR_NODES_KEY_NAME).into(),
                        offline_replicas: partition
                            .get_field_value(OFFLINE_REPLICAS_KEY_NAME)
                            .into(),
                    })
                    .collect(),
                topic_authorized_operations: topic
                    .get_field_value(TOPIC_AUTHORIZED_OPERATIONS_KEY_NAME)
                    .into(),
            })
            .collect();
        let cluster_authorized_operations = value_set
            .get_field_value(CLUSTER_AUTHORIZED_OPERATIONS_KEY_NAME)
            .into();
        Ok(MetadataResponse {
            throttle_time_ms,
            brokers,
            cluster_id,
            controller_id,
            topics,
            cluster_authorized_operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> MetadataResponse {
        MetadataResponse {
            throttle_time_ms: 0,
            brokers: vec![MetadataBroker {
                node_id: 0,
                host: "localhost".to_string(),
                port: 9092,
                rack: None,
            }],
            cluster_id: Some("mockafka".to_string()),
            controller_id: 0,
            topics: vec![MetadataTopic {
                error_code: 0,
                name: "foo".to_string(),
                is_internal: false,
                partitions: vec![MetadataPartition {
                    error_code: 0,
                    partition_index: 0,
                    leader_id: 0,
                    leader_epoch: -1,
                    replica_nodes: vec![],
                    isr_nodes: vec![],
                    offline_replicas: vec![],
                }],
                topic_authorized_operations: AUTHORIZED_OPERATIONS_OMITTED,
            }],
            cluster_authorized_operations: AUTHORIZED_OPERATIONS_OMITTED,
        }
    }

    #[test]
    fn test_response_across_versions() {
        for version in [ApiVersion::new(4, false), ApiVersion::new(9, true)] {
            let mut writer = BytesMut::new();
            sample_response().write_to(&mut writer, &version);
            let read = MetadataResponse::read_from(&mut writer, &version).unwrap();
            assert_eq!(read, sample_response());
            assert!(writer.is_empty());
        }
    }

    #[test]
    fn test_v0_response_drops_later_fields() {
        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        sample_response().write_to(&mut writer, &version);
        let read = MetadataResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.cluster_id, None);
        assert_eq!(read.controller_id, -1);
        assert_eq!(read.topics[0].partitions[0].leader_epoch, -1);
    }

    #[test]
    fn test_request_null_topics() {
        let request = MetadataRequest {
            topics: None,
            allow_auto_topic_creation: false,
            include_cluster_authorized_operations: false,
            include_topic_authorized_operations: false,
        };
        let version = ApiVersion::new(9, true);
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &version);
        assert_eq!(writer[0], 0);
        assert_eq!(MetadataRequest::read_from(&mut writer, &version).unwrap(), request);

        let version = ApiVersion::new(0, false);
        let mut writer = BytesMut::new();
        request.write_to(&mut writer, &version);
        let read = MetadataRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.topics, Some(vec![]));
        assert!(read.allow_auto_topic_creation);
    }
}
