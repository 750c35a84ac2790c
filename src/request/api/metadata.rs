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

use crate::log::{validate_topic_name, Topic};
use crate::protocol::api::AUTHORIZED_OPERATIONS_OMITTED;
use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

/// Partitions always report this broker id as their leader, there is no replication.
const LEADER_ID: i32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    /// `None` and an empty list both ask for every topic
    pub topics: Option<Vec<String>>,
    pub allow_auto_topic_creation: bool,
    pub include_cluster_authorized_operations: bool,
    pub include_topic_authorized_operations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBroker {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPartition {
    pub error_code: i16,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTopic {
    pub error_code: i16,
    pub name: String,
    pub is_internal: bool,
    pub partitions: Vec<MetadataPartition>,
    pub topic_authorized_operations: i32,
}

impl MetadataTopic {
    fn error(name: String, error_code: ErrorCode) -> MetadataTopic {
        MetadataTopic {
            error_code: error_code.code(),
            name,
            is_internal: false,
            partitions: Vec::new(),
            topic_authorized_operations: AUTHORIZED_OPERATIONS_OMITTED,
        }
    }

    fn describe(topic: &Topic) -> MetadataTopic {
        let partitions = topic
            .partitions()
            .iter()
            .map(|partition| MetadataPartition {
                error_code: ErrorCode::None.code(),
                partition_index: partition.index,
                leader_id: LEADER_ID,
                leader_epoch: 0,
                replica_nodes: Vec::new(),
                isr_nodes: Vec::new(),
                offline_replicas: Vec::new(),
            })
            .collect();
        MetadataTopic {
            error_code: ErrorCode::None.code(),
            name: topic.name.clone(),
            is_internal: false,
            partitions,
            topic_authorized_operations: AUTHORIZED_OPERATIONS_OMITTED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub throttle_time_ms: i32,
    pub brokers: Vec<MetadataBroker>,
    pub cluster_id: Option<String>,
    pub controller_id: i32,
    pub topics: Vec<MetadataTopic>,
    pub cluster_authorized_operations: i32,
}

impl Default for MetadataResponse {
    fn default() -> Self {
        MetadataResponse {
            throttle_time_ms: 0,
            brokers: Vec::new(),
            cluster_id: None,
            controller_id: -1,
            topics: Vec::new(),
            cluster_authorized_operations: AUTHORIZED_OPERATIONS_OMITTED,
        }
    }
}

pub struct MetadataRequestHandler;

impl ApiHandler for MetadataRequestHandler {
    type Request = MetadataRequest;
    type Response = MetadataResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: MetadataRequest,
        context: &RequestContext,
    ) -> AppResult<Option<MetadataResponse>> {
        // recorded only, topics are created through CreateTopics
        context
            .client
            .set_allow_auto_topic_creation(request.allow_auto_topic_creation);

        // the broker a client talks to is the only one it learns about
        let broker = context.broker();
        let brokers = broker
            .iter()
            .map(|broker| MetadataBroker {
                node_id: LEADER_ID,
                host: broker.host.clone(),
                port: broker.port as i32,
                rack: None,
            })
            .collect();

        let topics = match request.topics {
            Some(names) if !names.is_empty() => names
                .into_iter()
                .map(|name| {
                    if let Err(e) = validate_topic_name(&name) {
                        debug!("metadata for invalid topic: {}", e);
                        return MetadataTopic::error(name, ErrorCode::InvalidTopic);
                    }
                    match context.store.topic(&name) {
                        Some(topic) => MetadataTopic::describe(&topic),
                        None => {
                            debug!(
                                "metadata for unknown topic {}, auto creation requested: {}",
                                name,
                                context.client.allow_auto_topic_creation()
                            );
                            MetadataTopic::error(name, ErrorCode::UnknownTopicOrPartition)
                        }
                    }
                })
                .collect(),
            _ => context
                .store
                .topics()
                .iter()
                .filter(|topic| {
                    broker
                        .as_ref()
                        .map_or(true, |broker| topic.is_available_on(&broker.name))
                })
                .map(|topic| MetadataTopic::describe(topic))
                .collect(),
        };

        Ok(Some(MetadataResponse {
            brokers,
            cluster_id: Some(context.store.cluster_name()),
            controller_id: LEADER_ID,
            topics,
            ..Default::default()
        }))
    }
}
