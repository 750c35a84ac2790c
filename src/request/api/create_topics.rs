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

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::log::validate_topic_name;
use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::service::config::{
    Action, ChannelConfig, OperationBindingsConfig, OperationConfig, Reference,
};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatableTopicAssignment {
    pub partition_index: i32,
    pub broker_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatableTopicConfig {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatableTopic {
    pub name: String,
    /// -1 picks the default
    pub num_partitions: i32,
    pub replication_factor: i16,
    pub assignments: Vec<CreatableTopicAssignment>,
    pub configs: Vec<CreatableTopicConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTopicsRequest {
    pub topics: Vec<CreatableTopic>,
    pub timeout_ms: i32,
    pub validate_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatableTopicConfigs {
    pub name: String,
    pub value: Option<String>,
    pub read_only: bool,
    pub config_source: i8,
    pub is_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatableTopicResult {
    pub name: String,
    pub topic_id: Uuid,
    pub error_code: i16,
    pub error_message: Option<String>,
    pub num_partitions: i32,
    pub replication_factor: i16,
    pub configs: Option<Vec<CreatableTopicConfigs>>,
}

impl CreatableTopicResult {
    fn failed(name: String, error: KafkaError) -> CreatableTopicResult {
        CreatableTopicResult {
            name,
            topic_id: Uuid::nil(),
            error_code: ErrorCode::from(&error).code(),
            error_message: Some(error.to_string()),
            num_partitions: -1,
            replication_factor: -1,
            configs: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTopicsResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<CreatableTopicResult>,
}

/// The channel a topic created by a client is backed by: the requested partitions and one
/// unconstrained operation per direction.
fn client_channel(name: &str, partitions: i32) -> (ChannelConfig, Vec<OperationConfig>) {
    let operations = [Action::Send, Action::Receive]
        .into_iter()
        .map(|action| OperationConfig {
            action,
            channel: Reference::Name(name.to_string()),
            bindings: OperationBindingsConfig::default(),
        })
        .collect();
    (ChannelConfig::with_partitions(partitions), operations)
}

pub struct CreateTopicsRequestHandler;

impl ApiHandler for CreateTopicsRequestHandler {
    type Request = CreateTopicsRequest;
    type Response = CreateTopicsResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: CreateTopicsRequest,
        context: &RequestContext,
    ) -> AppResult<Option<CreateTopicsResponse>> {
        let mut topics = Vec::with_capacity(request.topics.len());
        for topic in request.topics {
            if let Err(e) = validate_topic_name(&topic.name) {
                topics.push(CreatableTopicResult::failed(
                    topic.name,
                    KafkaError::InvalidTopic(e),
                ));
                continue;
            }
            if topic.num_partitions == 0 || topic.num_partitions < -1 {
                let message = format!("number of partitions was {}", topic.num_partitions);
                topics.push(CreatableTopicResult::failed(
                    topic.name,
                    KafkaError::InvalidPartitions(message),
                ));
                continue;
            }
            let partitions = topic.num_partitions.max(1);
            let result = if request.validate_only {
                match context.store.topic(&topic.name) {
                    Some(_) => Err(KafkaError::TopicAlreadyExists(topic.name.clone())),
                    None => Ok(()),
                }
            } else {
                let (channel, operations) = client_channel(&topic.name, partitions);
                context
                    .store
                    .create_topic(&topic.name, channel, operations)
                    .map(|_| ())
            };
            match result {
                Ok(()) => {
                    if !request.validate_only {
                        info!(
                            "client {} created topic {} with {} partitions",
                            context.request_header.client_id(),
                            topic.name,
                            partitions
                        );
                    }
                    topics.push(CreatableTopicResult {
                        name: topic.name,
                        topic_id: Uuid::new_v4(),
                        error_code: ErrorCode::None.code(),
                        error_message: None,
                        num_partitions: partitions,
                        replication_factor: 1,
                        configs: Some(Vec::new()),
                    });
                }
                Err(e) => {
                    warn!("create topic {} failed: {}", topic.name, e);
                    topics.push(CreatableTopicResult::failed(topic.name, e));
                }
            }
        }
        Ok(Some(CreateTopicsResponse {
            throttle_time_ms: 0,
            topics,
        }))
    }
}
