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

use crate::request::{ErrorCode, KafkaError, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitProducerIdRequest {
    pub transactional_id: Option<String>,
    pub transaction_timeout_ms: i32,
    /// -1 asks for a new producer id
    pub producer_id: i64,
    pub producer_epoch: i16,
}

impl Default for InitProducerIdRequest {
    fn default() -> Self {
        InitProducerIdRequest {
            transactional_id: None,
            transaction_timeout_ms: 0,
            producer_id: -1,
            producer_epoch: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitProducerIdResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub producer_id: i64,
    pub producer_epoch: i16,
}

pub struct InitProducerIdRequestHandler;

impl ApiHandler for InitProducerIdRequestHandler {
    type Request = InitProducerIdRequest;
    type Response = InitProducerIdResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: InitProducerIdRequest,
        context: &RequestContext,
    ) -> AppResult<Option<InitProducerIdResponse>> {
        let result = match request.transactional_id.as_deref() {
            Some(id) if !id.is_empty() => Err(KafkaError::UnsupportedForMessageFormat(format!(
                "transactional producer {} is not supported",
                id
            ))),
            _ => context
                .store
                .init_producer_id(request.producer_id, request.producer_epoch),
        };
        let response = match result {
            Ok((producer_id, producer_epoch)) => {
                debug!(
                    "producer {} of client {} at epoch {}",
                    producer_id,
                    context.request_header.client_id(),
                    producer_epoch
                );
                InitProducerIdResponse {
                    throttle_time_ms: 0,
                    error_code: ErrorCode::None.code(),
                    producer_id,
                    producer_epoch,
                }
            }
            Err(e) => {
                debug!("init producer id failed: {}", e);
                InitProducerIdResponse {
                    throttle_time_ms: 0,
                    error_code: ErrorCode::from(&e).code(),
                    producer_id: -1,
                    producer_epoch: -1,
                }
            }
        };
        Ok(Some(response))
    }
}
