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

use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

const KEY_TYPE_GROUP: i8 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindCoordinatorRequest {
    pub key: String,
    pub key_type: i8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindCoordinatorResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub error_message: Option<String>,
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

impl FindCoordinatorResponse {
    fn error(error_code: ErrorCode, message: String) -> FindCoordinatorResponse {
        FindCoordinatorResponse {
            throttle_time_ms: 0,
            error_code: error_code.code(),
            error_message: Some(message),
            node_id: -1,
            host: String::new(),
            port: -1,
        }
    }
}

pub struct FindCoordinatorRequestHandler;

impl ApiHandler for FindCoordinatorRequestHandler {
    type Request = FindCoordinatorRequest;
    type Response = FindCoordinatorResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: FindCoordinatorRequest,
        context: &RequestContext,
    ) -> AppResult<Option<FindCoordinatorResponse>> {
        if request.key_type != KEY_TYPE_GROUP {
            return Ok(Some(FindCoordinatorResponse::error(
                ErrorCode::Unknown,
                format!("unsupported request key_type={}", request.key_type),
            )));
        }
        let Some(broker) = context.broker() else {
            return Ok(Some(FindCoordinatorResponse::error(
                ErrorCode::Unknown,
                format!("no broker listens on port {}", context.client.local_port),
            )));
        };

        context.store.get_or_create_group(&request.key, &broker);
        debug!(
            "broker {} coordinates group {}",
            broker.name, request.key
        );
        Ok(Some(FindCoordinatorResponse {
            throttle_time_ms: 0,
            error_code: ErrorCode::None.code(),
            error_message: None,
            node_id: 0,
            host: broker.host.clone(),
            port: broker.port as i32,
        }))
    }
}
