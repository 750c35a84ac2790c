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

use tracing::{instrument, trace};

use crate::group_consume::GroupState;
use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub group_instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
}

pub struct HeartbeatRequestHandler;

impl HeartbeatRequestHandler {
    fn check(request: &HeartbeatRequest, context: &RequestContext) -> ErrorCode {
        match context.client.member_id(&request.group_id) {
            Some(member_id) if member_id == request.member_id => {}
            _ => return ErrorCode::UnknownMemberId,
        }
        let Some(group) = context.store.group(&request.group_id) else {
            return ErrorCode::InvalidGroupId;
        };
        context.client.heartbeat(&request.group_id);
        if group.state() != GroupState::Stable {
            return ErrorCode::RebalanceInProgress;
        }
        if group.generation_id() != Some(request.generation_id) {
            return ErrorCode::IllegalGeneration;
        }
        ErrorCode::None
    }
}

impl ApiHandler for HeartbeatRequestHandler {
    type Request = HeartbeatRequest;
    type Response = HeartbeatResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: HeartbeatRequest,
        context: &RequestContext,
    ) -> AppResult<Option<HeartbeatResponse>> {
        let error_code = Self::check(&request, context);
        trace!(
            "heartbeat of {} in group {}: {:?}",
            request.member_id,
            request.group_id,
            error_code
        );
        Ok(Some(HeartbeatResponse {
            throttle_time_ms: 0,
            error_code: error_code.code(),
        }))
    }
}
