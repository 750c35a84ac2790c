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

use bytes::BytesMut;
use tracing::{instrument, warn};

use crate::group_consume::{Generation, SyncData};
use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroupAssignment {
    pub member_id: String,
    pub assignment: BytesMut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroupRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub group_instance_id: Option<String>,
    pub protocol_type: Option<String>,
    pub protocol_name: Option<String>,
    /// only sent by the leader
    pub assignments: Vec<SyncGroupAssignment>,
}

impl Default for SyncGroupRequest {
    fn default() -> Self {
        SyncGroupRequest {
            group_id: String::new(),
            generation_id: -1,
            member_id: String::new(),
            group_instance_id: None,
            protocol_type: None,
            protocol_name: None,
            assignments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroupResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub protocol_type: Option<String>,
    pub protocol_name: Option<String>,
    pub assignment: BytesMut,
}

impl SyncGroupResponse {
    pub fn error(error_code: ErrorCode) -> SyncGroupResponse {
        SyncGroupResponse {
            throttle_time_ms: 0,
            error_code: error_code.code(),
            protocol_type: None,
            protocol_name: None,
            assignment: BytesMut::new(),
        }
    }

    pub fn assigned(generation: &Generation, assignment: BytesMut) -> SyncGroupResponse {
        SyncGroupResponse {
            throttle_time_ms: 0,
            error_code: ErrorCode::None.code(),
            protocol_type: Some(generation.protocol_type.clone()),
            protocol_name: Some(generation.protocol.clone()),
            assignment,
        }
    }
}

pub struct SyncGroupRequestHandler;

impl ApiHandler for SyncGroupRequestHandler {
    type Request = SyncGroupRequest;
    type Response = SyncGroupResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: SyncGroupRequest,
        context: &RequestContext,
    ) -> AppResult<Option<SyncGroupResponse>> {
        let Some(group) = context.store.group(&request.group_id) else {
            return Ok(Some(SyncGroupResponse::error(ErrorCode::UnknownMemberId)));
        };
        let sync = SyncData {
            request,
            client: context.client.clone(),
            writer: context.writer.clone(),
            header: context.response_header(),
        };
        if let Err(e) = group.sync(sync) {
            warn!("sync of group {} failed: {}", group.name, e);
            return Ok(Some(SyncGroupResponse::error(ErrorCode::Unknown)));
        }
        Ok(None)
    }
}
