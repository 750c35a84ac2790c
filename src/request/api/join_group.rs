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
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::group_consume::JoinData;
use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

/// From this version an empty member id is answered with MEMBER_ID_REQUIRED and the id to use.
const MEMBER_ID_REQUIRED_SINCE: i16 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroupProtocol {
    /// assignor name, e.g. "range"
    pub name: String,
    /// serialized subscription of the consumer protocol
    pub metadata: BytesMut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroupRequest {
    pub group_id: String,
    pub session_timeout_ms: i32,
    pub rebalance_timeout_ms: i32,
    pub member_id: String,
    pub group_instance_id: Option<String>,
    pub protocol_type: String,
    pub protocols: Vec<JoinGroupProtocol>,
}

impl Default for JoinGroupRequest {
    fn default() -> Self {
        JoinGroupRequest {
            group_id: String::new(),
            session_timeout_ms: 0,
            rebalance_timeout_ms: -1,
            member_id: String::new(),
            group_instance_id: None,
            protocol_type: String::new(),
            protocols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroupMember {
    pub member_id: String,
    pub group_instance_id: Option<String>,
    pub metadata: BytesMut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroupResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub generation_id: i32,
    pub protocol_type: Option<String>,
    pub protocol_name: Option<String>,
    pub leader: String,
    pub member_id: String,
    /// only filled in for the leader
    pub members: Vec<JoinGroupMember>,
}

impl JoinGroupResponse {
    pub fn error(error_code: ErrorCode, member_id: String) -> JoinGroupResponse {
        JoinGroupResponse {
            throttle_time_ms: 0,
            error_code: error_code.code(),
            generation_id: -1,
            protocol_type: None,
            protocol_name: None,
            leader: String::new(),
            member_id,
            members: Vec::new(),
        }
    }
}

pub struct JoinGroupRequestHandler;

impl ApiHandler for JoinGroupRequestHandler {
    type Request = JoinGroupRequest;
    type Response = JoinGroupResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        mut request: JoinGroupRequest,
        context: &RequestContext,
    ) -> AppResult<Option<JoinGroupResponse>> {
        if request.group_id.is_empty() {
            return Ok(Some(JoinGroupResponse::error(
                ErrorCode::InvalidGroupId,
                request.member_id,
            )));
        }
        let Some(broker) = context.broker() else {
            warn!("no broker listens on port {}", context.client.local_port);
            return Ok(Some(JoinGroupResponse::error(
                ErrorCode::Unknown,
                request.member_id,
            )));
        };
        let group = context.store.get_or_create_group(&request.group_id, &broker);

        if request.member_id.is_empty() {
            request.member_id = format!(
                "{}-{}",
                context.request_header.client_id(),
                Uuid::new_v4()
            );
            if context.request_header.api_version.as_i16() >= MEMBER_ID_REQUIRED_SINCE {
                debug!(
                    "group {} asks the client to rejoin as {}",
                    group.name, request.member_id
                );
                context.client.join_group(&group.name, &request.member_id);
                return Ok(Some(JoinGroupResponse::error(
                    ErrorCode::MemberIdRequired,
                    request.member_id,
                )));
            }
        }

        context.client.join_group(&group.name, &request.member_id);
        let member_id = request.member_id.clone();
        let join = JoinData {
            request,
            client: context.client.clone(),
            writer: context.writer.clone(),
            header: context.response_header(),
        };
        if let Err(e) = group.join(join) {
            warn!("join of {} to group {} failed: {}", member_id, group.name, e);
            return Ok(Some(JoinGroupResponse::error(ErrorCode::Unknown, member_id)));
        }
        // the coordinator answers once the rebalance round closes
        Ok(None)
    }
}
