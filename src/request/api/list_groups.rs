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

use tracing::instrument;

use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListGroupsRequest {
    /// group states to keep, every group when empty
    pub states_filter: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedGroup {
    pub group_id: String,
    pub protocol_type: String,
    pub group_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListGroupsResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub groups: Vec<ListedGroup>,
}

pub struct ListGroupsRequestHandler;

impl ApiHandler for ListGroupsRequestHandler {
    type Request = ListGroupsRequest;
    type Response = ListGroupsResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: ListGroupsRequest,
        context: &RequestContext,
    ) -> AppResult<Option<ListGroupsResponse>> {
        let groups = context
            .store
            .groups()
            .into_iter()
            .filter_map(|group| {
                let state = group.state().as_str();
                let wanted = request.states_filter.is_empty()
                    || request
                        .states_filter
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(state));
                wanted.then(|| ListedGroup {
                    group_id: group.name.clone(),
                    protocol_type: group.protocol_type(),
                    group_state: state.to_string(),
                })
            })
            .collect();
        Ok(Some(ListGroupsResponse {
            throttle_time_ms: 0,
            error_code: ErrorCode::None.code(),
            groups,
        }))
    }
}
