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

use crate::protocol::ApiKey;
use crate::request::{ErrorCode, RequestContext};
use crate::AppResult;

use super::ApiHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsRequest {
    pub client_software_name: String,
    pub client_software_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionRange {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionRange>,
    pub throttle_time_ms: i32,
}

pub struct ApiVersionsRequestHandler;

impl ApiHandler for ApiVersionsRequestHandler {
    type Request = ApiVersionsRequest;
    type Response = ApiVersionsResponse;

    #[instrument(skip_all, fields(correlation_id = context.request_header.correlation_id))]
    async fn handle_request(
        &self,
        request: ApiVersionsRequest,
        context: &RequestContext,
    ) -> AppResult<Option<ApiVersionsResponse>> {
        let api_keys = context
            .registry
            .descriptors()
            .map(|descriptor| ApiVersionRange {
                api_key: descriptor.api_key.as_i16(),
                min_version: descriptor.min_version,
                max_version: descriptor.max_version,
            })
            .collect();

        let version = context.request_header.api_version.as_i16();
        let supported = context
            .registry
            .get(ApiKey::ApiVersions)
            .is_some_and(|descriptor| descriptor.supports(version));
        if !supported {
            debug!("client asked for api versions v{}, answering with v0", version);
            return Ok(Some(ApiVersionsResponse {
                error_code: ErrorCode::UnsupportedVersion.code(),
                api_keys,
                throttle_time_ms: 0,
            }));
        }

        if version >= 3 {
            context.client.set_software(
                request.client_software_name,
                request.client_software_version,
            );
        }
        Ok(Some(ApiVersionsResponse {
            error_code: ErrorCode::None.code(),
            api_keys,
            throttle_time_ms: 0,
        }))
    }
}
