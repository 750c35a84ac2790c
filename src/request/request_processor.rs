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

use tracing::{trace, warn};

use crate::request::api::{
    ApiHandler, ApiVersionsRequestHandler, CreateTopicsRequestHandler, FetchRequestHandler,
    FindCoordinatorRequestHandler, HeartbeatRequestHandler, InitProducerIdRequestHandler,
    JoinGroupRequestHandler, ListGroupsRequestHandler, ListOffsetsRequestHandler,
    MetadataRequestHandler, OffsetCommitRequestHandler, OffsetFetchRequestHandler,
    ProduceRequestHandler, SyncGroupRequestHandler,
};
use crate::request::{ApiRequest, RequestContext};
use crate::AppResult;

/// general async handler
async fn execute_handler<H>(handler: H, request: H::Request, context: &RequestContext) -> AppResult<()>
where
    H: ApiHandler + Sync,
{
    // call the specific handler to generate the response
    let Some(response) = handler.handle_request(request, context).await? else {
        trace!(
            "no immediate response to correlation id {}",
            context.request_header.correlation_id
        );
        return Ok(());
    };
    if let Err(e) = context.writer.write(&context.response_header(), response) {
        warn!(
            "response to correlation id {} dropped: {}",
            context.request_header.correlation_id, e
        );
    }
    Ok(())
}

pub struct RequestProcessor;

impl RequestProcessor {
    pub async fn process_request(request: ApiRequest, context: &RequestContext) -> AppResult<()> {
        trace!(
            "Processing request: {:?} with request header{:?}",
            request,
            context.request_header
        );
        match request {
            ApiRequest::Produce(request) => {
                execute_handler(ProduceRequestHandler, request, context).await
            }
            ApiRequest::Fetch(request) => {
                execute_handler(FetchRequestHandler, request, context).await
            }
            ApiRequest::ListOffsets(request) => {
                execute_handler(ListOffsetsRequestHandler, request, context).await
            }
            ApiRequest::Metadata(request) => {
                execute_handler(MetadataRequestHandler, request, context).await
            }
            ApiRequest::OffsetCommit(request) => {
                execute_handler(OffsetCommitRequestHandler, request, context).await
            }
            ApiRequest::OffsetFetch(request) => {
                execute_handler(OffsetFetchRequestHandler, request, context).await
            }
            ApiRequest::FindCoordinator(request) => {
                execute_handler(FindCoordinatorRequestHandler, request, context).await
            }
            ApiRequest::JoinGroup(request) => {
                execute_handler(JoinGroupRequestHandler, request, context).await
            }
            ApiRequest::Heartbeat(request) => {
                execute_handler(HeartbeatRequestHandler, request, context).await
            }
            ApiRequest::SyncGroup(request) => {
                execute_handler(SyncGroupRequestHandler, request, context).await
            }
            ApiRequest::ListGroups(request) => {
                execute_handler(ListGroupsRequestHandler, request, context).await
            }
            ApiRequest::ApiVersions(request) => {
                execute_handler(ApiVersionsRequestHandler, request, context).await
            }
            ApiRequest::CreateTopics(request) => {
                execute_handler(CreateTopicsRequestHandler, request, context).await
            }
            ApiRequest::InitProducerId(request) => {
                execute_handler(InitProducerIdRequestHandler, request, context).await
            }
        }
    }
}
