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

use std::sync::Arc;

use crate::network::ResponseWriter;
use crate::protocol::{ApiRegistry, ApiVersion, ResponseHeader};
use crate::request::RequestHeader;
use crate::store::{Broker, ClientContext, Store};

/// Everything a handler needs besides the request itself.
#[derive(Debug)]
pub struct RequestContext {
    pub request_header: RequestHeader,
    pub store: Arc<Store>,
    pub client: Arc<ClientContext>,
    /// writer of the connection the request came in on
    pub writer: ResponseWriter,
    pub registry: Arc<ApiRegistry>,
}

impl RequestContext {
    pub fn new(
        request_header: RequestHeader,
        store: Arc<Store>,
        client: Arc<ClientContext>,
        writer: ResponseWriter,
        registry: Arc<ApiRegistry>,
    ) -> Self {
        RequestContext {
            request_header,
            store,
            client,
            writer,
            registry,
        }
    }

    /// Header of the response to this request. A version the broker does not support is
    /// answered with the version 0 layout, which is what clients expect for ApiVersions.
    pub fn response_header(&self) -> ResponseHeader {
        let header = &self.request_header;
        let version = match self.registry.get(header.api_key) {
            Some(descriptor) if descriptor.supports(header.api_version.as_i16()) => {
                descriptor.response_version(header.api_version.as_i16())
            }
            _ => ApiVersion::new(0, false),
        };
        ResponseHeader::new(header.api_key, version, header.correlation_id)
    }

    /// The broker whose listener accepted this connection.
    pub fn broker(&self) -> Option<Arc<Broker>> {
        self.store.broker_by_port(self.client.local_port)
    }
}

#[cfg(test)]
impl RequestContext {
    /// A context for a request that arrived on the listener of `port`. Responses written
    /// through it are dropped.
    pub(crate) fn on_port(
        store: Arc<Store>,
        api_key: crate::protocol::ApiKey,
        version: i16,
        port: u16,
    ) -> Self {
        let registry = Arc::new(ApiRegistry::kafka());
        let api_version = match registry.get(api_key) {
            Some(descriptor) => descriptor.request_version(version),
            None => ApiVersion::new(version, false),
        };
        let client_id = Some("test-client".to_string());
        let (writer, _) = ResponseWriter::channel();
        RequestContext::new(
            RequestHeader::new(api_key, api_version, 1, client_id),
            store,
            Arc::new(ClientContext::new(None, port)),
            writer,
            registry,
        )
    }
}
