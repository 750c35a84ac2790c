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

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;

use bytes::BytesMut;

use crate::protocol::{ApiKey, ApiVersion, ProtocolCodec};
use crate::request::{ApiRequest, ApiVersionsRequest, RequestHeader};
use crate::{AppError, AppResult};

type RequestDecoder = Box<dyn Fn(&mut BytesMut, &ApiVersion) -> AppResult<ApiRequest> + Send + Sync>;

/// Everything the broker knows about one API: the versions it accepts, where the flexible
/// encoding starts for requests and responses, and how to decode a request body.
pub struct ApiDescriptor {
    pub api_key: ApiKey,
    pub min_version: i16,
    pub max_version: i16,
    pub flexible_request: i16,
    pub flexible_response: i16,
    decoder: RequestDecoder,
}

impl Debug for ApiDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiDescriptor")
            .field("api_key", &self.api_key)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("flexible_request", &self.flexible_request)
            .field("flexible_response", &self.flexible_response)
            .finish()
    }
}

impl ApiDescriptor {
    pub fn supports(&self, version: i16) -> bool {
        version >= self.min_version && version <= self.max_version
    }

    pub fn request_version(&self, version: i16) -> ApiVersion {
        ApiVersion::new(version, version >= self.flexible_request)
    }

    pub fn response_version(&self, version: i16) -> ApiVersion {
        ApiVersion::new(version, version >= self.flexible_response)
    }

    pub fn decode_request(
        &self,
        buffer: &mut BytesMut,
        version: &ApiVersion,
    ) -> AppResult<ApiRequest> {
        (self.decoder)(buffer, version)
    }
}

/// The table of supported APIs, assembled once when a store is built and shared by every
/// connection.
#[derive(Debug)]
pub struct ApiRegistry {
    apis: BTreeMap<ApiKey, ApiDescriptor>,
}

impl ApiRegistry {
    pub fn builder() -> ApiRegistryBuilder {
        ApiRegistryBuilder::default()
    }

    /// All APIs this broker implements.
    pub fn kafka() -> ApiRegistry {
        ApiRegistry::builder()
            .register(ApiKey::Produce, 0..=9, 9, ApiRequest::Produce)
            .register(ApiKey::Fetch, 0..=12, 12, ApiRequest::Fetch)
            .register(ApiKey::ListOffsets, 0..=6, 6, ApiRequest::ListOffsets)
            .register(ApiKey::Metadata, 0..=9, 9, ApiRequest::Metadata)
            .register(ApiKey::OffsetCommit, 0..=8, 8, ApiRequest::OffsetCommit)
            .register(ApiKey::OffsetFetch, 0..=7, 6, ApiRequest::OffsetFetch)
            .register(ApiKey::FindCoordinator, 0..=3, 3, ApiRequest::FindCoordinator)
            .register(ApiKey::JoinGroup, 0..=7, 6, ApiRequest::JoinGroup)
            .register(ApiKey::Heartbeat, 0..=4, 4, ApiRequest::Heartbeat)
            .register(ApiKey::SyncGroup, 0..=5, 4, ApiRequest::SyncGroup)
            .register(ApiKey::ListGroups, 0..=4, 3, ApiRequest::ListGroups)
            .register(ApiKey::ApiVersions, 0..=3, 3, ApiRequest::ApiVersions)
            .register(ApiKey::CreateTopics, 0..=7, 5, ApiRequest::CreateTopics)
            .register(ApiKey::InitProducerId, 0..=4, 2, ApiRequest::InitProducerId)
            .build()
    }

    pub fn get(&self, api_key: ApiKey) -> Option<&ApiDescriptor> {
        self.apis.get(&api_key)
    }

    /// Descriptors ordered by numeric api key.
    pub fn descriptors(&self) -> impl Iterator<Item = &ApiDescriptor> {
        self.apis.values()
    }

    /// Resolves the wire version of a request header. An ApiVersions request above the
    /// supported range is accepted so that it can be answered with `UNSUPPORTED_VERSION`.
    pub fn resolve_version(&self, api_key: ApiKey, version: i16) -> AppResult<ApiVersion> {
        let descriptor = self
            .get(api_key)
            .ok_or(AppError::UnsupportedApiKey(api_key.as_i16()))?;
        if descriptor.supports(version) {
            Ok(descriptor.request_version(version))
        } else if api_key == ApiKey::ApiVersions {
            Ok(ApiVersion::new(version, version >= descriptor.flexible_request))
        } else {
            Err(AppError::UnsupportedVersion(version))
        }
    }

    /// Decodes the body of a request whose header has already been parsed.
    pub fn decode_request(
        &self,
        header: &RequestHeader,
        body: &mut BytesMut,
    ) -> AppResult<ApiRequest> {
        let descriptor = self
            .get(header.api_key)
            .ok_or(AppError::UnsupportedApiKey(header.api_key.as_i16()))?;
        if !descriptor.supports(header.api_version.as_i16()) {
            // the body layout of an unknown version can not be trusted
            return Ok(ApiRequest::ApiVersions(ApiVersionsRequest::default()));
        }
        descriptor.decode_request(body, &header.api_version)
    }
}

#[derive(Default)]
pub struct ApiRegistryBuilder {
    apis: BTreeMap<ApiKey, ApiDescriptor>,
}

impl ApiRegistryBuilder {
    /// Registers an API whose requests and responses turn flexible at the same version.
    pub fn register<T, F>(
        self,
        api_key: ApiKey,
        versions: RangeInclusive<i16>,
        flexible_from: i16,
        wrap: F,
    ) -> Self
    where
        T: ProtocolCodec<T> + 'static,
        F: Fn(T) -> ApiRequest + Send + Sync + 'static,
    {
        self.register_with_thresholds(api_key, versions, (flexible_from, flexible_from), wrap)
    }

    pub fn register_with_thresholds<T, F>(
        mut self,
        api_key: ApiKey,
        versions: RangeInclusive<i16>,
        (flexible_request, flexible_response): (i16, i16),
        wrap: F,
    ) -> Self
    where
        T: ProtocolCodec<T> + 'static,
        F: Fn(T) -> ApiRequest + Send + Sync + 'static,
    {
        let decoder: RequestDecoder =
            Box::new(move |buffer, version| T::read_from(buffer, version).map(&wrap));
        self.apis.insert(
            api_key,
            ApiDescriptor {
                api_key,
                min_version: *versions.start(),
                max_version: *versions.end(),
                flexible_request,
                flexible_response,
                decoder,
            },
        );
        self
    }

    pub fn build(self) -> ApiRegistry {
        ApiRegistry { apis: self.apis }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_registry_versions() {
        let registry = ApiRegistry::kafka();
        assert_eq!(registry.descriptors().count(), 14);

        let produce = registry.get(ApiKey::Produce).unwrap();
        assert!(!produce.request_version(8).is_flexible());
        assert!(produce.request_version(9).is_flexible());
        assert!(!produce.supports(10));

        let keys: Vec<i16> = registry.descriptors().map(|d| d.api_key.as_i16()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_resolve_version() {
        let registry = ApiRegistry::kafka();
        assert!(registry
            .resolve_version(ApiKey::Metadata, 9)
            .unwrap()
            .is_flexible());
        assert!(matches!(
            registry.resolve_version(ApiKey::Metadata, 12),
            Err(AppError::UnsupportedVersion(12))
        ));
        assert_eq!(
            registry.resolve_version(ApiKey::ApiVersions, 4).unwrap(),
            ApiVersion::new(4, true)
        );
    }
}
