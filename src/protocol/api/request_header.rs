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

use std::sync::{Arc, LazyLock};

use bytes::BytesMut;
use tracing::trace;

use crate::{
    protocol::{
        base::{ProtocolType, TaggedFields},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiKey, ApiRegistry, ApiVersion,
    },
    request::RequestHeader,
    AppResult,
};

const API_KEY: &str = "api_key";
const API_VERSION_KEY_NAME: &str = "api_version";
const CORRELATION_ID_KEY_NAME: &str = "correlation_id";
const CLIENT_ID_KEY_NAME: &str = "client_id";

// The fixed part of every request header. The client id is always a classic nullable
// string, even in flexible versions, so the schema is read with a non-flexible version.
pub static REQUEST_HEADER_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, API_KEY, 0i16.into(), Versions::ALL),
        (1, API_VERSION_KEY_NAME, 0i16.into(), Versions::ALL),
        (2, CORRELATION_ID_KEY_NAME, 0i32.into(), Versions::ALL),
        (3, CLIENT_ID_KEY_NAME, None::<String>.into(), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

const CLASSIC: ApiVersion = ApiVersion {
    version: 0,
    flexible: false,
};

impl RequestHeader {
    /// Reads a request header from the front of a frame.
    ///
    /// Unknown api keys and unsupported versions are errors, except ApiVersions whose
    /// unsupported versions still parse so the request can be answered.
    pub fn read_from(stream: &mut BytesMut, registry: &ApiRegistry) -> AppResult<RequestHeader> {
        let schema = Arc::clone(&REQUEST_HEADER_SCHEMA);
        let mut value_set: ValueSet = schema.read_from(stream, &CLASSIC)?;

        let api_key_value: i16 = value_set.get_field_value(API_KEY).into();
        let api_key = ApiKey::from_i16(api_key_value)?;
        let api_version_value: i16 = value_set.get_field_value(API_VERSION_KEY_NAME).into();
        let api_version = registry.resolve_version(api_key, api_version_value)?;

        let correlation_id = value_set.get_field_value(CORRELATION_ID_KEY_NAME).into();
        let client_id = value_set.get_field_value(CLIENT_ID_KEY_NAME).into();

        let tagged_fields = if api_version.is_flexible() {
            TaggedFields::decode(stream)?
        } else {
            TaggedFields::default()
        };
        trace!(
            "request header api:{:?} version:{} correlation:{}",
            api_key,
            api_version.as_i16(),
            correlation_id
        );

        Ok(RequestHeader {
            api_key,
            api_version,
            correlation_id,
            client_id,
            tagged_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::AppError;

    fn raw_header(api_key: i16, version: i16, flexible_tail: bool) -> BytesMut {
        let mut buffer = BytesMut::new();
        buffer.put_i16(api_key);
        buffer.put_i16(version);
        buffer.put_i32(42);
        buffer.put_i16(3);
        buffer.put_slice(b"cli");
        if flexible_tail {
            buffer.put_u8(0);
        }
        buffer
    }

    #[test]
    fn test_read_classic_header() {
        let registry = ApiRegistry::kafka();
        let mut buffer = raw_header(3, 4, false);
        let header = RequestHeader::read_from(&mut buffer, &registry).unwrap();
        assert_eq!(header.api_key, ApiKey::Metadata);
        assert_eq!(header.correlation_id, 42);
        assert_eq!(header.client_id(), "cli");
        assert!(!header.api_version.is_flexible());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_read_flexible_header_consumes_tags() {
        let registry = ApiRegistry::kafka();
        let mut buffer = raw_header(3, 9, true);
        let header = RequestHeader::read_from(&mut buffer, &registry).unwrap();
        assert!(header.api_version.is_flexible());
        assert!(header.tagged_fields.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unknown_api_key() {
        let registry = ApiRegistry::kafka();
        let mut buffer = raw_header(1000, 0, false);
        assert!(matches!(
            RequestHeader::read_from(&mut buffer, &registry),
            Err(AppError::UnsupportedApiKey(1000))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let registry = ApiRegistry::kafka();
        let mut buffer = BytesMut::from(&[0u8, 3, 0][..]);
        assert!(matches!(
            RequestHeader::read_from(&mut buffer, &registry),
            Err(AppError::UnexpectedEof(_))
        ));
    }
}
