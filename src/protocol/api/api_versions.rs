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

use crate::{
    protocol::{
        base::{PString, ProtocolType, I16, I32},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{ApiVersionRange, ApiVersionsRequest, ApiVersionsResponse},
    AppResult,
};

const CLIENT_SOFTWARE_NAME_KEY_NAME: &str = "client_software_name";
const CLIENT_SOFTWARE_VERSION_KEY_NAME: &str = "client_software_version";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const API_KEYS_KEY_NAME: &str = "api_keys";
const API_KEY_KEY_NAME: &str = "api_key";
const MIN_VERSION_KEY_NAME: &str = "min_version";
const MAX_VERSION_KEY_NAME: &str = "max_version";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";

pub static API_VERSIONS_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            CLIENT_SOFTWARE_NAME_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::since(3),
        ),
        (
            1,
            CLIENT_SOFTWARE_VERSION_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::since(3),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static API_VERSIONS_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let api_key_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, API_KEY_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (1, MIN_VERSION_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, MAX_VERSION_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            1,
            API_KEYS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(api_key_desc))),
            Versions::ALL,
        ),
        (
            2,
            THROTTLE_TIME_KEY_NAME,
            ProtocolType::I32(I32::default()),
            Versions::since(1),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<ApiVersionsRequest> for ApiVersionsRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(API_VERSIONS_REQUEST_SCHEMA.clone());
        value_set.append_field_value(CLIENT_SOFTWARE_NAME_KEY_NAME, self.client_software_name.into());
        value_set.append_field_value(
            CLIENT_SOFTWARE_VERSION_KEY_NAME,
            self.client_software_version.into(),
        );
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ApiVersionsRequest> {
        let mut value_set = API_VERSIONS_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(ApiVersionsRequest {
            client_software_name: value_set.get_field_value(CLIENT_SOFTWARE_NAME_KEY_NAME).into(),
            client_software_version: value_set
                .get_field_value(CLIENT_SOFTWARE_VERSION_KEY_NAME)
                .into(),
        })
    }
}

impl ProtocolCodec<ApiVersionsResponse> for ApiVersionsResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(API_VERSIONS_RESPONSE_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<ApiVersionsResponse> {
        let mut value_set = API_VERSIONS_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let error_code = value_set.get_field_value(ERROR_CODE_KEY_NAME).into();
        let api_keys = value_set
            .get_value_sets(API_KEYS_KEY_NAME)
            .into_iter()
            .map(|mut api_key| ApiVersionRange {
                api_key: api_key.get_field_value(API_KEY_KEY_NAME).into(),
                min_version: api_key.get_field_value(MIN_VERSION_KEY_NAME).into(),
                max_version: api_key.get_field_value(MAX_VERSION_KEY_NAME).into(),
            })
            .collect();
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        Ok(ApiVersionsResponse {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }
}

impl ApiVersionsResponse {
    fn encode_to_value_set(self, value_set: &mut ValueSet) {
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        let schema = API_VERSIONS_RESPONSE_SCHEMA.sub_schema_of_ary_field(API_KEYS_KEY_NAME);
        let api_keys = self
            .api_keys
            .into_iter()
            .map(|range| {
                let mut api_key = ValueSet::new(schema.clone());
                api_key.append_field_value(API_KEY_KEY_NAME, range.api_key.into());
                api_key.append_field_value(MIN_VERSION_KEY_NAME, range.min_version.into());
                api_key.append_field_value(MAX_VERSION_KEY_NAME, range.max_version.into());
                api_key
            })
            .collect();
        value_set.append_value_sets(API_KEYS_KEY_NAME, api_keys);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> ApiVersionsResponse {
        ApiVersionsResponse {
            error_code: 0,
            api_keys: vec![
                ApiVersionRange {
                    api_key: 0,
                    min_version: 0,
                    max_version: 9,
                },
                ApiVersionRange {
                    api_key: 18,
                    min_version: 0,
                    max_version: 3,
                },
            ],
            throttle_time_ms: 0,
        }
    }

    #[test]
    fn test_v0_response_layout() {
        let mut writer = BytesMut::new();
        sample_response().write_to(&mut writer, &ApiVersion::new(0, false));
        // error code, int32 count, two entries of three int16, no throttle time
        assert_eq!(writer.len(), 2 + 4 + 2 * 6);
    }

    #[test]
    fn test_v3_response_is_compact() {
        let mut writer = BytesMut::new();
        let version = ApiVersion::new(3, true);
        sample_response().write_to(&mut writer, &version);
        // error code, uvarint count, two entries with a tag buffer each, throttle, tag buffer
        assert_eq!(writer.len(), 2 + 1 + 2 * 7 + 4 + 1);
        let read = ApiVersionsResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read, sample_response());
    }

    #[test]
    fn test_v3_request_carries_software() {
        let request = ApiVersionsRequest {
            client_software_name: "mockafka-test".to_string(),
            client_software_version: "1.0".to_string(),
        };
        let version = ApiVersion::new(3, true);
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &version);
        assert_eq!(
            ApiVersionsRequest::read_from(&mut writer, &version).unwrap(),
            request
        );

        let mut writer = BytesMut::new();
        request.write_to(&mut writer, &ApiVersion::new(2, false));
        assert!(writer.is_empty());
    }
}
