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
        base::{NPString, PString, ProtocolType, I16, I32},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{HeartbeatRequest, HeartbeatResponse},
    AppResult,
};

const GROUP_ID_KEY_NAME: &str = "group_id";
const GENERATION_ID_KEY_NAME: &str = "generation_id";
const MEMBER_ID_KEY_NAME: &str = "member_id";
const GROUP_INSTANCE_ID_KEY_NAME: &str = "group_instance_id";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";

pub static HEARTBEAT_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, GROUP_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, GENERATION_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (2, MEMBER_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            3,
            GROUP_INSTANCE_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(3),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static HEARTBEAT_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<HeartbeatRequest> for HeartbeatRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(HEARTBEAT_REQUEST_SCHEMA.clone());
        value_set.append_field_value(GROUP_ID_KEY_NAME, self.group_id.into());
        value_set.append_field_value(GENERATION_ID_KEY_NAME, self.generation_id.into());
        value_set.append_field_value(MEMBER_ID_KEY_NAME, self.member_id.into());
        value_set.append_field_value(GROUP_INSTANCE_ID_KEY_NAME, self.group_instance_id.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<HeartbeatRequest> {
        let value_set = HEARTBEAT_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        HeartbeatRequest::decode_from_value_set(value_set)
    }
}

impl HeartbeatRequest {
    fn decode_from_value_set(mut value_set: ValueSet) -> AppResult<HeartbeatRequest> {
        let group_id = value_set.get_field_value(GROUP_ID_KEY_NAME).into();
        let generation_id = value_set.get_field_value(GENERATION_ID_KEY_NAME).into();
        let member_id = value_set.get_field_value(MEMBER_ID_KEY_NAME).into();
        let group_instance_id = value_set.get_field_value(GROUP_INSTANCE_ID_KEY_NAME).into();

        Ok(HeartbeatRequest {
            group_id,
            generation_id,
            member_id,
            group_instance_id,
        })
    }
}

impl ProtocolCodec<HeartbeatResponse> for HeartbeatResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(HEARTBEAT_RESPONSE_SCHEMA.clone());
        self.encode_to_value_set(&mut value_set);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<HeartbeatResponse> {
        let mut value_set = HEARTBEAT_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(HeartbeatResponse {
            throttle_time_ms: value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
        })
    }
}

impl HeartbeatResponse {
    fn encode_to_value_set(self, response_valueset: &mut ValueSet) {
        response_valueset.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        response_valueset.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_flexible_layout() {
        let request = HeartbeatRequest {
            group_id: "g".to_string(),
            generation_id: 1,
            member_id: "m".to_string(),
            group_instance_id: None,
        };
        let version = ApiVersion::new(4, true);
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &version);
        assert_eq!(writer.as_ref(), &[2, b'g', 0, 0, 0, 1, 2, b'm', 0, 0]);
        assert_eq!(HeartbeatRequest::read_from(&mut writer, &version).unwrap(), request);
    }

    #[test]
    fn test_v0_response_has_only_error_code() {
        let response = HeartbeatResponse {
            throttle_time_ms: 0,
            error_code: 27,
        };
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &ApiVersion::new(0, false));
        assert_eq!(writer.as_ref(), &[0, 27]);
    }
}
