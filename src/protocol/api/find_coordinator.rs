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
        base::{NPString, PString, ProtocolType, I16, I32, I8},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{FindCoordinatorRequest, FindCoordinatorResponse},
    AppResult,
};

const KEY_KEY_NAME: &str = "key";
const KEY_TYPE_KEY_NAME: &str = "key_type";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const ERROR_MESSAGE_KEY_NAME: &str = "error_message";
const NODE_ID_KEY_NAME: &str = "node_id";
const HOST_KEY_NAME: &str = "host";
const PORT_KEY_NAME: &str = "port";

pub static FIND_COORDINATOR_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, KEY_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, KEY_TYPE_KEY_NAME, ProtocolType::I8(I8::default()), Versions::since(1)),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static FIND_COORDINATOR_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            2,
            ERROR_MESSAGE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(1),
        ),
        (3, NODE_ID_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (4, HOST_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (5, PORT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<FindCoordinatorRequest> for FindCoordinatorRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(FIND_COORDINATOR_REQUEST_SCHEMA.clone());
        value_set.append_field_value(KEY_KEY_NAME, self.key.into());
        value_set.append_field_value(KEY_TYPE_KEY_NAME, self.key_type.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<FindCoordinatorRequest> {
        let mut value_set = FIND_COORDINATOR_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(FindCoordinatorRequest {
            key: value_set.get_field_value(KEY_KEY_NAME).into(),
            key_type: value_set.get_field_value(KEY_TYPE_KEY_NAME).into(),
        })
    }
}

impl ProtocolCodec<FindCoordinatorResponse> for FindCoordinatorResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(FIND_COORDINATOR_RESPONSE_SCHEMA.clone());
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(ERROR_MESSAGE_KEY_NAME, self.error_message.into());
        value_set.append_field_value(NODE_ID_KEY_NAME, self.node_id.into());
        value_set.append_field_value(HOST_KEY_NAME, self.host.into());
        value_set.append_field_value(PORT_KEY_NAME, self.port.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<FindCoordinatorResponse> {
        let mut value_set = FIND_COORDINATOR_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(FindCoordinatorResponse {
            throttle_time_ms: value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
            error_message: value_set.get_field_value(ERROR_MESSAGE_KEY_NAME).into(),
            node_id: value_set.get_field_value(NODE_ID_KEY_NAME).into(),
            host: value_set.get_field_value(HOST_KEY_NAME).into(),
            port: value_set.get_field_value(PORT_KEY_NAME).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v0_response_layout() {
        let response = FindCoordinatorResponse {
            throttle_time_ms: 0,
            error_code: 0,
            error_message: None,
            node_id: 0,
            host: "localhost".to_string(),
            port: 9092,
        };
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &ApiVersion::new(0, false));
        // error code, node id, host, port
        assert_eq!(writer.len(), 2 + 4 + 2 + 9 + 4);

        let version = ApiVersion::new(3, true);
        let mut writer = BytesMut::new();
        response.clone().write_to(&mut writer, &version);
        assert_eq!(
            FindCoordinatorResponse::read_from(&mut writer, &version).unwrap(),
            response
        );
    }
}
