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
        base::{NPString, ProtocolType, I16, I32, I64},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{InitProducerIdRequest, InitProducerIdResponse},
    AppResult,
};

const TRANSACTIONAL_ID_KEY_NAME: &str = "transactional_id";
const TRANSACTION_TIMEOUT_KEY_NAME: &str = "transaction_timeout_ms";
const PRODUCER_ID_KEY_NAME: &str = "producer_id";
const PRODUCER_EPOCH_KEY_NAME: &str = "producer_epoch";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";

pub static INIT_PRODUCER_ID_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (
            0,
            TRANSACTIONAL_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::ALL,
        ),
        (1, TRANSACTION_TIMEOUT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (2, PRODUCER_ID_KEY_NAME, ProtocolType::I64(I64 { value: -1 }), Versions::since(3)),
        (
            3,
            PRODUCER_EPOCH_KEY_NAME,
            ProtocolType::I16(I16 { value: -1 }),
            Versions::since(3),
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static INIT_PRODUCER_ID_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, PRODUCER_ID_KEY_NAME, ProtocolType::I64(I64 { value: -1 }), Versions::ALL),
        (3, PRODUCER_EPOCH_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<InitProducerIdRequest> for InitProducerIdRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(INIT_PRODUCER_ID_REQUEST_SCHEMA.clone());
        value_set.append_field_value(TRANSACTIONAL_ID_KEY_NAME, self.transactional_id.into());
        value_set.append_field_value(
            TRANSACTION_TIMEOUT_KEY_NAME,
            self.transaction_timeout_ms.into(),
        );
        value_set.append_field_value(PRODUCER_ID_KEY_NAME, self.producer_id.into());
        value_set.append_field_value(PRODUCER_EPOCH_KEY_NAME, self.producer_epoch.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<InitProducerIdRequest> {
        let mut value_set = INIT_PRODUCER_ID_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(InitProducerIdRequest {
            transactional_id: value_set.get_field_value(TRANSACTIONAL_ID_KEY_NAME).into(),
            transaction_timeout_ms: value_set.get_field_value(TRANSACTION_TIMEOUT_KEY_NAME).into(),
            producer_id: value_set.get_field_value(PRODUCER_ID_KEY_NAME).into(),
            producer_epoch: value_set.get_field_value(PRODUCER_EPOCH_KEY_NAME).into(),
        })
    }
}

impl ProtocolCodec<InitProducerIdResponse> for InitProducerIdResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(INIT_PRODUCER_ID_RESPONSE_SCHEMA.clone());
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(PRODUCER_ID_KEY_NAME, self.producer_id.into());
        value_set.append_field_value(PRODUCER_EPOCH_KEY_NAME, self.producer_epoch.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(
        buffer: &mut BytesMut,
        api_version: &ApiVersion,
    ) -> AppResult<InitProducerIdResponse> {
        let mut value_set = INIT_PRODUCER_ID_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(InitProducerIdResponse {
            throttle_time_ms: value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
            producer_id: value_set.get_field_value(PRODUCER_ID_KEY_NAME).into(),
            producer_epoch: value_set.get_field_value(PRODUCER_EPOCH_KEY_NAME).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_v2_defaults_producer_fields() {
        let request = InitProducerIdRequest {
            transactional_id: None,
            transaction_timeout_ms: 60_000,
            producer_id: 7,
            producer_epoch: 1,
        };
        let version = ApiVersion::new(2, true);
        let mut writer = BytesMut::new();
        request.write_to(&mut writer, &version);
        let read = InitProducerIdRequest::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.producer_id, -1);
        assert_eq!(read.producer_epoch, -1);
        assert_eq!(read.transaction_timeout_ms, 60_000);
    }

    #[test]
    fn test_response_v0_layout() {
        let response = InitProducerIdResponse {
            throttle_time_ms: 0,
            error_code: 0,
            producer_id: 1,
            producer_epoch: 0,
        };
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &ApiVersion::new(0, false));
        assert_eq!(writer.len(), 4 + 2 + 8 + 2);
    }
}
