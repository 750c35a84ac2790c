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
        base::{NPString, PBytes, PString, ProtocolType, I16, I32},
        schema_base::{Schema, ValueSet},
        types::Versions,
        ApiVersion, ProtocolCodec,
    },
    request::{SyncGroupAssignment, SyncGroupRequest, SyncGroupResponse},
    AppResult,
};

const GROUP_ID_KEY_NAME: &str = "group_id";
const GENERATION_ID_KEY_NAME: &str = "generation_id";
const MEMBER_ID_KEY_NAME: &str = "member_id";
const GROUP_INSTANCE_ID_KEY_NAME: &str = "group_instance_id";
const PROTOCOL_TYPE_KEY_NAME: &str = "protocol_type";
const PROTOCOL_NAME_KEY_NAME: &str = "protocol_name";
const ASSIGNMENTS_KEY_NAME: &str = "assignments";
const ASSIGNMENT_KEY_NAME: &str = "assignment";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";

pub static SYNC_GROUP_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let assignment_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, MEMBER_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, ASSIGNMENT_KEY_NAME, ProtocolType::PBytes(PBytes::default()), Versions::ALL),
    ];
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
        (
            4,
            PROTOCOL_TYPE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (
            5,
            PROTOCOL_NAME_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (
            6,
            ASSIGNMENTS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                assignment_desc,
            ))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static SYNC_GROUP_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            2,
            PROTOCOL_TYPE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (
            3,
            PROTOCOL_NAME_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (4, ASSIGNMENT_KEY_NAME, ProtocolType::PBytes(PBytes::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<SyncGroupRequest> for SyncGroupRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = SYNC_GROUP_REQUEST_SCHEMA.clone();
        let assignment_schema = schema.sub_schema_of_ary_field(ASSIGNMENTS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(GROUP_ID_KEY_NAME, self.group_id.into());
        value_set.append_field_value(GENERATION_ID_KEY_NAME, self.generation_id.into());
        value_set.append_field_value(MEMBER_ID_KEY_NAME, self.member_id.into());
        value_set.append_field_value(GROUP_INSTANCE_ID_KEY_NAME, self.group_instance_id.into());
        value_set.append_field_value(PROTOCOL_TYPE_KEY_NAME, self.protocol_type.into());
        value_set.append_field_value(PROTOCOL_NAME_KEY_NAME, self.protocol_name.into());
        let assignments = self
            .assignments
            .into_iter()
            .map(|assignment| {
                let mut assignment_value_set = ValueSet::new(assignment_schema.clone());
                assignment_value_set
                    .append_field_value(MEMBER_ID_KEY_NAME, assignment.member_id.into());
                assignment_value_set
                    .append_field_value(ASSIGNMENT_KEY_NAME, assignment.assignment.into());
                assignment_value_set
            })
            .collect();
        value_set.append_value_sets(ASSIGNMENTS_KEY_NAME, assignments);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<SyncGroupRequest> {
        let mut value_set = SYNC_GROUP_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        let group_id = value_set.get_field_value(GROUP_ID_KEY_NAME).into();
        let generation_id = value_set.get_field_value(GENERATION_ID_KEY_NAME).into();
        let member_id = value_set.get_field_value(MEMBER_ID_KEY_NAME).into();
        let group_instance_id = value_set.get_field_value(GROUP_INSTANCE_ID_KEY_NAME).into();
        let protocol_type = value_set.get_field_value(PROTOCOL_TYPE_KEY_NAME).into();
        let protocol_name = value_set.get_field_value(PROTOCOL_NAME_KEY_NAME).into();
        let assignments = value_set
            .get_value_sets(ASSIGNMENTS_KEY_NAME)
            .into_iter()
            .map(|mut assignment| SyncGroupAssignment {
                member_id: assignment.get_field_value(MEMBER_ID_KEY_NAME).into(),
                assignment: assignment.get_field_value(ASSIGNMENT_KEY_NAME).into(),
            })
            .collect();
        Ok(SyncGroupRequest {
            group_id,
            generation_id,
            member_id,
            group_instance_id,
            protocol_type,
            protocol_name,
            assignments,
        })
    }
}

impl ProtocolCodec<SyncGroupResponse> for SyncGroupResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(SYNC_GROUP_RESPONSE_SCHEMA.clone());
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(PROTOCOL_TYPE_KEY_NAME, self.protocol_type.into());
        value_set.append_field_value(PROTOCOL_NAME_KEY_NAME, self.protocol_name.into());
        value_set.append_field_value(ASSIGNMENT_KEY_NAME, self.assignment.into());
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<SyncGroupResponse> {
        let mut value_set = SYNC_GROUP_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(SyncGroupResponse {
            throttle_time_ms: value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into(),
            error_code: value_set.get_field_value(ERROR_CODE_KEY_NAME).into(),
            protocol_type: value_set.get_field_value(PROTOCOL_TYPE_KEY_NAME).into(),
            protocol_name: value_set.get_field_value(PROTOCOL_NAME_KEY_NAME).into(),
            assignment: value_set.get_field_value(ASSIGNMENT_KEY_NAME).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let request = SyncGroupRequest {
            group_id: "group".to_string(),
            generation_id: 1,
            member_id: "m-1".to_string(),
            group_instance_id: None,
            protocol_type: Some("consumer".to_string()),
            protocol_name: Some("range".to_string()),
            assignments: vec![SyncGroupAssignment {
                member_id: "m-1".to_string(),
                assignment: BytesMut::from(&[0u8, 0][..]),
            }],
        };
        let version = ApiVersion::new(5, true);
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &version);
        assert_eq!(SyncGroupRequest::read_from(&mut writer, &version).unwrap(), request);
    }

    #[test]
    fn test_v0_response_layout() {
        let response = SyncGroupResponse {
            throttle_time_ms: 0,
            error_code: 0,
            protocol_type: None,
            protocol_name: None,
            assignment: BytesMut::from(&[1u8][..]),
        };
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &ApiVersion::new(0, false));
        assert_eq!(writer.as_ref(), &[0, 0, 0, 0, 0, 1, 1]);
    }
}
