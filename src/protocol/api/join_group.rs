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
    request::{JoinGroupMember, JoinGroupProtocol, JoinGroupRequest, JoinGroupResponse},
    AppResult,
};

const GROUP_ID_KEY_NAME: &str = "group_id";
const SESSION_TIMEOUT_KEY_NAME: &str = "session_timeout_ms";
const REBALANCE_TIMEOUT_KEY_NAME: &str = "rebalance_timeout_ms";
const MEMBER_ID_KEY_NAME: &str = "member_id";
const GROUP_INSTANCE_ID_KEY_NAME: &str = "group_instance_id";
const PROTOCOL_TYPE_KEY_NAME: &str = "protocol_type";
const PROTOCOLS_KEY_NAME: &str = "protocols";
const NAME_KEY_NAME: &str = "name";
const METADATA_KEY_NAME: &str = "metadata";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const GENERATION_ID_KEY_NAME: &str = "generation_id";
const PROTOCOL_NAME_KEY_NAME: &str = "protocol_name";
const LEADER_KEY_NAME: &str = "leader";
const MEMBERS_KEY_NAME: &str = "members";

pub static JOIN_GROUP_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let protocol_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, NAME_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, METADATA_KEY_NAME, ProtocolType::PBytes(PBytes::default()), Versions::ALL),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, GROUP_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (1, SESSION_TIMEOUT_KEY_NAME, ProtocolType::I32(I32::default()), Versions::ALL),
        (
            2,
            REBALANCE_TIMEOUT_KEY_NAME,
            ProtocolType::I32(I32 { value: -1 }),
            Versions::since(1),
        ),
        (3, MEMBER_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            4,
            GROUP_INSTANCE_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (
            5,
            PROTOCOL_TYPE_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::ALL,
        ),
        (
            6,
            PROTOCOLS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(protocol_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static JOIN_GROUP_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let member_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, MEMBER_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            GROUP_INSTANCE_ID_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(5),
        ),
        (2, METADATA_KEY_NAME, ProtocolType::PBytes(PBytes::default()), Versions::ALL),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(2)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (2, GENERATION_ID_KEY_NAME, ProtocolType::I32(I32 { value: -1 }), Versions::ALL),
        (
            3,
            PROTOCOL_TYPE_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::since(7),
        ),
        // non-nullable before version 7, a present value encodes identically
        (
            4,
            PROTOCOL_NAME_KEY_NAME,
            ProtocolType::NPString(NPString::default()),
            Versions::ALL,
        ),
        (5, LEADER_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (6, MEMBER_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            7,
            MEMBERS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(member_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<JoinGroupRequest> for JoinGroupRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = JOIN_GROUP_REQUEST_SCHEMA.clone();
        let protocol_schema = schema.sub_schema_of_ary_field(PROTOCOLS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(GROUP_ID_KEY_NAME, self.group_id.into());
        value_set.append_field_value(SESSION_TIMEOUT_KEY_NAME, self.session_timeout_ms.into());
        value_set.append_field_value(REBALANCE_TIMEOUT_KEY_NAME, self.rebalance_timeout_ms.into());
        value_set.append_field_value(MEMBER_ID_KEY_NAME, self.member_id.into());
        value_set.append_field_value(GROUP_INSTANCE_ID_KEY_NAME, self.group_instance_id.into());
        value_set.append_field_value(PROTOCOL_TYPE_KEY_NAME, self.protocol_type.into());
        let protocols = self
            .protocols
            .into_iter()
            .map(|protocol| {
                let mut protocol_value_set = ValueSet::new(protocol_schema.clone());
                protocol_value_set.append_field_value(NAME_KEY_NAME, protocol.name.into());
                protocol_value_set.append_field_value(METADATA_KEY_NAME, protocol.metadata.into());
                protocol_value_set
            })
            .collect();
        value_set.append_value_sets(PROTOCOLS_KEY_NAME, protocols);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<JoinGroupRequest> {
        let mut value_set = JOIN_GROUP_REQUEST_SCHEMA.clone().read_from(buffer, api_version)?;
        let group_id = value_set.get_field_value(GROUP_ID_KEY_NAME).into();
        let session_timeout_ms = value_set.get_field_value(SESSION_TIMEOUT_KEY_NAME).into();
        let rebalance_timeout_ms = value_set.get_field_value(REBALANCE_TIMEOUT_KEY_NAME).into();
        let member_id = value_set.get_field_value(MEMBER_ID_KEY_NAME).into();
        let group_instance_id = value_set.get_field_value(GROUP_INSTANCE_ID_KEY_NAME).into();
        let protocol_type = value_set.get_field_value(PROTOCOL_TYPE_KEY_NAME).into();
        let protocols = value_set
            .get_value_sets(PROTOCOLS_KEY_NAME)
            .into_iter()
            .map(|mut protocol| JoinGroupProtocol {
                name: protocol.get_field_value(NAME_KEY_NAME).into(),
                metadata: protocol.get_field_value(METADATA_KEY_NAME).into(),
            })
            .collect();
        Ok(JoinGroupRequest {
            group_id,
            session_timeout_ms,
            rebalance_timeout_ms,
            member_id,
            group_instance_id,
            protocol_type,
            protocols,
        })
    }
}

impl ProtocolCodec<JoinGroupResponse> for JoinGroupResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = JOIN_GROUP_RESPONSE_SCHEMA.clone();
        let member_schema = schema.sub_schema_of_ary_field(MEMBERS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        value_set.append_field_value(GENERATION_ID_KEY_NAME, self.generation_id.into());
        value_set.append_field_value(PROTOCOL_TYPE_KEY_NAME, self.protocol_type.into());
        let protocol_name = match self.protocol_name {
            None if api_version.as_i16() < 7 => Some(String::new()),
            name => name,
        };
        value_set.append_field_value(PROTOCOL_NAME_KEY_NAME, protocol_name.into());
        value_set.append_field_value(LEADER_KEY_NAME, self.leader.into());
        value_set.append_field_value(MEMBER_ID_KEY_NAME, self.member_id.into());
        let members = self
            .members
            .into_iter()
            .map(|member| {
                let mut member_value_set = ValueSet::new(member_schema.clone());
                member_value_set.append_field_value(MEMBER_ID_KEY_NAME, member.member_id.into());
                member_value_set
                    .append_field_value(GROUP_INSTANCE_ID_KEY_NAME, member.group_instance_id.into());
                member_value_set.append_field_value(METADATA_KEY_NAME, member.metadata.into());
                member_value_set
            })
            .collect();
        value_set.append_value_sets(MEMBERS_KEY_NAME, members);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<JoinGroupResponse> {
        let mut value_set = JOIN_GROUP_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let error_code = value_set.get_field_value(ERROR_CODE_KEY_NAME).into();
        let generation_id = value_set.get_field_value(GENERATION_ID_KEY_NAME).into();
        let protocol_type = value_set.get_field_value(PROTOCOL_TYPE_KEY_NAME).into();
        let protocol_name = value_set.get_field_value(PROTOCOL_NAME_KEY_NAME).into();
        let leader = value_set.get_field_value(LEADER_KEY_NAME).into();
        let member_id = value_set.get_field_value(MEMBER_ID_KEY_NAME).into();
        let members = value_set
            .get_value_sets(MEMBERS_KEY_NAME)
            .into_iter()
            .map(|mut member| JoinGroupMember {
                member_id: member.get_field_value(MEMBER_ID_KEY_NAME).into(),
                group_instance_id: member.get_field_value(GROUP_INSTANCE_ID_KEY_NAME).into(),
                metadata: member.get_field_value(METADATA_KEY_NAME).into(),
            })
            .collect();
        Ok(JoinGroupResponse {
            throttle_time_ms,
            error_code,
            generation_id,
            protocol_type,
            protocol_name,
            leader,
            member_id,
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> JoinGroupResponse {
        JoinGroupResponse {
            throttle_time_ms: 0,
            error_code: 0,
            generation_id: 1,
            protocol_type: Some("consumer".to_string()),
            protocol_name: Some("range".to_string()),
            leader: "m-1".to_string(),
            member_id: "m-1".to_string(),
            members: vec![JoinGroupMember {
                member_id: "m-1".to_string(),
                group_instance_id: None,
                metadata: BytesMut::from(&b"meta"[..]),
            }],
        }
    }

    #[test]
    fn test_response_v7_round_trip() {
        let version = ApiVersion::new(7, true);
        let mut writer = BytesMut::new();
        sample_response().write_to(&mut writer, &version);
        assert_eq!(
            JoinGroupResponse::read_from(&mut writer, &version).unwrap(),
            sample_response()
        );
    }

    #[test]
    fn test_error_response_before_v7_has_empty_protocol() {
        let response = JoinGroupResponse {
            error_code: 79,
            protocol_type: None,
            protocol_name: None,
            members: vec![],
            ..sample_response()
        };
        let version = ApiVersion::new(4, false);
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &version);
        let read = JoinGroupResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.protocol_name, Some(String::new()));
        assert_eq!(read.protocol_type, None);
    }

    #[test]
    fn test_request_round_trip() {
        let request = JoinGroupRequest {
            group_id: "group".to_string(),
            session_timeout_ms: 10_000,
            rebalance_timeout_ms: 30_000,
            member_id: String::new(),
            group_instance_id: None,
            protocol_type: "consumer".to_string(),
            protocols: vec![JoinGroupProtocol {
                name: "range".to_string(),
                metadata: BytesMut::from(&b"sub"[..]),
            }],
        };
        for version in [ApiVersion::new(5, false), ApiVersion::new(6, true)] {
            let mut writer = BytesMut::new();
            request.clone().write_to(&mut writer, &version);
            assert_eq!(JoinGroupRequest::read_from(&mut writer, &version).unwrap(), request);
        }
    }
}
