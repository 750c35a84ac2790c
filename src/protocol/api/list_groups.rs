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
    request::{ListGroupsRequest, ListGroupsResponse, ListedGroup},
    AppResult,
};

const STATES_FILTER_KEY_NAME: &str = "states_filter";
const THROTTLE_TIME_KEY_NAME: &str = "throttle_time_ms";
const ERROR_CODE_KEY_NAME: &str = "error_code";
const GROUPS_KEY_NAME: &str = "groups";
const GROUP_ID_KEY_NAME: &str = "group_id";
const PROTOCOL_TYPE_KEY_NAME: &str = "protocol_type";
const GROUP_STATE_KEY_NAME: &str = "group_state";

pub static LIST_GROUPS_REQUEST_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![(
        0,
        STATES_FILTER_KEY_NAME,
        ProtocolType::array_of::<String>(None),
        Versions::since(4),
    )];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static LIST_GROUPS_RESPONSE_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let group_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, GROUP_ID_KEY_NAME, ProtocolType::PString(PString::default()), Versions::ALL),
        (
            1,
            PROTOCOL_TYPE_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::ALL,
        ),
        (
            2,
            GROUP_STATE_KEY_NAME,
            ProtocolType::PString(PString::default()),
            Versions::since(4),
        ),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, THROTTLE_TIME_KEY_NAME, ProtocolType::I32(I32::default()), Versions::since(1)),
        (1, ERROR_CODE_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            2,
            GROUPS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(group_desc))),
            Versions::ALL,
        ),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

impl ProtocolCodec<ListGroupsRequest> for ListGroupsRequest {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let mut value_set = ValueSet::new(LIST_GROUPS_REQUEST_SCHEMA.clone());
        value_set.append_field_value(
            STATES_FILTER_KEY_NAME,
            ProtocolType::array_of(Some(self.states_filter)),
        );
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ListGroupsRequest> {
        let mut value_set = LIST_GROUPS_REQUEST_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        Ok(ListGroupsRequest {
            states_filter: value_set.get_field_value(STATES_FILTER_KEY_NAME).into(),
        })
    }
}

impl ProtocolCodec<ListGroupsResponse> for ListGroupsResponse {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion) {
        let schema = LIST_GROUPS_RESPONSE_SCHEMA.clone();
        let group_schema = schema.sub_schema_of_ary_field(GROUPS_KEY_NAME);
        let mut value_set = ValueSet::new(schema);
        value_set.append_field_value(THROTTLE_TIME_KEY_NAME, self.throttle_time_ms.into());
        value_set.append_field_value(ERROR_CODE_KEY_NAME, self.error_code.into());
        let groups = self
            .groups
            .into_iter()
            .map(|group| {
                let mut group_value_set = ValueSet::new(group_schema.clone());
                group_value_set.append_field_value(GROUP_ID_KEY_NAME, group.group_id.into());
                group_value_set
                    .append_field_value(PROTOCOL_TYPE_KEY_NAME, group.protocol_type.into());
                group_value_set.append_field_value(GROUP_STATE_KEY_NAME, group.group_state.into());
                group_value_set
            })
            .collect();
        value_set.append_value_sets(GROUPS_KEY_NAME, groups);
        value_set.write_to(writer, api_version);
    }

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<ListGroupsResponse> {
        let mut value_set = LIST_GROUPS_RESPONSE_SCHEMA
            .clone()
            .read_from(buffer, api_version)?;
        let throttle_time_ms = value_set.get_field_value(THROTTLE_TIME_KEY_NAME).into();
        let error_code = value_set.get_field_value(ERROR_CODE_KEY_NAME).into();
        let groups = value_set
            .get_value_sets(GROUPS_KEY_NAME)
            .into_iter()
            .map(|mut group| ListedGroup {
                group_id: group.get_field_value(GROUP_ID_KEY_NAME).into(),
                protocol_type: group.get_field_value(PROTOCOL_TYPE_KEY_NAME).into(),
                group_state: group.get_field_value(GROUP_STATE_KEY_NAME).into(),
            })
            .collect();
        Ok(ListGroupsResponse {
            throttle_time_ms,
            error_code,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_filter_only_from_v4() {
        let request = ListGroupsRequest {
            states_filter: vec!["Stable".to_string()],
        };
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &ApiVersion::new(3, true));
        // only the empty tag buffer
        assert_eq!(writer.as_ref(), &[0]);

        let version = ApiVersion::new(4, true);
        let mut writer = BytesMut::new();
        request.clone().write_to(&mut writer, &version);
        assert_eq!(ListGroupsRequest::read_from(&mut writer, &version).unwrap(), request);
    }

    #[test]
    fn test_response_drops_state_before_v4() {
        let response = ListGroupsResponse {
            throttle_time_ms: 0,
            error_code: 0,
            groups: vec![ListedGroup {
                group_id: "group".to_string(),
                protocol_type: "consumer".to_string(),
                group_state: "Stable".to_string(),
            }],
        };
        let version = ApiVersion::new(2, false);
        let mut writer = BytesMut::new();
        response.write_to(&mut writer, &version);
        let read = ListGroupsResponse::read_from(&mut writer, &version).unwrap();
        assert_eq!(read.groups[0].group_id, "group");
        assert_eq!(read.groups[0].group_state, "");
    }
}
