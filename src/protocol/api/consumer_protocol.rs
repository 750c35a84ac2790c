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

//! The embedded "consumer" protocol carried opaquely inside JoinGroup metadata and
//! SyncGroup assignments.
//!
//! Only the version 0 layout is decoded. Later versions append fields, which are left
//! unread so newer clients still parse.
use std::sync::{Arc, LazyLock};

use bytes::BytesMut;

use crate::protocol::base::{NPBytes, ProtocolType, I16};
use crate::protocol::schema_base::{Schema, ValueSet};
use crate::protocol::types::Versions;
use crate::protocol::ApiVersion;
use crate::AppResult;

pub const CONSUMER_PROTOCOL_TYPE: &str = "consumer";

const VERSION_KEY_NAME: &str = "version";
const TOPICS_KEY_NAME: &str = "topics";
const TOPIC_KEY_NAME: &str = "topic";
const PARTITIONS_KEY_NAME: &str = "partitions";
const USER_DATA_KEY_NAME: &str = "user_data";

const V0: ApiVersion = ApiVersion {
    version: 0,
    flexible: false,
};

pub static SUBSCRIPTION_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, VERSION_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (1, TOPICS_KEY_NAME, ProtocolType::array_of::<String>(None), Versions::ALL),
        (2, USER_DATA_KEY_NAME, ProtocolType::NPBytes(NPBytes::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

pub static ASSIGNMENT_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let topic_partitions: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, TOPIC_KEY_NAME, "".into(), Versions::ALL),
        (1, PARTITIONS_KEY_NAME, ProtocolType::array_of::<i32>(None), Versions::ALL),
    ];
    let fields_desc: Vec<(i32, &str, ProtocolType, Versions)> = vec![
        (0, VERSION_KEY_NAME, ProtocolType::I16(I16::default()), Versions::ALL),
        (
            1,
            TOPICS_KEY_NAME,
            ProtocolType::array_of_schema(Arc::new(Schema::from_fields_desc_vec(
                topic_partitions,
            ))),
            Versions::ALL,
        ),
        (2, USER_DATA_KEY_NAME, ProtocolType::NPBytes(NPBytes::default()), Versions::ALL),
    ];
    Arc::new(Schema::from_fields_desc_vec(fields_desc))
});

/// What a consumer sends as protocol metadata when joining a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerSubscription {
    pub version: i16,
    pub topics: Vec<String>,
    pub user_data: Option<BytesMut>,
}

impl ConsumerSubscription {
    pub fn parse(mut metadata: BytesMut) -> AppResult<Self> {
        let mut value_set = SUBSCRIPTION_SCHEMA.clone().read_from(&mut metadata, &V0)?;
        Ok(ConsumerSubscription {
            version: value_set.get_field_value(VERSION_KEY_NAME).into(),
            topics: value_set.get_field_value(TOPICS_KEY_NAME).into(),
            user_data: value_set.get_field_value(USER_DATA_KEY_NAME).into(),
        })
    }

    pub fn to_bytes(self) -> BytesMut {
        let mut value_set = ValueSet::new(SUBSCRIPTION_SCHEMA.clone());
        value_set.append_field_value(VERSION_KEY_NAME, self.version.into());
        value_set.append_field_value(TOPICS_KEY_NAME, ProtocolType::array_of(Some(self.topics)));
        value_set.append_field_value(USER_DATA_KEY_NAME, self.user_data.into());
        let mut writer = BytesMut::new();
        value_set.write_to(&mut writer, &V0);
        writer
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicAssignment {
    pub topic: String,
    pub partitions: Vec<i32>,
}

/// The partitions a group leader hands to one member through SyncGroup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerAssignment {
    pub version: i16,
    pub topics: Vec<TopicAssignment>,
    pub user_data: Option<BytesMut>,
}

impl ConsumerAssignment {
    pub fn parse(mut assignment: BytesMut) -> AppResult<Self> {
        let mut value_set = ASSIGNMENT_SCHEMA.clone().read_from(&mut assignment, &V0)?;
        let version = value_set.get_field_value(VERSION_KEY_NAME).into();
        let topics = value_set
            .get_value_sets(TOPICS_KEY_NAME)
            .into_iter()
            .map(|mut topic| TopicAssignment {
                topic: topic.get_field_value(TOPIC_KEY_NAME).into(),
                partitions: topic.get_field_value(PARTITIONS_KEY_NAME).into(),
            })
            .collect();
        let user_data = value_set.get_field_value(USER_DATA_KEY_NAME).into();
        Ok(ConsumerAssignment {
            version,
            topics,
            user_data,
        })
    }

    pub fn to_bytes(self) -> BytesMut {
        let mut value_set = ValueSet::new(ASSIGNMENT_SCHEMA.clone());
        value_set.append_field_value(VERSION_KEY_NAME, self.version.into());
        let topic_schema = ASSIGNMENT_SCHEMA.sub_schema_of_ary_field(TOPICS_KEY_NAME);
        let topics = self
            .topics
            .into_iter()
            .map(|topic| {
                let mut topic_value_set = ValueSet::new(topic_schema.clone());
                topic_value_set.append_field_value(TOPIC_KEY_NAME, topic.topic.into());
                topic_value_set.append_field_value(
                    PARTITIONS_KEY_NAME,
                    ProtocolType::array_of(Some(topic.partitions)),
                );
                topic_value_set
            })
            .collect();
        value_set.append_value_sets(TOPICS_KEY_NAME, topics);
        value_set.append_field_value(USER_DATA_KEY_NAME, self.user_data.into());
        let mut writer = BytesMut::new();
        value_set.write_to(&mut writer, &V0);
        writer
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn test_parse_assignment_layout() {
        // version 0, one topic "foo" with partitions 0 and 2, null user data
        let mut raw = BytesMut::new();
        raw.put_i16(0);
        raw.put_i32(1);
        raw.put_i16(3);
        raw.put_slice(b"foo");
        raw.put_i32(2);
        raw.put_i32(0);
        raw.put_i32(2);
        raw.put_i32(-1);

        let assignment = ConsumerAssignment::parse(raw.clone()).unwrap();
        assert_eq!(assignment.topics.len(), 1);
        assert_eq!(assignment.topics[0].topic, "foo");
        assert_eq!(assignment.topics[0].partitions, vec![0, 2]);
        assert_eq!(assignment.user_data, None);
        assert_eq!(assignment.to_bytes(), raw);
    }

    #[test]
    fn test_newer_subscription_versions_parse() {
        let subscription = ConsumerSubscription {
            version: 1,
            topics: vec!["foo".to_string(), "bar".to_string()],
            user_data: None,
        };
        let mut raw = subscription.clone().to_bytes();
        // owned partitions appended by version 1 clients
        raw.put_i32(0);
        assert_eq!(ConsumerSubscription::parse(raw).unwrap(), subscription);
    }

    #[test]
    fn test_truncated_assignment_is_an_error() {
        let raw = BytesMut::from(&[0u8, 0, 0, 0, 0, 1][..]);
        assert!(ConsumerAssignment::parse(raw).is_err());
    }
}
