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

use crate::{AppError, AppResult};

use crate::protocol::base::{ProtocolType, I16};

/// The Kafka RPCs this broker answers, with their numeric wire identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiKey {
    Produce = 0,
    Fetch = 1,
    ListOffsets = 2,
    Metadata = 3,
    OffsetCommit = 8,
    OffsetFetch = 9,
    FindCoordinator = 10,
    JoinGroup = 11,
    Heartbeat = 12,
    SyncGroup = 14,
    ListGroups = 16,
    ApiVersions = 18,
    CreateTopics = 19,
    InitProducerId = 22,
}

impl ApiKey {
    pub fn from_i16(value: i16) -> AppResult<Self> {
        match value {
            0 => Ok(ApiKey::Produce),
            1 => Ok(ApiKey::Fetch),
            2 => Ok(ApiKey::ListOffsets),
            3 => Ok(ApiKey::Metadata),
            8 => Ok(ApiKey::OffsetCommit),
            9 => Ok(ApiKey::OffsetFetch),
            10 => Ok(ApiKey::FindCoordinator),
            11 => Ok(ApiKey::JoinGroup),
            12 => Ok(ApiKey::Heartbeat),
            14 => Ok(ApiKey::SyncGroup),
            16 => Ok(ApiKey::ListGroups),
            18 => Ok(ApiKey::ApiVersions),
            19 => Ok(ApiKey::CreateTopics),
            22 => Ok(ApiKey::InitProducerId),
            invalid => Err(AppError::UnsupportedApiKey(invalid)),
        }
    }

    pub fn as_i16(&self) -> i16 {
        *self as i16
    }
}

impl TryFrom<i16> for ApiKey {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        ApiKey::from_i16(value)
    }
}

impl From<ApiKey> for i16 {
    fn from(value: ApiKey) -> Self {
        value as i16
    }
}

impl From<ApiKey> for ProtocolType {
    fn from(value: ApiKey) -> Self {
        ProtocolType::I16(I16 {
            value: value as i16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_conversion() {
        assert_eq!(ApiKey::from_i16(22).unwrap(), ApiKey::InitProducerId);
        assert_eq!(i16::from(ApiKey::ListGroups), 16);
        assert!(matches!(
            ApiKey::try_from(13),
            Err(AppError::UnsupportedApiKey(13))
        ));
    }
}
