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

use thiserror::Error;

/// Errors reported back to clients through response error codes.
///
/// The payload carries a human readable explanation which is logged and, where the
/// response has an error message field, sent to the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KafkaError {
    #[error("The server experienced an unexpected error: {0}")]
    Unknown(String),

    #[error("The requested offset is not within range: {0}")]
    OffsetOutOfRange(String),

    #[error("Corrupt message: {0}")]
    CorruptMessage(String),

    #[error("Unknown topic or partition: {0}")]
    UnknownTopicOrPartition(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Illegal generation: {0}")]
    IllegalGeneration(String),

    #[error("Invalid group id: {0}")]
    InvalidGroupId(String),

    #[error("Unknown member id: {0}")]
    UnknownMemberId(String),

    #[error("Rebalance in progress: {0}")]
    RebalanceInProgress(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Topic already exists: {0}")]
    TopicAlreadyExists(String),

    #[error("Invalid partitions: {0}")]
    InvalidPartitions(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported for message format: {0}")]
    UnsupportedForMessageFormat(String),

    #[error("Unknown producer id: {0}")]
    UnknownProducerId(String),

    #[error("Group id not found: {0}")]
    GroupIdNotFound(String),

    #[error("Member id required: {0}")]
    MemberIdRequired(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Producer fenced: {0}")]
    ProducerFenced(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ErrorCode {
    /// generic request error code
    Unknown = -1,
    None = 0,
    UnsupportedVersion = 35,
    InvalidRequest = 42,

    /// topic produce error code
    CorruptMessage = 2,
    UnknownTopicOrPartition = 3,
    InvalidTopic = 17,
    UnsupportedForMessageFormat = 43,
    UnknownProducerId = 59,
    InvalidRecord = 87,
    ProducerFenced = 90,

    /// consumer group error code
    OffsetOutOfRange = 1,
    IllegalGeneration = 22,
    InvalidGroupId = 24,
    UnknownMemberId = 25,
    RebalanceInProgress = 27,
    GroupIdNotFound = 69,
    MemberIdRequired = 79,

    /// topic error code
    TopicAlreadyExists = 36,
    InvalidPartitions = 37,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "The server experienced an unexpected error when processing the request",
            ErrorCode::None => "",
            ErrorCode::OffsetOutOfRange => "The requested offset is not within the range of offsets maintained by the server",
            ErrorCode::CorruptMessage => "This message has failed its CRC checksum, exceeds the valid size, or is otherwise corrupt",
            ErrorCode::UnknownTopicOrPartition => "This server does not host this topic-partition",
            ErrorCode::InvalidTopic => "The request attempted to perform an operation on an invalid topic",
            ErrorCode::IllegalGeneration => "Specified group generation id is not valid",
            ErrorCode::InvalidGroupId => "The configured groupId is invalid",
            ErrorCode::UnknownMemberId => "The coordinator is not aware of this member",
            ErrorCode::RebalanceInProgress => "The group is rebalancing, so a rejoin is needed",
            ErrorCode::UnsupportedVersion => "The version of API is not supported",
            ErrorCode::TopicAlreadyExists => "Topic with this name already exists",
            ErrorCode::InvalidPartitions => "Number of partitions is invalid",
            ErrorCode::InvalidRequest => "This most likely occurs because of a request being malformed by the client library or the message was sent to an incompatible broker",
            ErrorCode::UnsupportedForMessageFormat => "The message format version on the broker does not support the request",
            ErrorCode::UnknownProducerId => "This exception is raised by the broker if it could not locate the producer metadata associated with the producerId in question",
            ErrorCode::GroupIdNotFound => "The group id does not exist",
            ErrorCode::MemberIdRequired => "The group member needs to have a valid member id before actually entering a consumer group",
            ErrorCode::InvalidRecord => "This record has failed the validation on broker and hence will be rejected",
            ErrorCode::ProducerFenced => "There is a newer producer with the same transactionalId which fences the current one",
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            0 => ErrorCode::None,
            1 => ErrorCode::OffsetOutOfRange,
            2 => ErrorCode::CorruptMessage,
            3 => ErrorCode::UnknownTopicOrPartition,
            17 => ErrorCode::InvalidTopic,
            22 => ErrorCode::IllegalGeneration,
            24 => ErrorCode::InvalidGroupId,
            25 => ErrorCode::UnknownMemberId,
            27 => ErrorCode::RebalanceInProgress,
            35 => ErrorCode::UnsupportedVersion,
            36 => ErrorCode::TopicAlreadyExists,
            37 => ErrorCode::InvalidPartitions,
            42 => ErrorCode::InvalidRequest,
            43 => ErrorCode::UnsupportedForMessageFormat,
            59 => ErrorCode::UnknownProducerId,
            69 => ErrorCode::GroupIdNotFound,
            79 => ErrorCode::MemberIdRequired,
            87 => ErrorCode::InvalidRecord,
            90 => ErrorCode::ProducerFenced,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn code(self) -> i16 {
        self as i16
    }
}

impl From<&KafkaError> for ErrorCode {
    fn from(error: &KafkaError) -> Self {
        match error {
            KafkaError::Unknown(_) => ErrorCode::Unknown,
            KafkaError::OffsetOutOfRange(_) => ErrorCode::OffsetOutOfRange,
            KafkaError::CorruptMessage(_) => ErrorCode::CorruptMessage,
            KafkaError::UnknownTopicOrPartition(_) => ErrorCode::UnknownTopicOrPartition,
            KafkaError::InvalidTopic(_) => ErrorCode::InvalidTopic,
            KafkaError::IllegalGeneration(_) => ErrorCode::IllegalGeneration,
            KafkaError::InvalidGroupId(_) => ErrorCode::InvalidGroupId,
            KafkaError::UnknownMemberId(_) => ErrorCode::UnknownMemberId,
            KafkaError::RebalanceInProgress(_) => ErrorCode::RebalanceInProgress,
            KafkaError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            KafkaError::TopicAlreadyExists(_) => ErrorCode::TopicAlreadyExists,
            KafkaError::InvalidPartitions(_) => ErrorCode::InvalidPartitions,
            KafkaError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            KafkaError::UnsupportedForMessageFormat(_) => ErrorCode::UnsupportedForMessageFormat,
            KafkaError::UnknownProducerId(_) => ErrorCode::UnknownProducerId,
            KafkaError::GroupIdNotFound(_) => ErrorCode::GroupIdNotFound,
            KafkaError::MemberIdRequired(_) => ErrorCode::MemberIdRequired,
            KafkaError::InvalidRecord(_) => ErrorCode::InvalidRecord,
            KafkaError::ProducerFenced(_) => ErrorCode::ProducerFenced,
        }
    }
}

impl From<KafkaError> for ErrorCode {
    fn from(error: KafkaError) -> Self {
        ErrorCode::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let error = KafkaError::InvalidRecord("index 0: invalid JSON".to_string());
        assert_eq!(ErrorCode::from(&error), ErrorCode::InvalidRecord);
        assert_eq!(ErrorCode::from(&error).code(), 87);
        assert_eq!(ErrorCode::from_code(79), ErrorCode::MemberIdRequired);
        assert_eq!(ErrorCode::from_code(1234), ErrorCode::Unknown);
        assert!(error.to_string().contains("invalid JSON"));
    }
}
