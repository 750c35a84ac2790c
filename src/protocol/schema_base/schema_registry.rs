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

use bytes::{BufMut, BytesMut};

use crate::protocol::base::{NPString, PrimaryType, TaggedFields};
use crate::protocol::{ApiKey, ApiVersion};
use crate::request::RequestHeader;
use crate::AppResult;

/// What a response frame needs besides its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub api_key: ApiKey,
    pub api_version: ApiVersion,
    pub correlation_id: i32,
}

impl ResponseHeader {
    pub fn new(api_key: ApiKey, api_version: ApiVersion, correlation_id: i32) -> Self {
        ResponseHeader {
            api_key,
            api_version,
            correlation_id,
        }
    }

    /// ApiVersions responses always use header v0 so that a client can parse them before
    /// it knows which versions the broker speaks.
    pub fn has_tag_buffer(&self) -> bool {
        self.api_version.is_flexible() && self.api_key != ApiKey::ApiVersions
    }
}

/// Implemented by every request and response body.
///
/// `write_to` consumes `self` so that record payloads move into the output buffer without a copy.
pub trait ProtocolCodec<T> {
    fn write_to(self, writer: &mut BytesMut, api_version: &ApiVersion);

    fn read_from(buffer: &mut BytesMut, api_version: &ApiVersion) -> AppResult<T>;

    /// Encodes a complete response frame: size, correlation id, optional tag buffer and body.
    fn encode(self, header: &ResponseHeader) -> BytesMut
    where
        Self: Sized,
    {
        let mut writer = BytesMut::with_capacity(64);
        // placeholder for the frame size
        writer.put_i32(0);
        writer.put_i32(header.correlation_id);
        if header.has_tag_buffer() {
            TaggedFields::default().encode(&mut writer);
        }
        self.write_to(&mut writer, &header.api_version);
        finish_frame(writer)
    }

    /// Encodes a complete request frame, used by clients talking to the broker.
    fn encode_request(self, header: &RequestHeader) -> BytesMut
    where
        Self: Sized,
    {
        let mut writer = BytesMut::with_capacity(64);
        writer.put_i32(0);
        writer.put_i16(header.api_key.as_i16());
        writer.put_i16(header.api_version.as_i16());
        writer.put_i32(header.correlation_id);
        // the client id keeps its classic layout even in flexible headers
        NPString {
            value: header.client_id.clone(),
        }
        .encode(&mut writer, false);
        if header.api_version.is_flexible() {
            header.tagged_fields.clone().encode(&mut writer);
        }
        self.write_to(&mut writer, &header.api_version);
        finish_frame(writer)
    }
}

fn finish_frame(mut writer: BytesMut) -> BytesMut {
    let frame_size = (writer.len() - 4) as i32;
    writer[0..4].copy_from_slice(&frame_size.to_be_bytes());
    writer
}
