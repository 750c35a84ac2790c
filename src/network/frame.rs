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

use bytes::{Buf, BytesMut};

use crate::protocol::ApiRegistry;
use crate::request::RequestHeader;
use crate::AppError::Incomplete;
use crate::{AppError, AppResult};

/// One complete request read off a connection: the parsed header and the still encoded body.
#[derive(Debug)]
pub struct RequestFrame {
    pub request_header: RequestHeader,
    pub request_body: BytesMut,
}

impl RequestFrame {
    /// Checks whether `buffer` holds a whole frame of at most `max_frame_size` bytes.
    pub fn check(buffer: &mut BytesMut, max_frame_size: usize) -> AppResult<()> {
        if buffer.remaining() < 4 {
            return Err(Incomplete);
        }
        let mut size_bytes = [0u8; 4];
        size_bytes.copy_from_slice(&buffer[0..4]);
        let body_size = i32::from_be_bytes(size_bytes);
        if body_size < 0 {
            return Err(AppError::MalformedProtocol(format!(
                "frame size {} less than 0",
                body_size
            )));
        }
        if body_size as usize > max_frame_size {
            return Err(AppError::MalformedProtocol(format!(
                "frame of length {} is too large",
                body_size
            )));
        }
        if buffer.remaining() < body_size as usize + 4 {
            buffer.reserve(body_size as usize + 4);
            return Err(Incomplete);
        }
        Ok(())
    }

    pub(crate) fn parse(
        buffer: &mut BytesMut,
        registry: &ApiRegistry,
        max_frame_size: usize,
    ) -> AppResult<Option<RequestFrame>> {
        match RequestFrame::check(buffer, max_frame_size) {
            Ok(_) => {
                let body_length = buffer.get_i32();
                let mut body = buffer.split_to(body_length as usize);
                let request_header = RequestHeader::read_from(&mut body, registry)?;
                Ok(Some(RequestFrame {
                    request_header,
                    request_body: body,
                }))
            }
            Err(AppError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::protocol::ApiKey;

    fn frame(body: &[u8]) -> BytesMut {
        let mut buffer = BytesMut::new();
        buffer.put_i32(body.len() as i32);
        buffer.put_slice(body);
        buffer
    }

    fn metadata_header() -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&3i16.to_be_bytes());
        header.extend_from_slice(&1i16.to_be_bytes());
        header.extend_from_slice(&7i32.to_be_bytes());
        header.extend_from_slice(&(-1i16).to_be_bytes());
        header
    }

    #[test]
    fn test_parse_complete_frame() {
        let registry = ApiRegistry::kafka();
        let mut body = metadata_header();
        body.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let mut buffer = frame(&body);
        let parsed = RequestFrame::parse(&mut buffer, &registry, 1024)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.request_header.api_key, ApiKey::Metadata);
        assert_eq!(parsed.request_header.correlation_id, 7);
        assert_eq!(parsed.request_body.len(), 4);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_frame_waits() {
        let registry = ApiRegistry::kafka();
        let mut buffer = frame(&metadata_header());
        buffer.truncate(buffer.len() - 1);
        assert!(RequestFrame::parse(&mut buffer, &registry, 1024)
            .unwrap()
            .is_none());
        let mut buffer = BytesMut::from(&[0u8, 0][..]);
        assert!(RequestFrame::parse(&mut buffer, &registry, 1024)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_frame_size_limits() {
        let registry = ApiRegistry::kafka();
        let mut buffer = BytesMut::new();
        buffer.put_i32(-1);
        assert!(RequestFrame::parse(&mut buffer, &registry, 1024).is_err());
        let mut buffer = frame(&[0u8; 64]);
        assert!(matches!(
            RequestFrame::parse(&mut buffer, &registry, 16),
            Err(AppError::MalformedProtocol(_))
        ));
    }
}
