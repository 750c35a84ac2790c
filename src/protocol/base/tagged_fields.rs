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

use super::primary_types::{ensure_remaining, read_unsigned_varint, write_unsigned_varint};
use crate::AppResult;

/// One entry of a tag buffer: a numeric tag and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedField {
    pub tag: u32,
    pub data: BytesMut,
}

/// The trailing tag buffer carried by every struct of a flexible version.
///
/// Tags this broker does not understand are kept as raw bytes so that a decoded message
/// re-encodes to the same bytes. An empty buffer is a single zero byte on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedFields {
    pub fields: Vec<TaggedField>,
}

impl TaggedFields {
    pub fn decode(buffer: &mut BytesMut) -> AppResult<TaggedFields> {
        let count = read_unsigned_varint(buffer)?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = read_unsigned_varint(buffer)?;
            let size = read_unsigned_varint(buffer)? as usize;
            ensure_remaining(buffer, size, "tagged field")?;
            fields.push(TaggedField {
                tag,
                data: buffer.split_to(size),
            });
        }
        Ok(TaggedFields { fields })
    }

    pub fn encode(self, writer: &mut BytesMut) {
        write_unsigned_varint(writer, self.fields.len() as u32);
        for field in self.fields {
            write_unsigned_varint(writer, field.tag);
            write_unsigned_varint(writer, field.data.len() as u32);
            writer.put_slice(&field.data);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, tag: u32) -> Option<&BytesMut> {
        self.fields.iter().find(|f| f.tag == tag).map(|f| &f.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tag_buffer_is_single_zero() {
        let mut writer = BytesMut::new();
        TaggedFields::default().encode(&mut writer);
        assert_eq!(writer.as_ref(), &[0]);
    }

    #[test]
    fn test_unknown_tags_are_preserved() {
        let fields = TaggedFields {
            fields: vec![
                TaggedField {
                    tag: 0,
                    data: BytesMut::from("cluster"),
                },
                TaggedField {
                    tag: 7,
                    data: BytesMut::new(),
                },
            ],
        };
        let mut writer = BytesMut::new();
        fields.clone().encode(&mut writer);
        let decoded = TaggedFields::decode(&mut writer).unwrap();
        assert_eq!(decoded, fields);
        assert_eq!(decoded.get(0).map(|b| b.as_ref()), Some(&b"cluster"[..]));
        assert!(writer.is_empty());
    }
}
