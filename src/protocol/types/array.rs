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

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::base::{read_unsigned_varint, write_unsigned_varint, ProtocolType};
use crate::protocol::schema_base::ValueSet;
use crate::protocol::ApiVersion;
use crate::{AppError, AppResult};

///
/// When an `ArrayType` is used as a type descriptor, `p_type` is a `Schema` (or a primitive);
/// when it holds values, `p_type` is a `ValueSet` (or the same primitive).
///
/// The element count is an int32 in classic versions (-1 for null) and an unsigned varint
/// holding `count + 1` in flexible versions (0 for null).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ArrayType {
    pub nullable: bool,
    pub p_type: Arc<ProtocolType>,
    pub values: Option<Vec<ProtocolType>>,
}

impl ArrayType {
    pub fn decode(&self, buffer: &mut BytesMut, version: &ApiVersion) -> AppResult<ProtocolType> {
        let ary_size: i64 = if version.is_flexible() {
            read_unsigned_varint(buffer)? as i64 - 1
        } else {
            if buffer.remaining() < 4 {
                return Err(AppError::UnexpectedEof(
                    "can not read an array size, insufficient data".into(),
                ));
            }
            buffer.get_i32() as i64
        };
        let p_type = match &*self.p_type {
            ProtocolType::Schema(schema) => ProtocolType::ValueSet(ValueSet::new(schema.clone())),
            other_type => other_type.clone(),
        };
        if ary_size < 0 && self.nullable {
            return Ok(ProtocolType::Array(ArrayType {
                nullable: true,
                p_type: Arc::new(p_type),
                values: None,
            }));
        } else if ary_size < 0 {
            return Err(AppError::MalformedProtocol(format!(
                "array size {} can not be negative",
                ary_size
            )));
        }
        // every element takes at least one byte, so a larger count can only be garbage
        let mut values: Vec<ProtocolType> =
            Vec::with_capacity((ary_size as usize).min(buffer.remaining()));
        for _ in 0..ary_size {
            values.push(self.p_type.decode_as(buffer, version)?);
        }
        Ok(ProtocolType::Array(ArrayType {
            nullable: self.nullable,
            p_type: Arc::new(p_type),
            values: Some(values),
        }))
    }

    pub fn encode(self, writer: &mut BytesMut, version: &ApiVersion) {
        match self.values {
            None if version.is_flexible() => write_unsigned_varint(writer, 0),
            None => writer.put_i32(-1),
            Some(values) => {
                if version.is_flexible() {
                    write_unsigned_varint(writer, values.len() as u32 + 1);
                } else {
                    writer.put_i32(values.len() as i32);
                }
                for value in values {
                    value.encode(writer, version);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::base::I32;

    fn int_array(values: Option<Vec<i32>>) -> ArrayType {
        ArrayType {
            nullable: true,
            p_type: Arc::new(ProtocolType::I32(I32::default())),
            values: values.map(|v| v.into_iter().map(ProtocolType::from).collect()),
        }
    }

    #[test]
    fn test_array_read_write() {
        for flexible in [false, true] {
            let version = ApiVersion::new(0, flexible);
            let array = int_array(Some(vec![1, 2, 3]));
            let mut writer = BytesMut::new();
            array.clone().encode(&mut writer, &version);
            let read_array = array.decode(&mut writer, &version).unwrap();
            assert_eq!(read_array, ProtocolType::Array(array));
            assert!(writer.is_empty());
        }
    }

    #[test]
    fn test_null_array_layouts() {
        let mut writer = BytesMut::new();
        int_array(None).encode(&mut writer, &ApiVersion::new(9, true));
        assert_eq!(writer.as_ref(), &[0]);

        let mut writer = BytesMut::new();
        int_array(None).encode(&mut writer, &ApiVersion::new(1, false));
        assert_eq!(writer.as_ref(), &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_negative_size_rejected_when_not_nullable() {
        let array = ArrayType {
            nullable: false,
            p_type: Arc::new(ProtocolType::I32(I32::default())),
            values: None,
        };
        let mut buffer = BytesMut::from(&[0xffu8, 0xff, 0xff, 0xff][..]);
        assert!(array.decode(&mut buffer, &ApiVersion::new(0, false)).is_err());
    }
}
