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

use std::fmt::Debug;

use bytes::{Buf, BufMut, BytesMut};
use integer_encoding::VarInt;
use uuid::Uuid;

use crate::protocol::base::ProtocolType;
use crate::{AppError, AppResult};

///
/// Defines a struct that wraps a value of a specific type.
macro_rules! define_type {
    ($type_name:ident, $inner_type:ty) => {
        #[derive(Debug, Default, Clone, PartialEq, Eq)]
        pub struct $type_name {
            pub value: $inner_type,
        }
        impl From<$inner_type> for $type_name {
            fn from(value: $inner_type) -> Self {
                Self { value }
            }
        }
    };
}
///
/// Implement the PrimaryType trait for fixed width types. The compact flag has no effect on
/// these types, they are encoded identically in flexible and non-flexible versions.
macro_rules! implement_primary_type {
    ($type:ident, $return_type:ident, $read_method:ident, $write_method:ident, $size:expr) => {
        impl PrimaryType for $type {
            fn decode(buffer: &mut BytesMut, _compact: bool) -> AppResult<ProtocolType> {
                ensure_remaining(buffer, $size, stringify!($type))?;
                let value = buffer.$read_method();
                Ok(ProtocolType::$return_type($type { value }))
            }
            fn encode(self, writer: &mut BytesMut, _compact: bool) {
                writer.$write_method(self.value);
            }
        }
    };
}

/// Fundamental types, constituting the smallest unit of a schema.
///
/// Every type knows two wire layouts: the classic one with int16/int32 length prefixes and
/// the compact one used by flexible versions, where lengths are unsigned varints holding
/// `length + 1` and zero stands for null.
pub trait PrimaryType {
    fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType>;
    fn encode(self, writer: &mut BytesMut, compact: bool);
}

define_type!(Bool, bool);
define_type!(I8, i8);
define_type!(I16, i16);
define_type!(I32, i32);
define_type!(I64, i64);
define_type!(PString, String);
define_type!(NPString, Option<String>);
define_type!(PBytes, BytesMut);
define_type!(NPBytes, Option<BytesMut>);
define_type!(PUuid, Uuid);

implement_primary_type!(I8, I8, get_i8, put_i8, 1);
implement_primary_type!(I16, I16, get_i16, put_i16, 2);
implement_primary_type!(I32, I32, get_i32, put_i32, 4);
implement_primary_type!(I64, I64, get_i64, put_i64, 8);

pub(crate) fn ensure_remaining(buffer: &BytesMut, size: usize, what: &str) -> AppResult<()> {
    if buffer.remaining() < size {
        return Err(AppError::UnexpectedEof(format!(
            "can not read a {}, need {} bytes but {} left",
            what,
            size,
            buffer.remaining()
        )));
    }
    Ok(())
}

pub fn read_unsigned_varint(buffer: &mut BytesMut) -> AppResult<u32> {
    match u32::decode_var(buffer.as_ref()) {
        Some((value, read_size)) => {
            buffer.advance(read_size);
            Ok(value)
        }
        None => Err(AppError::UnexpectedEof(
            "can not read an unsigned varint".to_string(),
        )),
    }
}

pub fn write_unsigned_varint(writer: &mut BytesMut, value: u32) {
    writer.put_slice(value.encode_var_vec().as_slice());
}

/// Reads a length prefix, returning `None` for null.
///
/// Classic prefixes are int16 for strings and int32 for bytes; compact prefixes are
/// unsigned varints off by one.
fn read_length(buffer: &mut BytesMut, compact: bool, wide: bool, what: &str) -> AppResult<Option<usize>> {
    if compact {
        let length = read_unsigned_varint(buffer)?;
        return Ok(if length == 0 {
            None
        } else {
            Some(length as usize - 1)
        });
    }
    let length = if wide {
        ensure_remaining(buffer, 4, what)?;
        buffer.get_i32()
    } else {
        ensure_remaining(buffer, 2, what)?;
        buffer.get_i16() as i32
    };
    Ok(if length < 0 {
        None
    } else {
        Some(length as usize)
    })
}

fn write_length(writer: &mut BytesMut, length: Option<usize>, compact: bool, wide: bool) {
    match (compact, length) {
        (true, None) => write_unsigned_varint(writer, 0),
        (true, Some(length)) => write_unsigned_varint(writer, length as u32 + 1),
        (false, None) if wide => writer.put_i32(-1),
        (false, None) => writer.put_i16(-1),
        (false, Some(length)) if wide => writer.put_i32(length as i32),
        (false, Some(length)) => writer.put_i16(length as i16),
    }
}

fn read_payload(buffer: &mut BytesMut, length: usize, what: &str) -> AppResult<BytesMut> {
    ensure_remaining(buffer, length, what)?;
    Ok(buffer.split_to(length))
}

fn read_utf8(buffer: &mut BytesMut, length: usize, what: &str) -> AppResult<String> {
    let payload = read_payload(buffer, length, what)?;
    String::from_utf8(payload.to_vec()).map_err(|e| AppError::MalformedProtocol(e.to_string()))
}

impl PrimaryType for Bool {
    fn decode(buffer: &mut BytesMut, _compact: bool) -> AppResult<ProtocolType> {
        ensure_remaining(buffer, 1, "Bool")?;
        let value = buffer.get_u8() != 0;
        Ok(ProtocolType::Bool(Bool { value }))
    }
    fn encode(self, writer: &mut BytesMut, _compact: bool) {
        writer.put_u8(self.value as u8);
    }
}

impl PrimaryType for PUuid {
    fn decode(buffer: &mut BytesMut, _compact: bool) -> AppResult<ProtocolType> {
        let payload = read_payload(buffer, 16, "PUuid")?;
        let value = Uuid::from_slice(&payload)
            .map_err(|e| AppError::MalformedProtocol(e.to_string()))?;
        Ok(ProtocolType::PUuid(PUuid { value }))
    }
    fn encode(self, writer: &mut BytesMut, _compact: bool) {
        writer.put_slice(&self.value.as_bytes()[..]);
    }
}

impl PrimaryType for PBytes {
    fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType> {
        match read_length(buffer, compact, true, "PBytes")? {
            None => Err(AppError::MalformedProtocol(
                "can not read a PBytes, length is negative".into(),
            )),
            Some(length) => Ok(ProtocolType::PBytes(PBytes {
                value: read_payload(buffer, length, "PBytes")?,
            })),
        }
    }
    fn encode(self, writer: &mut BytesMut, compact: bool) {
        write_length(writer, Some(self.value.remaining()), compact, true);
        writer.put_slice(&self.value);
    }
}

impl PrimaryType for NPBytes {
    fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType> {
        let value = match read_length(buffer, compact, true, "NPBytes")? {
            None => None,
            Some(length) => Some(read_payload(buffer, length, "NPBytes")?),
        };
        Ok(ProtocolType::NPBytes(NPBytes { value }))
    }
    fn encode(self, writer: &mut BytesMut, compact: bool) {
        match self.value {
            Some(value) => {
                write_length(writer, Some(value.remaining()), compact, true);
                writer.put_slice(value.as_ref());
            }
            None => write_length(writer, None, compact, true),
        }
    }
}

impl PrimaryType for PString {
    fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType> {
        match read_length(buffer, compact, false, "PString")? {
            None => Err(AppError::MalformedProtocol(
                "String length can not be negative".into(),
            )),
            Some(length) => Ok(ProtocolType::PString(PString {
                value: read_utf8(buffer, length, "PString")?,
            })),
        }
    }
    fn encode(self, writer: &mut BytesMut, compact: bool) {
        write_length(writer, Some(self.value.len()), compact, false);
        writer.put_slice(self.value.as_bytes());
    }
}

impl PrimaryType for NPString {
    fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType> {
        let value = match read_length(buffer, compact, false, "NPString")? {
            None => None,
            Some(length) => Some(read_utf8(buffer, length, "NPString")?),
        };
        Ok(ProtocolType::NPString(NPString { value }))
    }
    fn encode(self, writer: &mut BytesMut, compact: bool) {
        match self.value {
            Some(value) => {
                write_length(writer, Some(value.len()), compact, false);
                writer.put_slice(value.as_bytes());
            }
            None => write_length(writer, None, compact, false),
        }
    }
}
