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

use bytes::BytesMut;

use crate::message::MemoryRecords;
use crate::protocol::base::{
    Bool, NPBytes, NPString, PBytes, PString, PUuid, PrimaryType, I16, I32, I64, I8,
};
use crate::protocol::schema_base::Schema;
use crate::protocol::schema_base::ValueSet;
use crate::protocol::types::ArrayType;
use crate::protocol::ApiVersion;
use crate::AppResult;

macro_rules! eq_match {
    ($self:ident, $other:ident, $( $pattern:ident ),+ $(,)?) => {
        match ($self, $other) {
            $( (ProtocolType::$pattern(a), ProtocolType::$pattern(b)) => a == b, )+
            (ProtocolType::Schema(a), ProtocolType::Schema(b)) => Arc::ptr_eq(a, b) || **a == **b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProtocolType {
    Bool(Bool),
    I8(I8),
    I16(I16),
    I32(I32),
    I64(I64),

    // Protocol string, distinguished from the standard String.
    PString(PString),
    NPString(NPString),

    // Protocol bytes, distinguished from the Bytes crate.
    PBytes(PBytes),
    NPBytes(NPBytes),

    PUuid(PUuid),

    // An array holds a ProtocolType describing its elements, which makes the type recursive.
    // Arc keeps the global schemas shareable across tasks.
    Array(ArrayType),

    // Raw record batches as they travel on the wire.
    Records(MemoryRecords),

    // A pointer to a nested schema, only used in schema definitions.
    Schema(Arc<Schema>),

    // The decoded (or to be encoded) values of a nested schema.
    ValueSet(ValueSet),
}

impl PartialEq for ProtocolType {
    fn eq(&self, other: &Self) -> bool {
        eq_match! {
            self, other,
            Bool, I8, I16, I32, I64, PString,
            NPString, PBytes, NPBytes, PUuid,
            Array, Records, ValueSet
        }
    }
}
impl Eq for ProtocolType {}

impl ProtocolType {
    ///
    /// An array of value sets sharing one schema.
    pub fn array_of_value_set(values: Vec<ProtocolType>, schema: Arc<Schema>) -> ProtocolType {
        ProtocolType::Array(ArrayType {
            nullable: false,
            p_type: Arc::new(ProtocolType::ValueSet(ValueSet::new(schema))),
            values: Some(values),
        })
    }
    ///
    /// A nullable array of value sets; `None` is encoded as a null array.
    pub fn nullable_array_of_value_set(
        values: Option<Vec<ProtocolType>>,
        schema: Arc<Schema>,
    ) -> ProtocolType {
        ProtocolType::Array(ArrayType {
            nullable: true,
            p_type: Arc::new(ProtocolType::ValueSet(ValueSet::new(schema))),
            values,
        })
    }
    ///
    /// An array of schema, used in schema definitions.
    pub fn array_of_schema(schema: Arc<Schema>) -> ProtocolType {
        ProtocolType::Array(ArrayType {
            nullable: false,
            p_type: Arc::new(ProtocolType::Schema(schema)),
            values: None,
        })
    }
    ///
    /// A nullable array of schema, used in schema definitions.
    pub fn nullable_array_of_schema(schema: Arc<Schema>) -> ProtocolType {
        ProtocolType::Array(ArrayType {
            nullable: true,
            p_type: Arc::new(ProtocolType::Schema(schema)),
            values: None,
        })
    }
    pub fn array_of<T: Default + Into<ProtocolType>>(value: Option<Vec<T>>) -> ProtocolType {
        let values = value.map(|values| values.into_iter().map(|v| v.into()).collect());
        ProtocolType::Array(ArrayType {
            nullable: true,
            p_type: Arc::new(T::default().into()),
            values,
        })
    }

    /// Decodes one value of the same type as `self`, which acts as the type descriptor.
    pub fn decode_as(&self, buffer: &mut BytesMut, version: &ApiVersion) -> AppResult<ProtocolType> {
        let compact = version.is_flexible();
        let value = match self {
            ProtocolType::Bool(_) => Bool::decode(buffer, compact)?,
            ProtocolType::I8(_) => I8::decode(buffer, compact)?,
            ProtocolType::I16(_) => I16::decode(buffer, compact)?,
            ProtocolType::I32(_) => I32::decode(buffer, compact)?,
            ProtocolType::I64(_) => I64::decode(buffer, compact)?,
            ProtocolType::PString(_) => PString::decode(buffer, compact)?,
            ProtocolType::NPString(_) => NPString::decode(buffer, compact)?,
            ProtocolType::PBytes(_) => PBytes::decode(buffer, compact)?,
            ProtocolType::NPBytes(_) => NPBytes::decode(buffer, compact)?,
            ProtocolType::PUuid(_) => PUuid::decode(buffer, compact)?,
            ProtocolType::Array(array) => array.decode(buffer, version)?,
            ProtocolType::Records(_) => MemoryRecords::decode(buffer, compact)?,
            ProtocolType::Schema(schema) => {
                ProtocolType::ValueSet(schema.clone().read_from(buffer, version)?)
            }
            //should never happen
            ProtocolType::ValueSet(value_set) => {
                panic!("unexpected value set used as type descriptor:{:?}", value_set);
            }
        };
        Ok(value)
    }

    pub fn encode(self, writer: &mut BytesMut, version: &ApiVersion) {
        let compact = version.is_flexible();
        match self {
            ProtocolType::Bool(bool) => bool.encode(writer, compact),
            ProtocolType::I8(i8) => i8.encode(writer, compact),
            ProtocolType::I16(i16) => i16.encode(writer, compact),
            ProtocolType::I32(i32) => i32.encode(writer, compact),
            ProtocolType::I64(i64) => i64.encode(writer, compact),
            ProtocolType::PString(string) => string.encode(writer, compact),
            ProtocolType::NPString(npstring) => npstring.encode(writer, compact),
            ProtocolType::PBytes(bytes) => bytes.encode(writer, compact),
            ProtocolType::NPBytes(npbytes) => npbytes.encode(writer, compact),
            ProtocolType::PUuid(uuid) => uuid.encode(writer, compact),
            ProtocolType::Array(array) => array.encode(writer, version),
            ProtocolType::Records(records) => records.encode(writer, compact),
            ProtocolType::ValueSet(value_set) => value_set.write_to(writer, version),
            //should never happen
            ProtocolType::Schema(schema) => {
                panic!("unexpected schema in values:{:?}", schema);
            }
        }
    }

    /// The value a field takes when the wire version does not carry it.
    ///
    /// Schema definitions hold their defaults directly, so a descriptor such as
    /// `I32 { value: -1 }` yields -1.
    pub fn default_value(&self) -> ProtocolType {
        match self {
            ProtocolType::Schema(schema) => ProtocolType::ValueSet(schema.default_value_set()),
            ProtocolType::Array(array) => {
                let p_type = match array.p_type.as_ref() {
                    ProtocolType::Schema(schema) => {
                        ProtocolType::ValueSet(ValueSet::new(schema.clone()))
                    }
                    other => other.clone(),
                };
                ProtocolType::Array(ArrayType {
                    nullable: array.nullable,
                    p_type: Arc::new(p_type),
                    values: if array.nullable { None } else { Some(vec![]) },
                })
            }
            ProtocolType::Records(_) => ProtocolType::Records(MemoryRecords::empty()),
            other => other.clone(),
        }
    }
}
