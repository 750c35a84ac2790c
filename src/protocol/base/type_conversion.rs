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

use bytes::BytesMut;
use uuid::Uuid;

use crate::message::MemoryRecords;
use crate::protocol::base::ProtocolType;
use crate::protocol::base::{Bool, NPBytes, NPString, PBytes, PString, PUuid, I16, I32, I64, I8};
use crate::protocol::schema_base::ValueSet;
use crate::protocol::types::ArrayType;

///
/// convert rust types to `ProtocolType` enum variant
///
macro_rules! define_from_rust_type_to_datatype {
    ($(($variant:ident,$type:ty)),*) => {
        $(
        impl From<$type> for ProtocolType {
                fn from(value: $type) -> Self {
                    ProtocolType::$variant($variant { value })
                }
            }
        )*
    };
}
///
/// convert `ProtocolType` enum variant to rust types
///
macro_rules! define_from_datatype_to_rust_type {
    ($variant:ident,$type:ty ) => {
        impl std::convert::From<ProtocolType> for $type {
            fn from(value: ProtocolType) -> Self {
                match value {
                    ProtocolType::$variant(data) => data.value,
                    field => {
                        let error_message =
                            format!("Expected {:?} but found {:?}", stringify!($variant), field);
                        panic!("{}", error_message);
                    }
                }
            }
        }
    };
}

/// Converts an array of primitives into a `Vec`, a null array becomes empty.
macro_rules! define_from_array_to_vec {
    ($type:ty) => {
        impl From<ProtocolType> for Vec<$type> {
            fn from(value: ProtocolType) -> Self {
                let array: ArrayType = value.into();
                array
                    .values
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v.into())
                    .collect()
            }
        }
    };
}
///////////////////////////////////////////  ProtocolType to Rust type ///////////////////////////////////////////

define_from_datatype_to_rust_type!(Bool, bool);
define_from_datatype_to_rust_type!(I8, i8);
define_from_datatype_to_rust_type!(I16, i16);
define_from_datatype_to_rust_type!(I32, i32);
define_from_datatype_to_rust_type!(I64, i64);
define_from_datatype_to_rust_type!(PString, String);
define_from_datatype_to_rust_type!(NPString, Option<String>);
define_from_datatype_to_rust_type!(PBytes, BytesMut);
define_from_datatype_to_rust_type!(NPBytes, Option<BytesMut>);
define_from_datatype_to_rust_type!(PUuid, Uuid);

define_from_array_to_vec!(i32);
define_from_array_to_vec!(i64);
define_from_array_to_vec!(String);

impl From<ProtocolType> for MemoryRecords {
    fn from(value: ProtocolType) -> Self {
        match value {
            ProtocolType::Records(records) => records,
            field => {
                let error_message = format!("Expected Records but found {:?}", field);
                panic!("{}", error_message);
            }
        }
    }
}

impl From<ProtocolType> for ValueSet {
    fn from(value: ProtocolType) -> Self {
        match value {
            ProtocolType::ValueSet(values) => values,
            field => {
                let error_message = format!("Expected ValueSet but found {:?}", field);
                panic!("{}", error_message);
            }
        }
    }
}

impl From<ProtocolType> for ArrayType {
    fn from(value: ProtocolType) -> Self {
        match value {
            ProtocolType::Array(array) => array,
            field => {
                let error_message = format!("Expected Array but found {:?}", field);
                panic!("{}", error_message);
            }
        }
    }
}
impl<'a> From<&'a ProtocolType> for &'a ArrayType {
    fn from(value: &'a ProtocolType) -> Self {
        match value {
            ProtocolType::Array(array) => array,
            field => {
                let error_message = format!("Expected &Array but found {:?}", field);
                panic!("{}", error_message);
            }
        }
    }
}

/////////////////////////////////////////// Rust type to ProtocolType ///////////////////////////////////////////

define_from_rust_type_to_datatype!(
    (Bool, bool),
    (I8, i8),
    (I16, i16),
    (I32, i32),
    (I64, i64),
    (PString, String),
    (NPString, Option<String>),
    (PBytes, BytesMut),
    (NPBytes, Option<BytesMut>),
    (PUuid, Uuid)
);

impl From<&str> for ProtocolType {
    fn from(value: &str) -> Self {
        ProtocolType::PString(PString {
            value: value.to_string(),
        })
    }
}

impl From<ValueSet> for ProtocolType {
    fn from(value: ValueSet) -> Self {
        ProtocolType::ValueSet(value)
    }
}

impl From<MemoryRecords> for ProtocolType {
    fn from(value: MemoryRecords) -> Self {
        ProtocolType::Records(value)
    }
}
