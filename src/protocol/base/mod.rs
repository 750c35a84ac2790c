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

mod primary_types;
mod protocol_type;
mod tagged_fields;
mod type_conversion;

pub use primary_types::{
    read_unsigned_varint, write_unsigned_varint, Bool, NPBytes, NPString, PBytes, PString,
    PUuid, PrimaryType, I16, I32, I64, I8,
};
pub use protocol_type::ProtocolType;
pub use tagged_fields::{TaggedField, TaggedFields};
