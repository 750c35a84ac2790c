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

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::trace;

use crate::protocol::base::{ProtocolType, TaggedFields};
use crate::protocol::schema_base::Field;
use crate::protocol::schema_base::ValueSet;
use crate::protocol::types::{ArrayType, Versions};
use crate::protocol::ApiVersion;
use crate::AppResult;

///
/// Schema contains a series of fields, which are ordered and indicate the definition of the schema
/// The position of the field in the schema is consistent with its index
/// To facilitate searching for the schema by name, a HashMap is used for mapping
///
/// A single schema describes every version of a message: each field carries the range of
/// versions it appears in, and fields outside the range are skipped on both read and write.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub fields_index_by_name: HashMap<&'static str, i32>,
    pub fields: Vec<Field>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Schema {}

impl Schema {
    pub fn from_fields_desc_vec(
        fields_desc: Vec<(i32, &'static str, ProtocolType, Versions)>,
    ) -> Schema {
        let mut fields = Vec::with_capacity(fields_desc.len());
        let mut fields_index_by_name = HashMap::with_capacity(fields_desc.len());
        for (index, name, p_type, versions) in fields_desc {
            fields.push(Field {
                index,
                name,
                p_type,
                versions,
            });
            fields_index_by_name.insert(name, index);
            // Ensure that both fields and fields_index_by_name are consistent.
            assert_eq!(fields.len() as i32, index + 1);
        }
        Schema {
            fields,
            fields_index_by_name,
        }
    }

    pub fn read_from(
        self: Arc<Schema>,
        buffer: &mut BytesMut,
        version: &ApiVersion,
    ) -> AppResult<ValueSet> {
        let mut value_set = ValueSet::new(self.clone());
        for field in &self.fields {
            let result = if field.versions.contains(version.as_i16()) {
                trace!("read field:{}", field.name);
                field.p_type.decode_as(buffer, version)?
            } else {
                field.p_type.default_value()
            };
            value_set.append_field_value(field.name, result);
        }
        if version.is_flexible() {
            value_set.tagged_fields = TaggedFields::decode(buffer)?;
        }
        Ok(value_set)
    }

    /// A value set holding every field's default, used for nested structs absent from a version.
    pub fn default_value_set(self: &Arc<Schema>) -> ValueSet {
        let mut value_set = ValueSet::new(self.clone());
        for field in &self.fields {
            value_set.append_field_value(field.name, field.p_type.default_value());
        }
        value_set
    }

    //
    // Retrieve the schema of an array field
    pub fn sub_schema_of_ary_field(self: &Arc<Schema>, name: &'static str) -> Arc<Schema> {
        let field = self.get_field(name);
        let array_type: &ArrayType = (&field.p_type).into();

        if let ProtocolType::Schema(schema) = array_type.p_type.as_ref() {
            schema.clone()
        } else {
            panic!("not a schema field:{:?}", array_type.p_type.as_ref())
        }
    }

    pub fn get_field_index(&self, name: &'static str) -> i32 {
        self.get_field(name).index
    }

    pub fn get_field(&self, name: &'static str) -> &Field {
        match self.fields_index_by_name.get(name) {
            Some(index) => &self.fields[*index as usize],
            None => panic!("field:{} is not part of the schema", name),
        }
    }

    pub fn has_field(&self, name: &'static str) -> bool {
        self.fields_index_by_name.contains_key(name)
    }
}

impl From<Schema> for ProtocolType {
    fn from(value: Schema) -> Self {
        ProtocolType::Schema(Arc::new(value))
    }
}
