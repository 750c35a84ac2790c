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

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::BytesMut;

use crate::protocol::base::{ProtocolType, TaggedFields};
use crate::protocol::schema_base::Schema;
use crate::protocol::types::ArrayType;
use crate::protocol::ApiVersion;

///
/// The values matching a schema, kept ordered by field index.
///
/// The schema is behind an `Arc` because schemas are process-wide statics shared by every
/// connection task, while a `ValueSet` itself nests inside `ProtocolType`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ValueSet {
    pub schema: Arc<Schema>,
    pub values: BTreeMap<i32, ProtocolType>,
    pub tagged_fields: TaggedFields,
}

impl ValueSet {
    pub fn new(schema: Arc<Schema>) -> ValueSet {
        ValueSet {
            schema,
            values: BTreeMap::new(),
            tagged_fields: TaggedFields::default(),
        }
    }

    pub fn sub_valueset_of_ary_field(&self, field_name: &'static str) -> ValueSet {
        let array_field = self.schema.get_field(field_name);
        let array_type: &ArrayType = (&array_field.p_type).into();

        if let ProtocolType::Schema(ref schema) = &*array_type.p_type {
            ValueSet::new(schema.clone())
        } else {
            panic!("Array type must be schema type")
        }
    }

    pub fn sub_valueset_of_schema_field(&self, field_name: &'static str) -> ValueSet {
        let schema_field = self.schema.get_field(field_name);
        if let ProtocolType::Schema(ref schema) = schema_field.p_type {
            ValueSet::new(schema.clone())
        } else {
            panic!("field type must be schema type")
        }
    }

    pub fn append_field_value(&mut self, field_name: &'static str, new_value: ProtocolType) {
        let field = self.schema.get_field(field_name);
        self.values.insert(field.index, new_value);
        if field.index + 1 != self.values.len() as i32 {
            panic!(
                "field index not match, expect:{},actual:{} with filed name:{}",
                field.index + 1,
                self.values.len(),
                field_name
            );
        }
    }

    pub fn get_field_value(&mut self, field_name: &'static str) -> ProtocolType {
        let index = self.schema.get_field_index(field_name);
        if let Some(field) = self.values.remove(&index) {
            field
        } else {
            let error_message = format!("field not found:{} in value set", field_name);
            panic!("{}", error_message);
        }
    }

    /// Appends an array of nested structs; the element schema comes from the field definition.
    pub fn append_value_sets(&mut self, field_name: &'static str, values: Vec<ValueSet>) {
        self.append_nullable_value_sets(field_name, Some(values));
    }

    pub fn append_nullable_value_sets(
        &mut self,
        field_name: &'static str,
        values: Option<Vec<ValueSet>>,
    ) {
        let schema = self.schema.sub_schema_of_ary_field(field_name);
        let values = values.map(|values| values.into_iter().map(ProtocolType::from).collect());
        let array = ProtocolType::nullable_array_of_value_set(values, schema);
        self.append_field_value(field_name, array);
    }

    pub fn get_value_sets(&mut self, field_name: &'static str) -> Vec<ValueSet> {
        self.get_nullable_value_sets(field_name)
            .unwrap_or_default()
    }

    pub fn get_nullable_value_sets(&mut self, field_name: &'static str) -> Option<Vec<ValueSet>> {
        let array: ArrayType = self.get_field_value(field_name).into();
        array
            .values
            .map(|values| values.into_iter().map(ValueSet::from).collect())
    }

    /// Writes the fields present in `version`, followed by the tag buffer in flexible versions.
    pub fn write_to(self, writer: &mut BytesMut, version: &ApiVersion) {
        let schema = self.schema;
        for (index, value) in self.values {
            let field = &schema.fields[index as usize];
            if field.versions.contains(version.as_i16()) {
                value.encode(writer, version);
            }
        }
        if version.is_flexible() {
            self.tagged_fields.encode(writer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::base::{NPString, PString, TaggedField, I16, I32};
    use crate::protocol::types::Versions;

    fn versioned_schema() -> Arc<Schema> {
        Arc::new(Schema::from_fields_desc_vec(vec![
            (0, "field1", ProtocolType::I32(I32::default()), Versions::ALL),
            (
                1,
                "field2",
                ProtocolType::PString(PString::default()),
                Versions::ALL,
            ),
            (
                2,
                "field3",
                ProtocolType::I16(I16 { value: -1 }),
                Versions::since(2),
            ),
        ]))
    }

    #[test]
    fn test_schema_data_read_write() {
        let schema = versioned_schema();
        let mut value_set = ValueSet::new(schema.clone());
        value_set.append_field_value("field1", 1i32.into());
        value_set.append_field_value("field2", "test".into());
        value_set.append_field_value("field3", 7i16.into());
        let expected = value_set.clone();

        let version = ApiVersion::new(2, false);
        let mut writer = BytesMut::new();
        value_set.write_to(&mut writer, &version);
        let read_value_set = schema.read_from(&mut writer, &version).unwrap();
        assert_eq!(read_value_set, expected);
    }

    #[test]
    fn test_field_outside_version_is_skipped() {
        let schema = versioned_schema();
        let mut value_set = ValueSet::new(schema.clone());
        value_set.append_field_value("field1", 1i32.into());
        value_set.append_field_value("field2", "test".into());
        value_set.append_field_value("field3", 7i16.into());

        let version = ApiVersion::new(1, false);
        let mut writer = BytesMut::new();
        value_set.write_to(&mut writer, &version);
        // int32 + int16 length + 4 bytes, field3 absent
        assert_eq!(writer.len(), 10);

        let mut read_value_set = schema.read_from(&mut writer, &version).unwrap();
        let field3: i16 = read_value_set.get_field_value("field3").into();
        assert_eq!(field3, -1);
    }

    #[test]
    fn test_flexible_value_set_keeps_tags() {
        let schema = Arc::new(Schema::from_fields_desc_vec(vec![(
            0,
            "name",
            ProtocolType::NPString(NPString::default()),
            Versions::ALL,
        )]));
        let mut value_set = ValueSet::new(schema.clone());
        value_set.append_field_value("name", Some("a".to_string()).into());
        value_set.tagged_fields = TaggedFields {
            fields: vec![TaggedField {
                tag: 3,
                data: BytesMut::from("x"),
            }],
        };
        let expected = value_set.clone();
        let version = ApiVersion::new(9, true);
        let mut writer = BytesMut::new();
        value_set.write_to(&mut writer, &version);
        assert_eq!(writer.as_ref(), &[2, b'a', 1, 3, 1, b'x']);
        let read = schema.read_from(&mut writer, &version).unwrap();
        assert_eq!(read, expected);
    }

    #[test]
    #[should_panic(expected = "field index not match")]
    fn test_out_of_order_append_panics() {
        let mut value_set = ValueSet::new(versioned_schema());
        value_set.append_field_value("field2", "test".into());
    }
}
