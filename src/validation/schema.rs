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

use serde_json::Value;

use crate::{AppError, AppResult};

const JSON_SCHEMA_FORMATS: [&str; 3] = [
    "application/schema+json",
    "application/schema+yaml",
    "application/vnd.aai.asyncapi",
];

/// A compiled JSON Schema.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> AppResult<SchemaValidator> {
        let validator = jsonschema::Validator::new(schema)
            .map_err(|e| AppError::InvalidSchema(format!("{}: {}", schema, e)))?;
        Ok(SchemaValidator { validator })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Returns every violation joined into one message.
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join(", "))
        }
    }

    /// Validates a plain string such as a client id or group id.
    pub fn validate_str(&self, value: &str) -> Result<(), String> {
        self.validate(&Value::String(value.to_string()))
    }
}

/// Compiles an optional schema definition.
///
/// A `{schemaFormat, schema}` wrapper is unwrapped when its format is a JSON Schema dialect;
/// any other format yields `None` and the value goes unchecked.
pub fn compile_schema(definition: Option<&Value>) -> AppResult<Option<SchemaValidator>> {
    let Some(definition) = definition else {
        return Ok(None);
    };
    let schema = match (definition.get("schemaFormat"), definition.get("schema")) {
        (Some(Value::String(format)), Some(schema)) => {
            let format = format.to_ascii_lowercase();
            if !JSON_SCHEMA_FORMATS.iter().any(|f| format.starts_with(f)) {
                return Ok(None);
            }
            schema
        }
        _ => definition,
    };
    SchemaValidator::new(schema).map(Some)
}
