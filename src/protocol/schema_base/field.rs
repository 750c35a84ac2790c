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

use crate::protocol::base::ProtocolType;
use crate::protocol::types::Versions;

/// One field of a schema. `p_type` doubles as the field's type descriptor and as the value
/// used when the wire version does not carry the field.
#[derive(Debug, Clone)]
pub struct Field {
    pub index: i32,
    pub name: &'static str,
    pub p_type: ProtocolType,
    pub versions: Versions,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.name == other.name
            && self.p_type == other.p_type
            && self.versions == other.versions
    }
}

impl Eq for Field {}
