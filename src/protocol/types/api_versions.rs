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

use crate::protocol::base::{ProtocolType, I16};

/// The version a message is encoded with, together with whether that version of the API
/// uses the flexible layout (compact strings and arrays, trailing tag buffers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ApiVersion {
    pub version: i16,
    pub flexible: bool,
}

impl ApiVersion {
    pub fn new(version: i16, flexible: bool) -> Self {
        ApiVersion { version, flexible }
    }

    pub fn as_i16(&self) -> i16 {
        self.version
    }

    pub fn is_flexible(&self) -> bool {
        self.flexible
    }
}

impl From<ApiVersion> for ProtocolType {
    fn from(value: ApiVersion) -> Self {
        ProtocolType::I16(I16 {
            value: value.version,
        })
    }
}

/// Inclusive range of versions in which a schema field is present on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub min: i16,
    pub max: i16,
}

impl Versions {
    pub const ALL: Versions = Versions {
        min: 0,
        max: i16::MAX,
    };

    pub const fn since(min: i16) -> Versions {
        Versions { min, max: i16::MAX }
    }

    pub const fn until(max: i16) -> Versions {
        Versions { min: 0, max }
    }

    pub const fn range(min: i16, max: i16) -> Versions {
        Versions { min, max }
    }

    pub fn contains(&self, version: i16) -> bool {
        version >= self.min && version <= self.max
    }
}
