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

//! Kafka wire protocol.
//!
//! Every message is described by a [`Schema`](schema_base::Schema): an ordered list of fields,
//! each carrying the range of versions it exists in. One schema therefore covers every
//! version of a request or response, and flexible versions (compact strings and arrays plus
//! trailing tag buffers) are selected by the [`ApiVersion`] passed to the codec.
//!
//! The [`ApiRegistry`] ties each [`ApiKey`] to its supported version range, its flexible
//! thresholds and the decoder that turns a request body into an
//! [`ApiRequest`](crate::request::ApiRequest).

pub mod api;
mod api_registry;
pub mod base;
pub mod schema_base;
pub mod types;

pub use api_registry::{ApiDescriptor, ApiRegistry, ApiRegistryBuilder};
pub use schema_base::{ProtocolCodec, ResponseHeader};
pub use types::{Acks, ApiKey, ApiVersion, Versions};
