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

//! An in-process Kafka broker emulator.
//!
//! A [`Store`] is built from an AsyncAPI style document: every kafka server becomes a broker,
//! every channel a topic, and the operations attached to a channel restrict which clients
//! and groups may use it. [`Cluster`] binds one listener per broker and serves real Kafka
//! clients over the binary wire protocol.

pub mod group_consume;
pub mod log;
pub mod message;
pub mod network;
pub mod protocol;
pub mod request;
pub mod service;
pub mod store;
pub mod validation;

pub use message::MemoryRecords;
pub use service::config::{AsyncApiConfig, RuntimeConfig};
pub use service::{
    setup_local_tracing, setup_tracing, AppError, AppResult, Cluster, OtelGuard, Shutdown,
};
pub use store::{Hooks, Store};
