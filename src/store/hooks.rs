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

//! Extension points invoked while records flow through the broker.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use bytes::BytesMut;
use dashmap::DashMap;
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use tracing::debug;

use crate::message::RecordHeader;

/// A produced record, handed to the emitter before it is written. Changes to the key,
/// value or headers are what ends up in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<BytesMut>,
    pub value: Option<BytesMut>,
    pub headers: Vec<RecordHeader>,
}

pub trait EventEmitter: Send + Sync + Debug {
    fn emit(&self, event: &mut KafkaEvent);
}

#[derive(Debug, Default)]
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: &mut KafkaEvent) {}
}

/// One appended record as seen by the log store.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaLog {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub time: i64,
    pub key: Option<String>,
    pub message: Option<String>,
    pub headers: BTreeMap<String, String>,
}

pub trait LogSink: Send + Sync + Debug {
    fn push(&self, log: KafkaLog);
}

/// Writes every appended record to the `mockafka::records` tracing target.
#[derive(Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn push(&self, log: KafkaLog) {
        debug!(
            target: "mockafka::records",
            topic = %log.topic,
            partition = log.partition,
            offset = log.offset,
            key = ?log.key,
            "record appended"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LagKey {
    pub cluster: String,
    pub group: String,
    pub topic: String,
    pub partition: i32,
}

/// In-memory metric registry, mirrored into OpenTelemetry counters.
#[derive(Debug)]
pub struct Metrics {
    messages_total: DashMap<(String, String), u64>,
    last_message_timestamp: DashMap<(String, String), i64>,
    consumer_group_lag: DashMap<LagKey, i64>,
    messages_counter: Counter<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        let meter = global::meter("mockafka");
        Metrics {
            messages_total: DashMap::new(),
            last_message_timestamp: DashMap::new(),
            consumer_group_lag: DashMap::new(),
            messages_counter: meter
                .u64_counter("kafka_messages_total")
                .with_description("records appended per topic")
                .init(),
        }
    }
}

impl Metrics {
    pub fn add_messages(&self, cluster: &str, topic: &str, count: u64, timestamp: i64) {
        let key = (cluster.to_string(), topic.to_string());
        *self.messages_total.entry(key.clone()).or_insert(0) += count;
        self.last_message_timestamp.insert(key, timestamp);
        self.messages_counter.add(
            count,
            &[
                KeyValue::new("cluster", cluster.to_string()),
                KeyValue::new("topic", topic.to_string()),
            ],
        );
    }

    pub fn set_lag(&self, key: LagKey, lag: i64) {
        self.consumer_group_lag.insert(key, lag.max(0));
    }

    pub fn messages_total(&self, cluster: &str, topic: &str) -> u64 {
        self.messages_total
            .get(&(cluster.to_string(), topic.to_string()))
            .map(|v| *v)
            .unwrap_or(0)
    }

    pub fn last_message_timestamp(&self, cluster: &str, topic: &str) -> Option<i64> {
        self.last_message_timestamp
            .get(&(cluster.to_string(), topic.to_string()))
            .map(|v| *v)
    }

    pub fn lag(&self, key: &LagKey) -> Option<i64> {
        self.consumer_group_lag.get(key).map(|v| *v)
    }
}

#[derive(Debug, Clone)]
pub struct Hooks {
    pub emitter: Arc<dyn EventEmitter>,
    pub sink: Arc<dyn LogSink>,
    pub metrics: Arc<Metrics>,
}

impl Default for Hooks {
    fn default() -> Self {
        Hooks {
            emitter: Arc::new(NoopEmitter),
            sink: Arc::new(TracingLogSink),
            metrics: Arc::new(Metrics::default()),
        }
    }
}

impl Hooks {
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_accumulate() {
        let metrics = Metrics::default();
        metrics.add_messages("c", "foo", 2, 100);
        metrics.add_messages("c", "foo", 1, 200);
        assert_eq!(metrics.messages_total("c", "foo"), 3);
        assert_eq!(metrics.last_message_timestamp("c", "foo"), Some(200));
        assert_eq!(metrics.messages_total("c", "bar"), 0);

        let key = LagKey {
            cluster: "c".into(),
            group: "g".into(),
            topic: "foo".into(),
            partition: 0,
        };
        metrics.set_lag(key.clone(), 5);
        assert_eq!(metrics.lag(&key), Some(5));
        metrics.set_lag(key.clone(), -1);
        assert_eq!(metrics.lag(&key), Some(0));
    }
}
