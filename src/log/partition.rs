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
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::log::segment::{Segment, SegmentInfo};
use crate::message::{Record, RecordBatch};
use crate::request::KafkaError;
use crate::store::{Hooks, KafkaEvent, KafkaLog};
use crate::validation::Validator;

/// A record rejected by the topic validator, identified by its index in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub batch_index: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendResult {
    pub base_offset: i64,
    pub record_errors: Vec<RecordError>,
    pub error: Option<KafkaError>,
}

#[derive(Debug, Default)]
struct PartitionLog {
    segments: BTreeMap<i64, Segment>,
    active: Option<i64>,
    head: i64,
    tail: i64,
}

impl PartitionLog {
    fn active_segment(&mut self, now: i64) -> &mut Segment {
        let head = match self.active {
            Some(head) if self.segments.contains_key(&head) => head,
            _ => self.tail,
        };
        self.active = Some(head);
        self.segments
            .entry(head)
            .or_insert_with(|| Segment::new(head, now))
    }

    /// Closes the active segment. An empty one is dropped instead so that its base offset
    /// stays free for the next active segment.
    fn close_active(&mut self, now: i64) -> Option<(i64, i64)> {
        let active = self.active.take()?;
        let segment = self.segments.get_mut(&active)?;
        if segment.is_empty() {
            self.segments.remove(&active);
            return None;
        }
        segment.close(now);
        Some((segment.head, segment.tail))
    }

    fn remove(&mut self, segment_head: i64) -> Option<Segment> {
        let segment = self.segments.remove(&segment_head)?;
        if self.active == Some(segment_head) {
            self.active = None;
        }
        self.head = self.head.max(segment.tail);
        Some(segment)
    }
}

/// One partition of a topic: an in-memory log split into segments keyed by base offset.
///
/// `head` is the first offset still readable and `tail` the next offset to assign. One lock
/// covers every structural change; readers take the shared side.
#[derive(Debug)]
pub struct Partition {
    pub index: i32,
    pub topic: String,
    /// broker responsible for the partition's retention
    pub leader: i32,
    pub replicas: Vec<i32>,
    log: RwLock<PartitionLog>,
    deleted: AtomicBool,
}

impl Partition {
    pub fn new(topic: impl Into<String>, index: i32, leader: i32) -> Partition {
        Partition {
            index,
            topic: topic.into(),
            leader,
            replicas: vec![leader],
            log: RwLock::new(PartitionLog::default()),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn head(&self) -> i64 {
        self.log.read().head
    }

    /// The next offset to be assigned, which is also the high watermark.
    pub fn tail(&self) -> i64 {
        self.log.read().tail
    }

    pub fn offsets(&self) -> (i64, i64) {
        let log = self.log.read();
        (log.head, log.tail)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn set_deleted(&self, deleted: bool) {
        self.deleted.store(deleted, Ordering::Release);
    }

    /// Validates and appends every record of the batch.
    ///
    /// When validation is enforced, one failing record rejects the whole batch and nothing is
    /// written. Otherwise failures are logged and the records pass through.
    pub fn append(&self, batch: RecordBatch, validator: &Validator, hooks: &Hooks) -> AppendResult {
        let mut record_errors = Vec::new();
        for (index, record) in batch.records.iter().enumerate() {
            if let Err(message) = validator.validate(record) {
                record_errors.push(RecordError {
                    batch_index: index as i32,
                    message,
                });
            }
        }
        if !record_errors.is_empty() {
            if validator.enforce() {
                let message = record_errors
                    .iter()
                    .map(|e| format!("index {}: {}", e.batch_index, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                return AppendResult {
                    base_offset: self.tail(),
                    record_errors,
                    error: Some(KafkaError::InvalidRecord(message)),
                };
            }
            for error in &record_errors {
                warn!(
                    "record {} of batch for {}-{} failed validation, passing through: {}",
                    error.batch_index, self.topic, self.index, error.message
                );
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut log = self.log.write();
        let base_offset = log.tail;
        for record in batch.records {
            let mut record = self.emit(record, log.tail, hooks);
            record.offset = log.tail;
            if record.time <= 0 {
                record.time = now;
            }
            let span = record.span();
            hooks.sink.push(self.to_log(&record));
            log.active_segment(now).push(record);
            log.tail += span;
        }
        trace!(
            "appended {} offsets to {}-{} at {}",
            log.tail - base_offset,
            self.topic,
            self.index,
            base_offset
        );
        AppendResult {
            base_offset,
            record_errors: Vec::new(),
            error: None,
        }
    }

    fn emit(&self, record: Record, offset: i64, hooks: &Hooks) -> Record {
        if record.compressed.is_some() {
            return record;
        }
        let mut event = KafkaEvent {
            topic: self.topic.clone(),
            partition: self.index,
            offset,
            key: record.key,
            value: record.value,
            headers: record.headers,
        };
        hooks.emitter.emit(&mut event);
        Record {
            key: event.key,
            value: event.value,
            headers: event.headers,
            ..record
        }
    }

    fn to_log(&self, record: &Record) -> KafkaLog {
        let text = |bytes: &Option<bytes::BytesMut>| {
            bytes
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
        };
        let headers = record
            .headers
            .iter()
            .map(|h| (h.key.clone(), text(&h.value).unwrap_or_default()))
            .collect();
        KafkaLog {
            topic: self.topic.clone(),
            partition: self.index,
            offset: record.offset,
            time: record.time,
            key: text(&record.key),
            message: text(&record.value),
            headers,
        }
    }

    /// Reads records starting at `from`.
    ///
    /// Copying stops at the tail or once the encoded size exceeds `max_bytes`; the record
    /// crossing the limit is still returned so that a consumer always makes progress.
    pub fn read(&self, from: i64, max_bytes: usize) -> Result<Vec<Record>, KafkaError> {
        let log = self.log.read();
        if from < log.head {
            return Err(KafkaError::OffsetOutOfRange(format!(
                "offset {} is before the start {} of {}-{}",
                from, log.head, self.topic, self.index
            )));
        }
        let mut records = Vec::new();
        let mut size = 0usize;
        let mut base: Option<(i64, i64)> = None;
        for segment in log.segments.values() {
            if segment.tail <= from {
                continue;
            }
            for record in segment.records_from(from) {
                if record.offset >= log.tail {
                    return Ok(records);
                }
                let (base_offset, base_time) = *base.get_or_insert((record.offset, record.time));
                size += record.size(base_offset, base_time);
                records.push(record.clone());
                if size > max_bytes {
                    return Ok(records);
                }
            }
        }
        Ok(records)
    }

    /// Closes the active segment and opens a new one at the tail.
    pub fn add_segment(&self, now: i64) {
        let mut log = self.log.write();
        log.close_active(now);
        log.active_segment(now);
    }

    /// Closes the active segment without opening another one, the next append does that.
    /// Returns the closed segment's range, or `None` when there was no data to close.
    pub fn close_active_segment(&self, now: i64) -> Option<(i64, i64)> {
        self.log.write().close_active(now)
    }

    /// Drops the segment starting at `segment_head`, advancing the partition head past it.
    pub fn remove_segment(&self, segment_head: i64) -> Option<SegmentInfo> {
        self.log.write().remove(segment_head).map(|s| s.info())
    }

    /// Drops every closed segment, returning what was removed.
    pub fn remove_closed_segments(&self) -> Vec<SegmentInfo> {
        let mut log = self.log.write();
        let closed: Vec<i64> = log
            .segments
            .values()
            .filter(|s| !s.is_active())
            .map(|s| s.head)
            .collect();
        closed
            .into_iter()
            .filter_map(|head| log.remove(head).map(|s| s.info()))
            .collect()
    }

    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.log.read().segments.values().map(|s| s.info()).collect()
    }

    pub fn active_segment(&self) -> Option<SegmentInfo> {
        let log = self.log.read();
        log.active
            .and_then(|head| log.segments.get(&head))
            .map(|s| s.info())
    }

    pub fn size(&self) -> usize {
        self.log.read().segments.values().map(|s| s.size()).sum()
    }
}
