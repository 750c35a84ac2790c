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

use crate::message::Record;

/// A contiguous range of a partition's log, rolled and retained as a unit.
///
/// `head` is the first offset held by the segment and `tail` the next one to be appended,
/// so an empty segment has `head == tail`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub head: i64,
    pub tail: i64,
    records: Vec<Record>,
    size: usize,
    base_time: i64,
    opened: i64,
    /// zero while the segment is active
    closed: i64,
}

/// A point-in-time view of a segment, used by the retention loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub head: i64,
    pub tail: i64,
    pub size: usize,
    pub opened: i64,
    pub closed: i64,
}

impl Segment {
    pub fn new(head: i64, now: i64) -> Segment {
        Segment {
            head,
            tail: head,
            records: Vec::new(),
            size: 0,
            base_time: 0,
            opened: now,
            closed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.closed == 0
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn opened(&self) -> i64 {
        self.opened
    }

    pub fn closed(&self) -> i64 {
        self.closed
    }

    pub fn close(&mut self, now: i64) {
        // a close timestamp of zero would read as active
        self.closed = now.max(1);
    }

    /// Appends a record whose offset has already been assigned.
    pub fn push(&mut self, record: Record) {
        if self.records.is_empty() {
            self.base_time = record.time;
        }
        self.size += record.size(self.head, self.base_time);
        self.tail = record.last_offset() + 1;
        self.records.push(record);
    }

    /// Records whose offset range reaches `from` or beyond.
    pub fn records_from(&self, from: i64) -> impl Iterator<Item = &Record> {
        let start = self.records.partition_point(|r| r.last_offset() < from);
        self.records[start..].iter()
    }

    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            head: self.head,
            tail: self.tail,
            size: self.size,
            opened: self.opened,
            closed: self.closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(offset: i64) -> Record {
        let mut record = Record::new(Some("k"), Some("v"));
        record.offset = offset;
        record.time = 1000;
        record
    }

    #[test]
    fn test_push_advances_tail() {
        let mut segment = Segment::new(5, 100);
        assert!(segment.is_empty());
        assert!(segment.is_active());
        segment.push(record(5));
        segment.push(record(6));
        assert_eq!(segment.tail, 7);
        assert!(segment.size() > 0);
        let offsets: Vec<i64> = segment.records_from(6).map(|r| r.offset).collect();
        assert_eq!(offsets, vec![6]);
        assert_eq!(segment.records_from(7).count(), 0);
    }

    #[test]
    fn test_close() {
        let mut segment = Segment::new(0, 100);
        segment.close(0);
        assert!(!segment.is_active());
        assert_eq!(segment.info().closed, 1);
    }
}
