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

use bytes::{Buf, BytesMut};
use std::io::Cursor;

use crate::message::constants::LOG_OVERHEAD;
use crate::message::record::Record;
use crate::message::record_batch::RecordBatch;
use crate::protocol::base::{NPBytes, PrimaryType, ProtocolType};
use crate::AppResult;

/// The raw bytes of zero or more record batches, as carried by produce requests and fetch
/// responses. A `None` buffer is a null record set on the wire.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct MemoryRecords {
    pub(crate) buffer: Option<BytesMut>,
}

impl std::fmt::Debug for MemoryRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecords")
            .field("buffer length", &self.buffer.as_ref().map(|b| b.len()))
            .finish()
    }
}

impl MemoryRecords {
    pub fn new(buffer: BytesMut) -> MemoryRecords {
        MemoryRecords {
            buffer: Some(buffer),
        }
    }

    pub fn empty() -> Self {
        MemoryRecords {
            buffer: Some(BytesMut::with_capacity(0)),
        }
    }

    /// Encodes records read from a log. Consecutive plain records share one batch, every
    /// compressed entry becomes a batch of its own.
    pub fn from_records(records: Vec<Record>) -> MemoryRecords {
        let mut buffer = BytesMut::new();
        let mut plain = Vec::new();
        for record in records {
            if record.compressed.is_some() {
                if !plain.is_empty() {
                    RecordBatch::new(std::mem::take(&mut plain)).encode(&mut buffer);
                }
                RecordBatch::new(vec![record]).encode(&mut buffer);
            } else {
                plain.push(record);
            }
        }
        if !plain.is_empty() {
            RecordBatch::new(plain).encode(&mut buffer);
        }
        MemoryRecords::new(buffer)
    }

    pub fn from_batch(batch: RecordBatch) -> MemoryRecords {
        let mut buffer = BytesMut::new();
        batch.encode(&mut buffer);
        MemoryRecords::new(buffer)
    }

    pub fn size(&self) -> usize {
        self.buffer.as_ref().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn first_batch_base_offset(&self) -> Option<i64> {
        let buf = self.buffer.as_ref()?;
        if buf.len() < 8 {
            return None;
        }
        let mut cursor = Cursor::new(buf.as_ref());
        Some(cursor.get_i64())
    }

    fn next_batch_size(buf: &BytesMut) -> Option<usize> {
        if buf.len() < LOG_OVERHEAD {
            return None;
        }
        let mut cursor = Cursor::new(buf.as_ref());
        let _ = cursor.get_i64();
        let length = cursor.get_i32();
        if length < 0 {
            return None;
        }
        Some(length as usize + LOG_OVERHEAD)
    }

    /// Decodes every complete batch. A trailing partial batch, which brokers may send when a
    /// fetch hits its byte limit, is ignored.
    pub fn into_batches(self) -> AppResult<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        let Some(mut buffer) = self.buffer else {
            return Ok(batches);
        };
        while let Some(batch_size) = Self::next_batch_size(&buffer) {
            if batch_size > buffer.len() {
                break;
            }
            let mut batch_buffer = buffer.split_to(batch_size);
            batches.push(RecordBatch::decode(&mut batch_buffer)?);
        }
        Ok(batches)
    }

    pub fn decode(buffer: &mut BytesMut, compact: bool) -> AppResult<ProtocolType> {
        let bytes: Option<BytesMut> = NPBytes::decode(buffer, compact)?.into();
        Ok(ProtocolType::Records(MemoryRecords { buffer: bytes }))
    }

    pub fn encode(self, writer: &mut BytesMut, compact: bool) {
        NPBytes { value: self.buffer }.encode(writer, compact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CompressedRecords;

    fn record(offset: i64, value: &str) -> Record {
        let mut record = Record::new(Some("k"), Some(value));
        record.offset = offset;
        record.time = 1_000 + offset;
        record
    }

    #[test]
    fn test_records_split_around_compressed_entries() {
        let compressed = Record {
            offset: 2,
            time: 1_002,
            compressed: Some(CompressedRecords {
                attributes: 1,
                count: 2,
                payload: BytesMut::from(&b"gzip"[..]),
            }),
            ..Default::default()
        };
        let records = vec![record(0, "a"), record(1, "b"), compressed, record(4, "c")];
        let batches = MemoryRecords::from_records(records).into_batches().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].records.len(), 2);
        assert!(batches[1].is_compressed());
        assert_eq!(batches[1].offset_count(), 2);
        assert_eq!(batches[2].records[0].offset, 4);
    }

    #[test]
    fn test_partial_trailing_batch_is_ignored() {
        let mut memory_records = MemoryRecords::from_records(vec![record(0, "a"), record(1, "b")]);
        let full_size = memory_records.size();
        let mut buffer = memory_records.buffer.take().unwrap();
        let mut extra = buffer.clone();
        extra.truncate(full_size - 3);
        buffer.unsplit(extra);

        let batches = MemoryRecords::new(buffer).into_batches().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records.len(), 2);
    }

    #[test]
    fn test_null_records_on_the_wire() {
        let mut writer = BytesMut::new();
        MemoryRecords { buffer: None }.encode(&mut writer, true);
        assert_eq!(writer.as_ref(), &[0]);
        let decoded = MemoryRecords::decode(&mut writer, true).unwrap();
        assert_eq!(decoded, ProtocolType::Records(MemoryRecords { buffer: None }));
    }
}
