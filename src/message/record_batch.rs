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

//! A Kafka v2 record batch decoded into individual records.
//!
//! Decoding checks the magic byte and the CRC32C, which covers everything from the
//! attributes to the end of the batch. Encoding recomputes the header fields from the
//! records: the last offset delta is the record count minus one and the timestamps are the
//! earliest and latest record times.
use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::message::constants::*;
use crate::message::record::{CompressedRecords, Record};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    pub partition_leader_epoch: i32,
    pub attributes: i16,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub records: Vec<Record>,
}

impl Default for RecordBatch {
    fn default() -> Self {
        RecordBatch {
            partition_leader_epoch: NO_PARTITION_LEADER_EPOCH,
            attributes: ATTRIBUTES,
            producer_id: NO_PRODUCER_ID,
            producer_epoch: NO_PRODUCER_EPOCH,
            base_sequence: NO_SEQUENCE,
            records: vec![],
        }
    }
}

impl RecordBatch {
    pub fn new(records: Vec<Record>) -> Self {
        RecordBatch {
            records,
            ..Default::default()
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.attributes & COMPRESSION_CODEC_MASK != 0
    }

    /// Number of offsets the batch occupies once appended.
    pub fn offset_count(&self) -> i64 {
        self.records.iter().map(|r| r.span()).sum()
    }

    /// Decodes exactly one batch from the front of `buffer`.
    pub fn decode(buffer: &mut BytesMut) -> AppResult<RecordBatch> {
        if buffer.remaining() < LOG_OVERHEAD {
            return Err(AppError::CorruptMessage(format!(
                "record batch needs at least {} bytes but {} left",
                LOG_OVERHEAD,
                buffer.remaining()
            )));
        }
        let base_offset = buffer.get_i64();
        let length = buffer.get_i32();
        if length < 0
            || (length as usize) + LOG_OVERHEAD < RECORD_BATCH_OVERHEAD
            || length as usize > buffer.remaining()
        {
            return Err(AppError::CorruptMessage(format!(
                "record batch length {} is invalid, {} bytes left",
                length,
                buffer.remaining()
            )));
        }
        let mut batch = buffer.split_to(length as usize);

        let partition_leader_epoch = batch.get_i32();
        let magic = batch.get_i8();
        if magic != MAGIC {
            return Err(AppError::CorruptMessage(format!(
                "only magic {} is supported, but found {}",
                MAGIC, magic
            )));
        }
        let batch_crc = batch.get_u32();
        let compute_crc = crc32c::crc32c(batch.as_ref());
        if compute_crc != batch_crc {
            return Err(AppError::CorruptMessage(format!(
                "CRC mismatch: expected {}, but found {}",
                compute_crc, batch_crc
            )));
        }
        let attributes = batch.get_i16();
        let _last_offset_delta = batch.get_i32();
        let first_timestamp = batch.get_i64();
        let _max_timestamp = batch.get_i64();
        let producer_id = batch.get_i64();
        let producer_epoch = batch.get_i16();
        let base_sequence = batch.get_i32();
        let record_count = batch.get_i32();
        if record_count < 0 {
            return Err(AppError::CorruptMessage(format!(
                "Record count should be non-negative, but found {}",
                record_count
            )));
        }
        trace!(
            "decode batch base offset:{} records:{} attributes:{}",
            base_offset,
            record_count,
            attributes
        );

        let records = if attributes & COMPRESSION_CODEC_MASK != 0 {
            vec![Record {
                offset: base_offset,
                time: first_timestamp,
                compressed: Some(CompressedRecords {
                    attributes,
                    count: record_count,
                    payload: batch,
                }),
                ..Default::default()
            }]
        } else {
            let mut records = Vec::with_capacity((record_count as usize).min(batch.remaining()));
            for _ in 0..record_count {
                records.push(Record::read_from(&mut batch, base_offset, first_timestamp)?);
            }
            records
        };

        Ok(RecordBatch {
            partition_leader_epoch,
            attributes,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
        })
    }

    /// Appends the encoded batch to `writer`. An empty batch writes nothing.
    ///
    /// A compressed entry is written back as its own batch with the original attributes, so
    /// callers mixing plain and compressed records should go through `MemoryRecords`.
    pub fn encode(self, writer: &mut BytesMut) {
        let Some(first) = self.records.first() else {
            return;
        };
        let start = writer.len();
        let base_offset = first.offset;

        if let Some(compressed) = &first.compressed {
            writer.put_i64(base_offset);
            writer.put_i32(0);
            writer.put_i32(self.partition_leader_epoch);
            writer.put_i8(MAGIC);
            writer.put_u32(0);
            writer.put_i16(compressed.attributes);
            writer.put_i32(compressed.count.max(1) - 1);
            writer.put_i64(first.time);
            writer.put_i64(first.time);
            writer.put_i64(self.producer_id);
            writer.put_i16(self.producer_epoch);
            writer.put_i32(self.base_sequence);
            writer.put_i32(compressed.count);
            writer.put_slice(&compressed.payload);
        } else {
            let base_time = self.records.iter().map(|r| r.time).min().unwrap_or_default();
            let max_time = self.records.iter().map(|r| r.time).max().unwrap_or_default();
            writer.put_i64(base_offset);
            writer.put_i32(0);
            writer.put_i32(self.partition_leader_epoch);
            writer.put_i8(MAGIC);
            writer.put_u32(0);
            writer.put_i16(self.attributes & !COMPRESSION_CODEC_MASK);
            writer.put_i32(self.records.len() as i32 - 1);
            writer.put_i64(base_time);
            writer.put_i64(max_time);
            writer.put_i64(self.producer_id);
            writer.put_i16(self.producer_epoch);
            writer.put_i32(self.base_sequence);
            writer.put_i32(self.records.len() as i32);
            for record in &self.records {
                record.write_to(writer, base_offset, base_time);
            }
        }

        let length = (writer.len() - start - LOG_OVERHEAD) as i32;
        writer[start + LENGTH_OFFSET..start + LENGTH_OFFSET + LENGTH_LENGTH]
            .copy_from_slice(&length.to_be_bytes());
        let crc = crc32c::crc32c(&writer[start + ATTRIBUTES_OFFSET..]);
        writer[start + CRC_OFFSET..start + CRC_OFFSET + CRC_LENGTH]
            .copy_from_slice(&crc.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordHeader;

    fn sample_batch() -> RecordBatch {
        let mut first = Record::new(Some("foo-1"), Some("bar-1"));
        first.offset = 10;
        first.time = 1_000;
        let mut second = Record::new(Some("foo-2"), Some("bar-2"));
        second.offset = 11;
        second.time = 1_250;
        second.headers.push(RecordHeader::new("source", "test"));
        RecordBatch::new(vec![first, second])
    }

    #[test]
    fn test_encode_fills_header() {
        let mut writer = BytesMut::new();
        sample_batch().encode(&mut writer);

        let mut header = &writer[..RECORD_BATCH_OVERHEAD];
        assert_eq!(header.get_i64(), 10);
        assert_eq!(header.get_i32() as usize, writer.len() - LOG_OVERHEAD);
        assert_eq!(header.get_i32(), NO_PARTITION_LEADER_EPOCH);
        assert_eq!(header.get_i8(), MAGIC);
        assert_eq!(
            header.get_u32(),
            crc32c::crc32c(&writer[ATTRIBUTES_OFFSET..])
        );
        assert_eq!(header.get_i16(), 0);
        assert_eq!(header.get_i32(), 1);
        assert_eq!(header.get_i64(), 1_000);
        assert_eq!(header.get_i64(), 1_250);
    }

    #[test]
    fn test_decode_restores_records() {
        let batch = sample_batch();
        let mut writer = BytesMut::new();
        batch.clone().encode(&mut writer);
        let decoded = RecordBatch::decode(&mut writer).unwrap();
        assert_eq!(decoded, batch);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_crc_mismatch_is_rejected() {
        let mut writer = BytesMut::new();
        sample_batch().encode(&mut writer);
        let last = writer.len() - 1;
        writer[last] ^= 0xff;
        assert!(matches!(
            RecordBatch::decode(&mut writer),
            Err(AppError::CorruptMessage(_))
        ));
    }

    #[test]
    fn test_compressed_batch_passes_through() {
        let payload = BytesMut::from(&[1u8, 2, 3, 4, 5][..]);
        let batch = RecordBatch {
            attributes: 2,
            records: vec![Record {
                offset: 7,
                time: 500,
                compressed: Some(CompressedRecords {
                    attributes: 2,
                    count: 3,
                    payload: payload.clone(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut writer = BytesMut::new();
        batch.encode(&mut writer);
        let raw = writer.clone();

        let decoded = RecordBatch::decode(&mut writer).unwrap();
        assert!(decoded.is_compressed());
        assert_eq!(decoded.offset_count(), 3);
        let record = &decoded.records[0];
        assert_eq!(record.compressed.as_ref().unwrap().payload, payload);

        let mut again = BytesMut::new();
        decoded.encode(&mut again);
        assert_eq!(again, raw);
    }
}
