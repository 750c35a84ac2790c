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

use bytes::{Buf, BufMut, BytesMut};
use integer_encoding::VarInt;

use crate::message::constants::RECORD_BATCH_OVERHEAD;
use crate::{AppError, AppResult};

/// One key/value header of a record. Header keys are UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<BytesMut>,
}

impl RecordHeader {
    pub fn new<T: AsRef<[u8]>>(key: impl Into<String>, value: T) -> RecordHeader {
        RecordHeader {
            key: key.into(),
            value: Some(BytesMut::from(value.as_ref())),
        }
    }

    pub fn size(&self) -> usize {
        (self.key.len() as i32).required_space() + self.key.len() + bytes_size(&self.value)
    }
}

/// The raw record section of a batch whose payload is compressed.
///
/// Such batches are never unpacked: they are stored as one log entry covering `count`
/// offsets and written back to consumers unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedRecords {
    pub attributes: i16,
    pub count: i32,
    pub payload: BytesMut,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub offset: i64,
    /// milliseconds since the epoch, zero or negative when the producer did not set one
    pub time: i64,
    pub key: Option<BytesMut>,
    pub value: Option<BytesMut>,
    pub headers: Vec<RecordHeader>,
    pub compressed: Option<CompressedRecords>,
}

impl Record {
    pub fn new<T: AsRef<[u8]>>(key: Option<T>, value: Option<T>) -> Record {
        Record {
            key: key.map(|k| BytesMut::from(k.as_ref())),
            value: value.map(|v| BytesMut::from(v.as_ref())),
            ..Default::default()
        }
    }

    /// Number of offsets this entry occupies in the log.
    pub fn span(&self) -> i64 {
        self.compressed
            .as_ref()
            .map(|c| c.count.max(1) as i64)
            .unwrap_or(1)
    }

    /// The last offset covered by this entry.
    pub fn last_offset(&self) -> i64 {
        self.offset + self.span() - 1
    }

    fn body_size(&self, base_offset: i64, base_time: i64) -> usize {
        let header_size: usize = self.headers.iter().map(|h| h.size()).sum();
        1 // attributes
            + (self.time - base_time).required_space()
            + (self.offset - base_offset).required_space()
            + bytes_size(&self.key)
            + bytes_size(&self.value)
            + (self.headers.len() as i32).required_space()
            + header_size
    }

    /// Encoded size of the record, including its length prefix, relative to the given base
    /// offset and timestamp. A compressed entry counts as the whole batch it came from.
    pub fn size(&self, base_offset: i64, base_time: i64) -> usize {
        if let Some(compressed) = &self.compressed {
            return RECORD_BATCH_OVERHEAD + compressed.payload.len();
        }
        let body_size = self.body_size(base_offset, base_time);
        (body_size as i32).required_space() + body_size
    }

    pub(crate) fn write_to(&self, writer: &mut BytesMut, base_offset: i64, base_time: i64) {
        let body_size = self.body_size(base_offset, base_time);
        put_varint(writer, body_size as i64);
        writer.put_i8(0);
        put_varint(writer, self.time - base_time);
        put_varint(writer, self.offset - base_offset);
        put_bytes(writer, &self.key);
        put_bytes(writer, &self.value);
        put_varint(writer, self.headers.len() as i64);
        for header in &self.headers {
            put_varint(writer, header.key.len() as i64);
            writer.put_slice(header.key.as_bytes());
            put_bytes(writer, &header.value);
        }
    }

    pub(crate) fn read_from(
        buffer: &mut BytesMut,
        base_offset: i64,
        base_time: i64,
    ) -> AppResult<Record> {
        let length = get_varint(buffer)?;
        if length < 0 || length as usize > buffer.remaining() {
            return Err(AppError::CorruptMessage(format!(
                "record length {} exceeds the {} bytes left in the batch",
                length,
                buffer.remaining()
            )));
        }
        let mut body = buffer.split_to(length as usize);
        ensure(&body, 1)?;
        let _attributes = body.get_i8();
        let timestamp_delta = get_varint(&mut body)?;
        let offset_delta = get_varint(&mut body)?;
        let key = get_bytes(&mut body)?;
        let value = get_bytes(&mut body)?;
        let header_count = get_varint(&mut body)?;
        let mut headers = Vec::with_capacity((header_count.max(0) as usize).min(body.remaining()));
        for _ in 0..header_count {
            let key = match get_bytes(&mut body)? {
                Some(key) => String::from_utf8(key.to_vec())
                    .map_err(|e| AppError::CorruptMessage(format!("record header key: {}", e)))?,
                None => {
                    return Err(AppError::CorruptMessage(
                        "record header key can not be null".into(),
                    ))
                }
            };
            let value = get_bytes(&mut body)?;
            headers.push(RecordHeader { key, value });
        }
        let offset = base_offset.checked_add(offset_delta).ok_or_else(|| {
            AppError::CorruptMessage(format!(
                "offset delta {} overflows base offset {}",
                offset_delta, base_offset
            ))
        })?;
        let time = base_time.checked_add(timestamp_delta).ok_or_else(|| {
            AppError::CorruptMessage(format!(
                "timestamp delta {} overflows base timestamp {}",
                timestamp_delta, base_time
            ))
        })?;
        Ok(Record {
            offset,
            time,
            key,
            value,
            headers,
            compressed: None,
        })
    }
}

fn bytes_size(data: &Option<BytesMut>) -> usize {
    match data {
        Some(data) => (data.len() as i32).required_space() + data.len(),
        None => (-1i32).required_space(),
    }
}

fn ensure(buffer: &BytesMut, size: usize) -> AppResult<()> {
    if buffer.remaining() < size {
        return Err(AppError::CorruptMessage(format!(
            "record truncated, need {} bytes but {} left",
            size,
            buffer.remaining()
        )));
    }
    Ok(())
}

fn put_varint(writer: &mut BytesMut, value: i64) {
    writer.put_slice(value.encode_var_vec().as_slice());
}

fn get_varint(buffer: &mut BytesMut) -> AppResult<i64> {
    match i64::decode_var(buffer.as_ref()) {
        Some((value, read_size)) => {
            buffer.advance(read_size);
            Ok(value)
        }
        None => Err(AppError::CorruptMessage("can not read a varint".into())),
    }
}

fn put_bytes(writer: &mut BytesMut, data: &Option<BytesMut>) {
    match data {
        Some(data) => {
            put_varint(writer, data.len() as i64);
            writer.put_slice(data);
        }
        None => put_varint(writer, -1),
    }
}

fn get_bytes(buffer: &mut BytesMut) -> AppResult<Option<BytesMut>> {
    let length = get_varint(buffer)?;
    if length < 0 {
        return Ok(None);
    }
    ensure(buffer, length as usize)?;
    Ok(Some(buffer.split_to(length as usize)))
}
