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

use std::io::{self, ErrorKind};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::network::{RequestFrame, ResponseWriter};
use crate::protocol::ApiRegistry;
use crate::AppResult;

/// The read side of a client connection. Responses go through the [`ResponseWriter`]
/// handed out by [`Connection::new`], whose task owns the write side.
#[derive(Debug)]
pub struct Connection {
    reader: OwnedReadHalf,
    pub buffer: BytesMut,
    registry: Arc<ApiRegistry>,
    max_frame_size: usize,
}

impl Connection {
    pub fn new(
        socket: TcpStream,
        registry: Arc<ApiRegistry>,
        max_frame_size: usize,
    ) -> (Connection, ResponseWriter) {
        let (reader, writer) = socket.into_split();
        let connection = Connection {
            reader,
            buffer: BytesMut::with_capacity(4 * 1024),
            registry,
            max_frame_size,
        };
        (connection, ResponseWriter::spawn(writer))
    }

    /// Reads a `RequestFrame` from the connection.
    ///
    /// A malformed or oversized frame is an error and the connection should be closed.
    /// `None` means the client closed the connection between frames; closing in the middle
    /// of a frame is reported as a reset.
    pub async fn read_frame(&mut self) -> AppResult<Option<RequestFrame>> {
        loop {
            if let Some(frame) =
                RequestFrame::parse(&mut self.buffer, &self.registry, self.max_frame_size)?
            {
                return Ok(Some(frame));
            }
            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(
                        io::Error::new(ErrorKind::ConnectionReset, "connection reset by peer")
                            .into(),
                    )
                };
            }
        }
    }
}
