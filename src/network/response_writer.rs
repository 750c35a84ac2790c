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

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::protocol::{ProtocolCodec, ResponseHeader};
use crate::{AppError, AppResult};

/// Serializes response frames onto one connection.
///
/// Handlers and group coordinators may hold clones at the same time; every frame is queued
/// whole, so frames never interleave on the wire.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    tx: mpsc::UnboundedSender<BytesMut>,
}

impl ResponseWriter {
    /// Starts the task that drains queued frames into `writer`. The task ends when every
    /// `ResponseWriter` clone is dropped or the peer stops accepting data.
    pub fn spawn<W>(writer: W) -> ResponseWriter
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<BytesMut>();
        tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(frame) = rx.recv().await {
                trace!("writing response frame of {} bytes", frame.len());
                if let Err(e) = writer.write_all(&frame).await {
                    debug!("response writer stopped: {}", e);
                    return;
                }
                if let Err(e) = writer.flush().await {
                    debug!("response writer stopped: {}", e);
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });
        ResponseWriter { tx }
    }

    /// A writer whose frames land on the returned receiver instead of a socket.
    pub fn channel() -> (ResponseWriter, mpsc::UnboundedReceiver<BytesMut>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ResponseWriter { tx }, rx)
    }

    pub fn write<R: ProtocolCodec<R>>(&self, header: &ResponseHeader, response: R) -> AppResult<()> {
        self.tx
            .send(response.encode(header))
            .map_err(|_| AppError::ChannelSendError("connection closed".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Buf;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::protocol::{ApiKey, ApiVersion};
    use crate::request::HeartbeatResponse;

    #[tokio::test]
    async fn test_frames_are_written_in_order() {
        let (client, server) = tokio::io::duplex(1024);
        let writer = ResponseWriter::spawn(server);
        let header = |correlation_id| {
            ResponseHeader::new(ApiKey::Heartbeat, ApiVersion::new(0, false), correlation_id)
        };
        writer.write(&header(1), HeartbeatResponse::default()).unwrap();
        writer.clone().write(&header(2), HeartbeatResponse::default()).unwrap();
        drop(writer);

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        let mut received = BytesMut::from(&received[..]);
        let mut correlation_ids = Vec::new();
        while received.has_remaining() {
            let size = received.get_i32() as usize;
            let mut frame = received.split_to(size);
            correlation_ids.push(frame.get_i32());
        }
        assert_eq!(correlation_ids, vec![1, 2]);
    }

    #[test]
    fn test_closed_channel_is_an_error() {
        let (writer, rx) = ResponseWriter::channel();
        drop(rx);
        let header = ResponseHeader::new(ApiKey::Heartbeat, ApiVersion::new(0, false), 1);
        assert!(writer.is_closed());
        assert!(matches!(
            writer.write(&header, HeartbeatResponse::default()),
            Err(AppError::ChannelSendError(_))
        ));
    }
}
