#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use mockafka::message::{Record, RecordBatch};
use mockafka::protocol::base::TaggedFields;
use mockafka::protocol::{ApiKey, ApiRegistry, ProtocolCodec, ResponseHeader};
use mockafka::request::RequestHeader;
use mockafka::service::config::NetworkConfig;
use mockafka::{setup_local_tracing, AsyncApiConfig, Cluster, Hooks, MemoryRecords, Store};
use rstest::fixture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[fixture]
#[once]
pub fn setup() -> () {
    setup_local_tracing().expect("failed to setup tracing");
}

/// Starts a cluster serving `document`. Every test uses its own ports.
pub async fn start_cluster(document: &str) -> Cluster {
    let config = AsyncApiConfig::from_yaml(document).unwrap();
    let store = Store::from_config(&config, Hooks::default()).unwrap();
    Cluster::start(store, &NetworkConfig::default()).await.unwrap()
}

pub fn records(pairs: &[(&str, &str)]) -> MemoryRecords {
    let records = pairs
        .iter()
        .map(|(key, value)| Record::new(Some(key.as_bytes()), Some(value.as_bytes())))
        .collect();
    MemoryRecords::from_batch(RecordBatch::new(records))
}

/// Decodes every record of a fetched partition into `(offset, key, value)`.
pub fn fetched(records: MemoryRecords) -> Vec<(i64, String, String)> {
    let text = |bytes: Option<BytesMut>| {
        bytes
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    };
    records
        .into_batches()
        .unwrap()
        .into_iter()
        .flat_map(|batch| batch.records)
        .map(|record| (record.offset, text(record.key), text(record.value)))
        .collect()
}

/// A minimal Kafka client speaking through the crate's own codecs.
///
/// Coordinator responses may overtake other responses on the same connection, so frames
/// that arrive for another correlation id are kept until asked for.
pub struct TestClient {
    stream: TcpStream,
    registry: ApiRegistry,
    client_id: String,
    next_correlation_id: i32,
    pending: HashMap<i32, BytesMut>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, client_id: &str) -> TestClient {
        TestClient {
            stream: TcpStream::connect(addr).await.unwrap(),
            registry: ApiRegistry::kafka(),
            client_id: client_id.to_string(),
            next_correlation_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Sends a request and returns its correlation id.
    pub async fn send<Req: ProtocolCodec<Req>>(
        &mut self,
        api_key: ApiKey,
        version: i16,
        request: Req,
    ) -> i32 {
        let correlation_id = self.next_correlation_id;
        self.next_correlation_id += 1;
        let api_version = self.registry.get(api_key).unwrap().request_version(version);
        let header = RequestHeader::new(
            api_key,
            api_version,
            correlation_id,
            Some(self.client_id.clone()),
        );
        let frame = request.encode_request(&header);
        self.stream.write_all(&frame).await.unwrap();
        correlation_id
    }

    /// Waits for the response to `correlation_id`.
    pub async fn receive<Resp: ProtocolCodec<Resp>>(
        &mut self,
        api_key: ApiKey,
        version: i16,
        correlation_id: i32,
    ) -> Resp {
        let mut body = loop {
            if let Some(body) = self.pending.remove(&correlation_id) {
                break body;
            }
            let size = self.stream.read_i32().await.unwrap();
            let mut frame = vec![0u8; size as usize];
            self.stream.read_exact(&mut frame).await.unwrap();
            let mut frame = BytesMut::from(&frame[..]);
            let received = frame.get_i32();
            self.pending.insert(received, frame);
        };
        let descriptor = self.registry.get(api_key).unwrap();
        let api_version = if descriptor.supports(version) {
            descriptor.response_version(version)
        } else {
            descriptor.response_version(0)
        };
        if ResponseHeader::new(api_key, api_version, correlation_id).has_tag_buffer() {
            TaggedFields::decode(&mut body).unwrap();
        }
        Resp::read_from(&mut body, &api_version).unwrap()
    }

    pub async fn request<Req, Resp>(&mut self, api_key: ApiKey, version: i16, request: Req) -> Resp
    where
        Req: ProtocolCodec<Req>,
        Resp: ProtocolCodec<Resp>,
    {
        let correlation_id = self.send(api_key, version, request).await;
        self.receive(api_key, version, correlation_id).await
    }

    /// True once the broker closed the connection.
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 1];
        matches!(self.stream.read(&mut buf).await, Ok(0) | Err(_))
    }
}
