mod common;

use std::time::{Duration, Instant};

use common::{fetched, records, setup, start_cluster, TestClient};
use mockafka::protocol::{Acks, ApiKey};
use mockafka::request::{
    ErrorCode, FetchPartition, FetchRequest, FetchResponse, FetchTopic, ListOffsetsPartition,
    ListOffsetsPartitionResponse, ListOffsetsRequest, ListOffsetsResponse, ListOffsetsTopic,
    PartitionProduceData, ProduceRequest, ProduceResponse, TopicProduceData,
};
use mockafka::MemoryRecords;
use rstest::rstest;

fn document(port: u16) -> String {
    format!(
        r#"
info:
  title: produce-fetch
servers:
  local:
    host: 127.0.0.1:{port}
    protocol: kafka
channels:
  foo: {{}}
  orders:
    messages:
      order:
        contentType: application/json
        payload:
          type: object
          required: [id]
"#
    )
}

fn produce_request(topic: &str, records: MemoryRecords) -> ProduceRequest {
    ProduceRequest {
        transactional_id: None,
        required_acks: Acks::All,
        timeout: 1000,
        topic_data: vec![TopicProduceData {
            name: topic.to_string(),
            partition_data: vec![PartitionProduceData { index: 0, records }],
        }],
    }
}

fn fetch_request(topic: &str, max_wait_ms: i32, min_bytes: i32, partition_max_bytes: i32) -> FetchRequest {
    FetchRequest {
        max_wait_ms,
        min_bytes,
        max_bytes: 1000,
        topics: vec![FetchTopic {
            topic: topic.to_string(),
            partitions: vec![FetchPartition {
                partition: 0,
                fetch_offset: 0,
                partition_max_bytes,
                ..Default::default()
            }],
        }],
        ..Default::default()
    }
}

async fn list_offsets(
    client: &mut TestClient,
    version: i16,
    timestamp: i64,
    max_num_offsets: i32,
) -> ListOffsetsPartitionResponse {
    let mut response: ListOffsetsResponse = client
        .request(
            ApiKey::ListOffsets,
            version,
            ListOffsetsRequest {
                topics: vec![ListOffsetsTopic {
                    name: "foo".to_string(),
                    partitions: vec![ListOffsetsPartition {
                        timestamp,
                        max_num_offsets,
                        ..Default::default()
                    }],
                }],
                ..Default::default()
            },
        )
        .await;
    response.topics.remove(0).partitions.remove(0)
}

async fn produce(client: &mut TestClient, topic: &str, pairs: &[(&str, &str)]) -> ProduceResponse {
    client
        .request(ApiKey::Produce, 8, produce_request(topic, records(pairs)))
        .await
}

#[rstest]
#[tokio::test]
async fn test_produce_list_offsets_and_fetch(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39101)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "producer").await;

    let produced = produce(&mut client, "foo", &[("foo-1", "bar-1"), ("foo-2", "bar-2")]).await;
    let partition = &produced.responses[0].partition_responses[0];
    assert_eq!(partition.error_code, ErrorCode::None.code());
    assert_eq!(partition.base_offset, 0);

    let offsets: ListOffsetsResponse = client
        .request(
            ApiKey::ListOffsets,
            5,
            ListOffsetsRequest {
                topics: vec![ListOffsetsTopic {
                    name: "foo".to_string(),
                    partitions: vec![ListOffsetsPartition::default()],
                }],
                ..Default::default()
            },
        )
        .await;
    assert_eq!(offsets.topics[0].partitions[0].offset, 2);

    let fetch: FetchResponse = client
        .request(ApiKey::Fetch, 11, fetch_request("foo", 500, 1, 1000))
        .await;
    let data = fetch.responses[0].partitions[0].clone();
    assert_eq!(data.error_code, ErrorCode::None.code());
    assert_eq!(data.high_watermark, 2);
    assert_eq!(
        fetched(data.records),
        vec![
            (0, "foo-1".to_string(), "bar-1".to_string()),
            (1, "foo-2".to_string(), "bar-2".to_string()),
        ]
    );
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_fetch_waits_for_produced_record(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39102)).await;
    let addr = cluster.addresses()[0];
    let mut consumer = TestClient::connect(addr, "consumer").await;

    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut producer = TestClient::connect(addr, "producer").await;
        produce(&mut producer, "foo", &[("foo-1", "bar-1")]).await
    });

    let started = Instant::now();
    let fetch: FetchResponse = consumer
        .request(ApiKey::Fetch, 11, fetch_request("foo", 5000, 1, 12))
        .await;
    assert!(started.elapsed() < Duration::from_millis(4800));
    let data = fetch.responses[0].partitions[0].clone();
    assert_eq!(data.high_watermark, 1);
    assert_eq!(fetched(data.records).len(), 1);
    producer.await.unwrap();
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_fetch_without_min_bytes_returns_at_once(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39103)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;

    let started = Instant::now();
    let fetch: FetchResponse = client
        .request(ApiKey::Fetch, 11, fetch_request("foo", 1000, 0, 1000))
        .await;
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(fetch.responses[0].partitions[0].high_watermark, 0);
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_fetch_waits_until_max_wait(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39104)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;

    let started = Instant::now();
    let fetch: FetchResponse = client
        .request(ApiKey::Fetch, 11, fetch_request("foo", 1000, 1, 1000))
        .await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(800), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "{:?}", elapsed);
    assert!(fetch.responses[0].partitions[0].records.is_empty());
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_produce_errors(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39105)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "producer").await;

    let unknown = produce(&mut client, "missing", &[("k", "v")]).await;
    assert_eq!(
        unknown.responses[0].partition_responses[0].error_code,
        ErrorCode::UnknownTopicOrPartition.code()
    );

    let invalid = produce(&mut client, "orders", &[("k", "not json")]).await;
    let partition = &invalid.responses[0].partition_responses[0];
    assert_eq!(partition.error_code, ErrorCode::InvalidRecord.code());
    assert_eq!(partition.record_errors.len(), 1);
    assert_eq!(partition.record_errors[0].batch_index, 0);

    let valid = produce(&mut client, "orders", &[("k", r#"{"id": 1}"#)]).await;
    assert_eq!(
        valid.responses[0].partition_responses[0].error_code,
        ErrorCode::None.code()
    );
    assert_eq!(valid.responses[0].partition_responses[0].base_offset, 0);
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_list_offsets_edge_cases(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39106)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "producer").await;
    produce(&mut client, "foo", &[("foo-1", "bar-1"), ("foo-2", "bar-2")]).await;

    let earliest = list_offsets(&mut client, 5, -2, 1).await;
    assert_eq!(earliest.error_code, ErrorCode::None.code());
    assert_eq!(earliest.offset, 0);

    let old_style = list_offsets(&mut client, 0, -1, 1).await;
    assert_eq!(old_style.old_style_offsets, vec![2]);
    let too_many = list_offsets(&mut client, 0, -1, 3).await;
    assert_eq!(too_many.error_code, ErrorCode::Unknown.code());

    let by_time = list_offsets(&mut client, 5, 1_700_000_000_000, 1).await;
    assert_eq!(by_time.error_code, ErrorCode::Unknown.code());
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_fetch_below_log_start(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39107)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;
    produce(&mut client, "foo", &[("foo-1", "bar-1"), ("foo-2", "bar-2")]).await;

    let partition = cluster.store().topic("foo").unwrap().partition(0).unwrap();
    partition.add_segment(chrono::Utc::now().timestamp_millis());
    assert_eq!(partition.remove_closed_segments().len(), 1);

    let fetch: FetchResponse = client
        .request(ApiKey::Fetch, 11, fetch_request("foo", 500, 0, 1000))
        .await;
    let data = &fetch.responses[0].partitions[0];
    assert_eq!(data.error_code, ErrorCode::OffsetOutOfRange.code());
    assert_eq!(data.log_start_offset, 2);
    assert!(data.records.is_empty());

    let earliest = list_offsets(&mut client, 5, -2, 1).await;
    assert_eq!(earliest.offset, 2);
    cluster.shutdown().await;
}
