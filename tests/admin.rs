mod common;

use common::{setup, start_cluster, TestClient};
use mockafka::protocol::ApiKey;
use mockafka::request::{
    ApiVersionsRequest, ApiVersionsResponse, CreatableTopic, CreateTopicsRequest,
    CreateTopicsResponse, ErrorCode, HeartbeatRequest, InitProducerIdRequest,
    InitProducerIdResponse, MetadataRequest, MetadataResponse,
};
use rstest::rstest;

fn document(first: u16, second: u16) -> String {
    format!(
        r#"
info:
  title: admin-cluster
servers:
  first:
    host: 127.0.0.1:{first}
    protocol: kafka
  second:
    host: 127.0.0.1:{second}
channels:
  everywhere:
    bindings:
      kafka:
        partitions: 2
  pinned:
    servers:
      - $ref: '#/servers/second'
"#
    )
}

fn metadata_request(topics: Option<Vec<&str>>) -> MetadataRequest {
    MetadataRequest {
        topics: topics.map(|names| names.into_iter().map(String::from).collect()),
        allow_auto_topic_creation: true,
        ..Default::default()
    }
}

#[rstest]
#[tokio::test]
async fn test_api_versions(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39301, 39302)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "admin").await;

    let versions: ApiVersionsResponse = client
        .request(
            ApiKey::ApiVersions,
            3,
            ApiVersionsRequest {
                client_software_name: "mockafka-test".to_string(),
                client_software_version: "1.0".to_string(),
            },
        )
        .await;
    assert_eq!(versions.error_code, ErrorCode::None.code());
    assert_eq!(versions.api_keys.len(), 14);
    let produce = versions
        .api_keys
        .iter()
        .find(|range| range.api_key == ApiKey::Produce.as_i16())
        .unwrap();
    assert_eq!((produce.min_version, produce.max_version), (0, 9));

    // answered with the version 0 layout
    let unsupported: ApiVersionsResponse = client
        .request(ApiKey::ApiVersions, 4, ApiVersionsRequest::default())
        .await;
    assert_eq!(unsupported.error_code, ErrorCode::UnsupportedVersion.code());
    assert_eq!(unsupported.api_keys.len(), 14);
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_metadata_lists_topics_of_the_serving_broker(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39303, 39304)).await;
    let first = cluster.addresses()[0];
    let second = cluster.addresses()[1];

    let mut client = TestClient::connect(first, "admin").await;
    let metadata: MetadataResponse = client
        .request(ApiKey::Metadata, 9, metadata_request(None))
        .await;
    assert_eq!(metadata.cluster_id.as_deref(), Some("admin-cluster"));
    assert_eq!(metadata.brokers.len(), 1);
    assert_eq!(metadata.brokers[0].node_id, 0);
    assert_eq!(metadata.brokers[0].port, 39303);
    let names: Vec<_> = metadata.topics.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["everywhere"]);
    assert_eq!(metadata.topics[0].partitions.len(), 2);

    let mut client = TestClient::connect(second, "admin").await;
    let metadata: MetadataResponse = client
        .request(ApiKey::Metadata, 9, metadata_request(None))
        .await;
    let names: Vec<_> = metadata.topics.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["everywhere", "pinned"]);

    let named: MetadataResponse = client
        .request(
            ApiKey::Metadata,
            9,
            metadata_request(Some(vec!["missing", ".."])),
        )
        .await;
    assert_eq!(
        named.topics[0].error_code,
        ErrorCode::UnknownTopicOrPartition.code()
    );
    assert_eq!(named.topics[1].error_code, ErrorCode::InvalidTopic.code());
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_create_topics(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39305, 39306)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "admin").await;

    let topic = |name: &str, num_partitions: i32| CreatableTopic {
        name: name.to_string(),
        num_partitions,
        replication_factor: 1,
        ..Default::default()
    };
    let created: CreateTopicsResponse = client
        .request(
            ApiKey::CreateTopics,
            5,
            CreateTopicsRequest {
                topics: vec![
                    topic("fresh", 3),
                    topic("everywhere", 1),
                    topic("", 1),
                    topic("zero", 0),
                ],
                timeout_ms: 1000,
                validate_only: false,
            },
        )
        .await;
    let codes: Vec<_> = created.topics.iter().map(|t| t.error_code).collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::None.code(),
            ErrorCode::TopicAlreadyExists.code(),
            ErrorCode::InvalidTopic.code(),
            ErrorCode::InvalidPartitions.code(),
        ]
    );
    assert_eq!(created.topics[0].num_partitions, 3);
    assert_eq!(cluster.store().topic("fresh").unwrap().partitions().len(), 3);
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_init_producer_id(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39307, 39308)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "producer").await;

    let first: InitProducerIdResponse = client
        .request(ApiKey::InitProducerId, 2, InitProducerIdRequest::default())
        .await;
    assert_eq!(first.error_code, ErrorCode::None.code());
    assert_eq!(first.producer_epoch, 0);

    let bumped: InitProducerIdResponse = client
        .request(
            ApiKey::InitProducerId,
            3,
            InitProducerIdRequest {
                producer_id: first.producer_id,
                producer_epoch: first.producer_epoch,
                ..Default::default()
            },
        )
        .await;
    assert_eq!(bumped.producer_id, first.producer_id);
    assert_eq!(bumped.producer_epoch, 1);

    let transactional: InitProducerIdResponse = client
        .request(
            ApiKey::InitProducerId,
            2,
            InitProducerIdRequest {
                transactional_id: Some("tx".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(
        transactional.error_code,
        ErrorCode::UnsupportedForMessageFormat.code()
    );
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_unsupported_version_closes_connection(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39309, 39310)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "admin").await;

    client
        .send(ApiKey::Heartbeat, 42, HeartbeatRequest::default())
        .await;
    assert!(client.is_closed().await);
    cluster.shutdown().await;
}
