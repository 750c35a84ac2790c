mod common;

use common::{setup, start_cluster, TestClient};
use mockafka::protocol::api::{ConsumerAssignment, ConsumerSubscription, TopicAssignment};
use mockafka::protocol::ApiKey;
use mockafka::request::{
    ErrorCode, FindCoordinatorRequest, FindCoordinatorResponse, HeartbeatRequest,
    HeartbeatResponse, JoinGroupProtocol, JoinGroupRequest, JoinGroupResponse,
    ListGroupsRequest, ListGroupsResponse, OffsetCommitPartition, OffsetCommitRequest,
    OffsetCommitResponse, OffsetCommitTopic, OffsetFetchRequest, OffsetFetchResponse,
    SyncGroupAssignment, SyncGroupRequest, SyncGroupResponse,
};
use rstest::rstest;

fn document(port: u16) -> String {
    format!(
        r#"
info:
  title: groups
servers:
  local:
    host: 127.0.0.1:{port}
    protocol: kafka
    bindings:
      kafka:
        group.initial.rebalance.delay.ms: 100
channels:
  foo: {{}}
  audited: {{}}
operations:
  readAudited:
    action: receive
    channel:
      $ref: '#/channels/audited'
    bindings:
      kafka:
        clientId:
          type: string
          pattern: '^[A-Z]{{10}}[0-5]$'
"#
    )
}

fn join_request(group: &str, member_id: &str, topic: &str) -> JoinGroupRequest {
    let subscription = ConsumerSubscription {
        version: 0,
        topics: vec![topic.to_string()],
        user_data: None,
    };
    JoinGroupRequest {
        group_id: group.to_string(),
        session_timeout_ms: 10_000,
        rebalance_timeout_ms: 10_000,
        member_id: member_id.to_string(),
        group_instance_id: None,
        protocol_type: "consumer".to_string(),
        protocols: vec![JoinGroupProtocol {
            name: "range".to_string(),
            metadata: subscription.to_bytes(),
        }],
    }
}

fn heartbeat_request(group: &str, generation_id: i32, member_id: &str) -> HeartbeatRequest {
    HeartbeatRequest {
        group_id: group.to_string(),
        generation_id,
        member_id: member_id.to_string(),
        group_instance_id: None,
    }
}

fn commit_request(group: &str, member_id: &str, topic: &str, offset: i64) -> OffsetCommitRequest {
    OffsetCommitRequest {
        group_id: group.to_string(),
        generation_id: 1,
        member_id: member_id.to_string(),
        topics: vec![OffsetCommitTopic {
            name: topic.to_string(),
            partitions: vec![OffsetCommitPartition {
                partition_index: 0,
                committed_offset: offset,
                committed_leader_epoch: -1,
                commit_timestamp: -1,
                committed_metadata: None,
            }],
        }],
        ..Default::default()
    }
}

/// Joins with an empty member id, which from v4 on first yields MEMBER_ID_REQUIRED.
async fn join(client: &mut TestClient, group: &str, topic: &str) -> JoinGroupResponse {
    let required: JoinGroupResponse = client
        .request(ApiKey::JoinGroup, 5, join_request(group, "", topic))
        .await;
    assert_eq!(required.error_code, ErrorCode::MemberIdRequired.code());
    assert!(!required.member_id.is_empty());
    client
        .request(
            ApiKey::JoinGroup,
            5,
            join_request(group, &required.member_id, topic),
        )
        .await
}

#[rstest]
#[tokio::test]
async fn test_heartbeat_during_and_after_rebalance(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39201)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;

    let coordinator: FindCoordinatorResponse = client
        .request(
            ApiKey::FindCoordinator,
            2,
            FindCoordinatorRequest {
                key: "G".to_string(),
                key_type: 0,
            },
        )
        .await;
    assert_eq!(coordinator.error_code, ErrorCode::None.code());
    assert_eq!(coordinator.port, 39201);

    let required: JoinGroupResponse = client
        .request(ApiKey::JoinGroup, 5, join_request("G", "", "foo"))
        .await;
    let member_id = required.member_id;
    assert!(member_id.starts_with("consumer-"));
    let join_id = client
        .send(ApiKey::JoinGroup, 5, join_request("G", &member_id, "foo"))
        .await;

    // the join is still parked in the coordinator
    let heartbeat: HeartbeatResponse = client
        .request(ApiKey::Heartbeat, 3, heartbeat_request("G", 0, &member_id))
        .await;
    assert_eq!(heartbeat.error_code, ErrorCode::RebalanceInProgress.code());

    let joined: JoinGroupResponse = client.receive(ApiKey::JoinGroup, 5, join_id).await;
    assert_eq!(joined.error_code, ErrorCode::None.code());
    assert_eq!(joined.generation_id, 1);
    assert_eq!(joined.leader, member_id);
    assert_eq!(joined.protocol_name.as_deref(), Some("range"));
    assert_eq!(joined.members.len(), 1);

    let assignment = ConsumerAssignment {
        version: 0,
        topics: vec![TopicAssignment {
            topic: "foo".to_string(),
            partitions: vec![0],
        }],
        user_data: None,
    };
    let synced: SyncGroupResponse = client
        .request(
            ApiKey::SyncGroup,
            3,
            SyncGroupRequest {
                group_id: "G".to_string(),
                generation_id: joined.generation_id,
                member_id: member_id.clone(),
                assignments: vec![SyncGroupAssignment {
                    member_id: member_id.clone(),
                    assignment: assignment.clone().to_bytes(),
                }],
                ..Default::default()
            },
        )
        .await;
    assert_eq!(synced.error_code, ErrorCode::None.code());
    assert_eq!(
        ConsumerAssignment::parse(synced.assignment).unwrap(),
        assignment
    );

    let heartbeat: HeartbeatResponse = client
        .request(
            ApiKey::Heartbeat,
            3,
            heartbeat_request("G", joined.generation_id, &member_id),
        )
        .await;
    assert_eq!(heartbeat.error_code, ErrorCode::None.code());

    let stale: HeartbeatResponse = client
        .request(ApiKey::Heartbeat, 3, heartbeat_request("G", 7, &member_id))
        .await;
    assert_eq!(stale.error_code, ErrorCode::IllegalGeneration.code());

    let groups: ListGroupsResponse = client
        .request(
            ApiKey::ListGroups,
            4,
            ListGroupsRequest {
                states_filter: vec!["stable".to_string()],
            },
        )
        .await;
    assert_eq!(groups.groups.len(), 1);
    assert_eq!(groups.groups[0].group_id, "G");
    assert_eq!(groups.groups[0].protocol_type, "consumer");
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_find_transaction_coordinator_is_unsupported(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39204)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;

    let coordinator: FindCoordinatorResponse = client
        .request(
            ApiKey::FindCoordinator,
            2,
            FindCoordinatorRequest {
                key: "tx".to_string(),
                key_type: 1,
            },
        )
        .await;
    assert_eq!(coordinator.error_code, ErrorCode::Unknown.code());
    assert!(coordinator
        .error_message
        .unwrap_or_default()
        .contains("key_type=1"));
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_offset_commit_validates_client_id(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39202)).await;
    let addr = cluster.addresses()[0];

    let mut rejected = TestClient::connect(addr, "kafkatest").await;
    let joined = join(&mut rejected, "audit", "audited").await;
    let commit: OffsetCommitResponse = rejected
        .request(
            ApiKey::OffsetCommit,
            7,
            commit_request("audit", &joined.member_id, "audited", 0),
        )
        .await;
    assert_eq!(
        commit.topics[0].partitions[0].error_code,
        ErrorCode::Unknown.code()
    );

    let mut accepted = TestClient::connect(addr, "MOKAPITEST1").await;
    let joined = join(&mut accepted, "audit-b", "audited").await;
    let commit: OffsetCommitResponse = accepted
        .request(
            ApiKey::OffsetCommit,
            7,
            commit_request("audit-b", &joined.member_id, "audited", 0),
        )
        .await;
    assert_eq!(
        commit.topics[0].partitions[0].error_code,
        ErrorCode::None.code()
    );
    cluster.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn test_offset_commit_and_fetch(#[from(setup)] _setup: &()) {
    let cluster = start_cluster(&document(39203)).await;
    let mut client = TestClient::connect(cluster.addresses()[0], "consumer").await;

    let missing: OffsetFetchResponse = client
        .request(
            ApiKey::OffsetFetch,
            6,
            OffsetFetchRequest {
                group_id: "nobody".to_string(),
                topics: None,
                require_stable: false,
            },
        )
        .await;
    assert_eq!(missing.error_code, ErrorCode::GroupIdNotFound.code());

    let joined = join(&mut client, "offsets", "foo").await;
    let beyond: OffsetCommitResponse = client
        .request(
            ApiKey::OffsetCommit,
            7,
            commit_request("offsets", &joined.member_id, "foo", 5),
        )
        .await;
    assert_eq!(
        beyond.topics[0].partitions[0].error_code,
        ErrorCode::OffsetOutOfRange.code()
    );

    let committed: OffsetCommitResponse = client
        .request(
            ApiKey::OffsetCommit,
            7,
            commit_request("offsets", &joined.member_id, "foo", 0),
        )
        .await;
    assert_eq!(
        committed.topics[0].partitions[0].error_code,
        ErrorCode::None.code()
    );

    let fetched: OffsetFetchResponse = client
        .request(
            ApiKey::OffsetFetch,
            6,
            OffsetFetchRequest {
                group_id: "offsets".to_string(),
                topics: None,
                require_stable: false,
            },
        )
        .await;
    assert_eq!(fetched.error_code, ErrorCode::None.code());
    assert_eq!(fetched.topics.len(), 1);
    assert_eq!(fetched.topics[0].name, "foo");
    assert_eq!(fetched.topics[0].partitions[0].committed_offset, 0);
    cluster.shutdown().await;
}
