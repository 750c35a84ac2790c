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

//! The per-broker log cleaner.
//!
//! On every tick the active segment of each partition led by the broker is rolled once it
//! is older than the roll interval, closed segments are dropped once they outlive the
//! retention time, and all closed segments go when the partition exceeds its byte limit.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, trace};

use crate::log::partition::Partition;
use crate::log::topic::{RetentionPolicy, Topic};
use crate::service::config::BrokerBindings;
use crate::Shutdown;

/// What one cleaning pass did to a partition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub rolled: Option<(i64, i64)>,
    pub deleted: Vec<(i64, i64)>,
}

/// Applies the roll and retention rules to one partition at time `now`.
pub fn clean_partition(partition: &Partition, policy: &RetentionPolicy, now: i64) -> CleanReport {
    let mut report = CleanReport::default();
    let segments = partition.segments();
    let size: usize = segments.iter().map(|s| s.size).sum();

    if let Some(active) = partition.active_segment() {
        if active.size > 0 && now > active.opened + policy.roll_ms {
            report.rolled = partition.close_active_segment(now);
        }
    }

    for segment in segments.iter().filter(|s| s.closed > 0) {
        if segment.size > 0 && now > segment.closed + policy.retention_ms {
            if let Some(removed) = partition.remove_segment(segment.head) {
                report.deleted.push((removed.head, removed.tail));
            }
        }
    }

    if policy.retention_bytes > 0 && size as i64 >= policy.retention_bytes {
        report.deleted.extend(
            partition
                .remove_closed_segments()
                .into_iter()
                .map(|s| (s.head, s.tail)),
        );
    }
    report
}

/// Cleans every partition the broker leads.
pub fn clean_topics(broker_id: i32, bindings: &BrokerBindings, topics: &[Arc<Topic>], now: i64) {
    for topic in topics {
        let policy = topic.retention_policy(bindings);
        for partition in topic.partitions().iter().filter(|p| p.leader == broker_id) {
            let report = clean_partition(partition, &policy, now);
            if let Some((head, tail)) = report.rolled {
                info!(
                    "rolled segment [{}:{}] of {}-{}",
                    head, tail, topic.name, partition.index
                );
            }
            for (head, tail) in report.deleted {
                info!(
                    "deleted segment [{}:{}] of {}-{}",
                    head, tail, topic.name, partition.index
                );
            }
        }
    }
}

/// Runs the cleaner until shutdown. `topics` is asked for the current topic list on each
/// tick so that reconciled topics are picked up.
pub async fn retention_task<F>(
    broker_id: i32,
    bindings: BrokerBindings,
    topics: F,
    mut shutdown: Shutdown,
) where
    F: Fn() -> Vec<Arc<Topic>> + Send + 'static,
{
    let period = Duration::from_millis(bindings.log_retention_check_interval_ms.max(1) as u64);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = chrono::Utc::now().timestamp_millis();
                clean_topics(broker_id, &bindings, &topics(), now);
            }
            _ = shutdown.recv() => {
                trace!("retention task of broker {} receiving shutdown signal", broker_id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Record, RecordBatch};
    use crate::store::Hooks;
    use crate::validation::Validator;

    fn produce(partition: &Partition, count: usize) {
        let records = (0..count).map(|_| Record::new(Some("k"), Some("v"))).collect();
        partition.append(RecordBatch::new(records), &Validator::default(), &Hooks::default());
    }

    fn policy(roll_ms: i64, retention_ms: i64, retention_bytes: i64) -> RetentionPolicy {
        RetentionPolicy {
            retention_ms,
            retention_bytes,
            roll_ms,
        }
    }

    #[test]
    fn test_roll_then_delete() {
        let partition = Partition::new("foo", 0, 0);
        produce(&partition, 1);
        let opened = partition.active_segment().unwrap().opened;
        let policy = policy(10, 500, -1);

        let report = clean_partition(&partition, &policy, opened + 5);
        assert_eq!(report, CleanReport::default());

        let report = clean_partition(&partition, &policy, opened + 500);
        assert_eq!(report.rolled, Some((0, 1)));
        assert!(report.deleted.is_empty());
        assert_eq!(partition.segments().len(), 1);
        assert!(partition.active_segment().is_none());

        let report = clean_partition(&partition, &policy, opened + 1001);
        assert_eq!(report.deleted, vec![(0, 1)]);
        assert!(partition.segments().is_empty());
        assert_eq!(partition.offsets(), (1, 1));
    }

    #[test]
    fn test_empty_active_segment_is_not_rolled() {
        let partition = Partition::new("foo", 0, 0);
        partition.add_segment(1);
        let report = clean_partition(&partition, &policy(10, 10, -1), 1000);
        assert!(report.rolled.is_none());
        assert_eq!(partition.segments().len(), 1);
    }

    #[test]
    fn test_delete_by_size() {
        let partition = Partition::new("foo", 0, 0);
        produce(&partition, 2);
        partition.add_segment(chrono::Utc::now().timestamp_millis());
        produce(&partition, 1);
        let now = chrono::Utc::now().timestamp_millis();

        let report = clean_partition(&partition, &policy(i64::MAX / 2, i64::MAX / 2, 1), now);
        assert_eq!(report.deleted, vec![(0, 2)]);
        assert_eq!(partition.head(), 2);
        assert_eq!(partition.segments().len(), 1);
    }

    #[test]
    fn test_clean_topics_skips_other_leaders() {
        let mut channel = crate::service::config::ChannelConfig::default();
        channel.bindings.kafka.segment_ms = Some(0);
        channel.bindings.kafka.retention_ms = Some(0);
        let topic = Arc::new(Topic::new("foo", &channel, &[], 1).unwrap());
        produce(&topic.partitions()[0], 1);
        let later = chrono::Utc::now().timestamp_millis() + 10;

        clean_topics(0, &BrokerBindings::default(), &[topic.clone()], later);
        assert!(topic.partitions()[0].active_segment().is_some());

        clean_topics(1, &BrokerBindings::default(), &[topic.clone()], later);
        assert!(topic.partitions()[0].active_segment().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_on_shutdown() {
        let (tx, _) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(retention_task(
            0,
            BrokerBindings::default(),
            Vec::new,
            Shutdown::subscribe(&tx),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
