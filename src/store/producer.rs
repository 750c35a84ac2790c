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

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::request::KafkaError;

/// Ids and epochs of idempotent producers.
#[derive(Debug, Default)]
pub struct Producers {
    inner: Mutex<ProducerIds>,
}

#[derive(Debug, Default)]
struct ProducerIds {
    next_id: i64,
    epochs: HashMap<i64, i16>,
}

impl Producers {
    /// Hands out a new producer id at epoch 0 when `producer_id` is -1, otherwise bumps
    /// the epoch of a known producer.
    pub fn init(&self, producer_id: i64, epoch: i16) -> Result<(i64, i16), KafkaError> {
        let mut inner = self.inner.lock();
        if producer_id < 0 {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.epochs.insert(id, 0);
            return Ok((id, 0));
        }
        let Some(stored) = inner.epochs.get_mut(&producer_id) else {
            return Err(KafkaError::UnknownProducerId(producer_id.to_string()));
        };
        if epoch < *stored {
            return Err(KafkaError::ProducerFenced(format!(
                "producer {} at epoch {} is older than {}",
                producer_id, epoch, stored
            )));
        }
        *stored = stored.checked_add(1).unwrap_or(0);
        Ok((producer_id, *stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let producers = Producers::default();
        assert_eq!(producers.init(-1, -1).unwrap(), (0, 0));
        assert_eq!(producers.init(-1, -1).unwrap(), (1, 0));
    }

    #[test]
    fn test_epoch_bump_and_fencing() {
        let producers = Producers::default();
        let (id, epoch) = producers.init(-1, -1).unwrap();
        assert_eq!(producers.init(id, epoch).unwrap(), (id, 1));
        assert_eq!(producers.init(id, 1).unwrap(), (id, 2));
        assert!(matches!(
            producers.init(id, 0),
            Err(KafkaError::ProducerFenced(_))
        ));
        assert!(matches!(
            producers.init(42, 0),
            Err(KafkaError::UnknownProducerId(_))
        ));
    }
}
