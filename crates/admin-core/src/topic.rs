//! Topic creation, deletion and partition-growth specs, plus the per-topic
//! result record shared by the three topic-mutation APIs.

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, ErrorCode};

/// Highest partition count accepted from the application.
pub const PARTITIONS_MAX: i32 = 100_000;

/// Highest broker count accepted in replica assignments and replication
/// factors.
pub const BROKERS_MAX: i32 = 10_000;

/// Specification of a topic to create.
///
/// Either a replication factor or explicit per-partition replica assignments
/// may be given, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    name: String,
    num_partitions: i32,
    replication_factor: i32,
    replicas: Vec<Vec<i32>>,
    config: Vec<(String, String)>,
}

impl NewTopic {
    /// New topic spec. `replication_factor` may be `-1` to defer to explicit
    /// replica assignments added with
    /// [`set_replica_assignment`](Self::set_replica_assignment).
    pub fn new(
        name: impl Into<String>,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<Self, AdminError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AdminError::InvalidArg("invalid topic name".into()));
        }
        if !(1..=PARTITIONS_MAX).contains(&num_partitions) {
            return Err(AdminError::InvalidArg(format!(
                "num_partitions out of expected range 1..{PARTITIONS_MAX}"
            )));
        }
        if !(-1..=BROKERS_MAX).contains(&replication_factor) {
            return Err(AdminError::InvalidArg(format!(
                "replication_factor out of expected range -1..{BROKERS_MAX}"
            )));
        }
        Ok(Self {
            name,
            num_partitions,
            replication_factor,
            replicas: Vec::new(),
            config: Vec::new(),
        })
    }

    /// Set the replica (broker id) assignment for `partition`.
    ///
    /// Partitions must be assigned consecutively starting at 0, and the
    /// topic must have been created with a replication factor of `-1`.
    pub fn set_replica_assignment(
        &mut self,
        partition: i32,
        broker_ids: &[i32],
    ) -> Result<&mut Self, AdminError> {
        if self.replication_factor != -1 {
            return Err(AdminError::InvalidArg(
                "specifying a replication factor and a replica assignment \
                 are mutually exclusive"
                    .into(),
            ));
        }
        if partition != self.replicas.len() as i32 {
            return Err(AdminError::InvalidArg(format!(
                "partitions must be added in order, starting at 0: \
                 expecting partition {}, not {partition}",
                self.replicas.len()
            )));
        }
        if broker_ids.len() > BROKERS_MAX as usize {
            return Err(AdminError::InvalidArg(format!(
                "too many brokers specified (max {BROKERS_MAX})"
            )));
        }
        self.replicas.push(broker_ids.to_vec());
        Ok(self)
    }

    /// Set a broker-side topic configuration property.
    pub fn set_config(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, AdminError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AdminError::InvalidArg("config name must not be empty".into()));
        }
        self.config.push((name, value.into()));
        Ok(self)
    }

    /// Topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested partition count.
    pub fn num_partitions(&self) -> i32 {
        self.num_partitions
    }

    /// Requested replication factor, `-1` when replica assignments are used.
    pub fn replication_factor(&self) -> i32 {
        self.replication_factor
    }

    /// Per-partition replica assignments, empty unless explicitly set.
    pub fn replica_assignment(&self) -> &[Vec<i32>] {
        &self.replicas
    }

    /// Topic configuration properties in insertion order.
    pub fn config(&self) -> &[(String, String)] {
        &self.config
    }
}

/// Specification for growing a topic to a new total partition count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartitions {
    topic: String,
    total_count: i32,
    replicas: Vec<Vec<i32>>,
}

impl NewPartitions {
    /// Grow `topic` to `new_total_count` partitions.
    pub fn new(topic: impl Into<String>, new_total_count: i32) -> Result<Self, AdminError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(AdminError::InvalidArg("invalid topic name".into()));
        }
        if !(1..=PARTITIONS_MAX).contains(&new_total_count) {
            return Err(AdminError::InvalidArg(format!(
                "new_total_cnt out of expected range 1..{PARTITIONS_MAX}"
            )));
        }
        Ok(Self {
            topic,
            total_count: new_total_count,
            replicas: Vec::new(),
        })
    }

    /// Set the replica assignment for the `new_partition_idx`th partition
    /// being added. Assignments must be added consecutively starting at 0.
    pub fn set_replica_assignment(
        &mut self,
        new_partition_idx: i32,
        broker_ids: &[i32],
    ) -> Result<&mut Self, AdminError> {
        if new_partition_idx != self.replicas.len() as i32 {
            return Err(AdminError::InvalidArg(format!(
                "partitions must be added in order, starting at 0: \
                 expecting partition index {}, not {new_partition_idx}",
                self.replicas.len()
            )));
        }
        if broker_ids.len() > BROKERS_MAX as usize {
            return Err(AdminError::InvalidArg(format!(
                "too many brokers specified (max {BROKERS_MAX})"
            )));
        }
        self.replicas.push(broker_ids.to_vec());
        Ok(self)
    }

    /// Topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Requested total partition count.
    pub fn total_count(&self) -> i32 {
        self.total_count
    }

    /// Replica assignments for the partitions being added, empty unless set.
    pub fn replica_assignment(&self) -> &[Vec<i32>] {
        &self.replicas
    }
}

/// Per-topic outcome of a CreateTopics, DeleteTopics or CreatePartitions
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicResult {
    /// Topic name.
    pub topic: String,
    /// Broker-reported outcome, [`ErrorCode::None`] on success.
    pub error: ErrorCode,
    /// Error description when `error` is set: the broker-supplied message
    /// if it sent one, otherwise the canonical description of the code.
    pub error_message: Option<String>,
}

impl TopicResult {
    /// Whether this topic failed.
    pub fn is_err(&self) -> bool {
        self.error.is_error()
    }
}
