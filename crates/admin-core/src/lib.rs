#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Shared value types for the `weir` admin client: topic and partition
//! specs, config resources, per-element results and error codes.

pub mod config;
pub mod error;
pub mod topic;

pub use config::{
    AlterEntry, AlterOperation, ConfigEntry, ConfigResource, ConfigResourceResult, ConfigSource,
    ResourceType,
};
pub use error::{AdminError, ErrorCode};
pub use topic::{NewPartitions, NewTopic, TopicResult, BROKERS_MAX, PARTITIONS_MAX};
