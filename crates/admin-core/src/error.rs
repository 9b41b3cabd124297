//! Request-level errors and broker-reported error codes.

use serde::{Deserialize, Serialize};

/// Client-local failure covering a whole admin request.
///
/// These never describe an individual topic or config resource; per-element
/// outcomes are reported with [`ErrorCode`] inside the result records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    /// An application-supplied argument or option was rejected.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    /// Application-supplied arguments contradict each other.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request deadline passed before a result was available.
    #[error("timed out {0}")]
    TimedOut(String),
    /// The connection to the broker failed while the request was in flight.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The broker response could not be decoded.
    #[error("bad message: {0}")]
    BadMessage(String),
    /// The broker does not support the requested operation or version.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// The request was discarded because the engine is shutting down.
    #[error("request destroyed during engine shutdown")]
    Destroyed,
}

/// Broker-reported error code as carried on the wire (INT16).
///
/// Codes the client does not know are preserved verbatim in
/// [`ErrorCode::Unknown`] so they survive a round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Success.
    None,
    /// The server experienced an unexpected error.
    UnknownServerError,
    /// This server does not host this topic-partition.
    UnknownTopicOrPartition,
    /// The request timed out on the broker.
    ///
    /// For topic-mutation requests issued with a non-positive operation
    /// timeout the broker uses this code to signal "accepted, still in
    /// progress"; the engine rewrites it to [`ErrorCode::None`] in that case.
    RequestTimedOut,
    /// The broker is not available.
    BrokerNotAvailable,
    /// The request attempted an invalid topic.
    InvalidTopic,
    /// Not authorized to access the topic.
    TopicAuthorizationFailed,
    /// Cluster authorization failed.
    ClusterAuthorizationFailed,
    /// The topic already exists.
    TopicAlreadyExists,
    /// The number of partitions is invalid.
    InvalidPartitions,
    /// The replication factor is invalid.
    InvalidReplicationFactor,
    /// The replica assignment is invalid.
    InvalidReplicaAssignment,
    /// The configuration is invalid.
    InvalidConfig,
    /// This broker is not the controller.
    NotController,
    /// The request is malformed or otherwise invalid.
    InvalidRequest,
    /// The request violated a configured policy.
    PolicyViolation,
    /// Any code without a dedicated variant.
    Unknown(i16),
}

impl ErrorCode {
    /// Map a wire code to its variant.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => ErrorCode::None,
            -1 => ErrorCode::UnknownServerError,
            3 => ErrorCode::UnknownTopicOrPartition,
            7 => ErrorCode::RequestTimedOut,
            8 => ErrorCode::BrokerNotAvailable,
            17 => ErrorCode::InvalidTopic,
            29 => ErrorCode::TopicAuthorizationFailed,
            31 => ErrorCode::ClusterAuthorizationFailed,
            36 => ErrorCode::TopicAlreadyExists,
            37 => ErrorCode::InvalidPartitions,
            38 => ErrorCode::InvalidReplicationFactor,
            39 => ErrorCode::InvalidReplicaAssignment,
            40 => ErrorCode::InvalidConfig,
            41 => ErrorCode::NotController,
            42 => ErrorCode::InvalidRequest,
            44 => ErrorCode::PolicyViolation,
            other => ErrorCode::Unknown(other),
        }
    }

    /// The wire representation of this code.
    pub fn code(self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::UnknownServerError => -1,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::RequestTimedOut => 7,
            ErrorCode::BrokerNotAvailable => 8,
            ErrorCode::InvalidTopic => 17,
            ErrorCode::TopicAuthorizationFailed => 29,
            ErrorCode::ClusterAuthorizationFailed => 31,
            ErrorCode::TopicAlreadyExists => 36,
            ErrorCode::InvalidPartitions => 37,
            ErrorCode::InvalidReplicationFactor => 38,
            ErrorCode::InvalidReplicaAssignment => 39,
            ErrorCode::InvalidConfig => 40,
            ErrorCode::NotController => 41,
            ErrorCode::InvalidRequest => 42,
            ErrorCode::PolicyViolation => 44,
            ErrorCode::Unknown(code) => code,
        }
    }

    /// Canonical human-readable description, used when the broker supplies
    /// no message of its own.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::None => "Success",
            ErrorCode::UnknownServerError => "Unknown broker error",
            ErrorCode::UnknownTopicOrPartition => "Unknown topic or partition",
            ErrorCode::RequestTimedOut => "Broker: Request timed out",
            ErrorCode::BrokerNotAvailable => "Broker not available",
            ErrorCode::InvalidTopic => "Invalid topic",
            ErrorCode::TopicAuthorizationFailed => "Topic authorization failed",
            ErrorCode::ClusterAuthorizationFailed => "Cluster authorization failed",
            ErrorCode::TopicAlreadyExists => "Topic already exists",
            ErrorCode::InvalidPartitions => "Invalid number of partitions",
            ErrorCode::InvalidReplicationFactor => "Invalid replication factor",
            ErrorCode::InvalidReplicaAssignment => "Invalid replica assignment",
            ErrorCode::InvalidConfig => "Invalid config",
            ErrorCode::NotController => "Not controller for cluster",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::PolicyViolation => "Policy violation",
            ErrorCode::Unknown(_) => "Unrecognized broker error",
        }
    }

    /// Whether this code reports a failure.
    pub fn is_error(self) -> bool {
        self != ErrorCode::None
    }
}
