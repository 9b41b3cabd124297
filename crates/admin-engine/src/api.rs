//! Public API types for the in-process admin engine.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use weir_admin_core::{
    AdminError, ConfigResource, ConfigResourceResult, NewPartitions, NewTopic, TopicResult,
};

use crate::cluster::ClusterView;
use crate::engine::EngineShared;
use crate::notify::OpSender;
use crate::request::{AdminRequest, RequestArgs};

/// The admin APIs the engine can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminOp {
    /// Create one or more topics.
    CreateTopics,
    /// Delete one or more topics.
    DeleteTopics,
    /// Grow one or more topics to a new partition count.
    CreatePartitions,
    /// Alter broker or topic configuration.
    AlterConfigs,
    /// Read broker or topic configuration.
    DescribeConfigs,
}

impl AdminOp {
    /// Display name, matching the protocol nomenclature.
    pub fn name(self) -> &'static str {
        match self {
            AdminOp::CreateTopics => "CreateTopics",
            AdminOp::DeleteTopics => "DeleteTopics",
            AdminOp::CreatePartitions => "CreatePartitions",
            AdminOp::AlterConfigs => "AlterConfigs",
            AdminOp::DescribeConfigs => "DescribeConfigs",
        }
    }
}

/// Application-side value attached to a submission and echoed in its result
/// event.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// Sender half of an application reply queue.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<AdminEvent>;

/// Receiver half of an application reply queue.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AdminEvent>;

/// New application reply queue for admin result events.
pub fn event_queue() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

const TIMEOUT_MAX_MS: i32 = 3_600_000;

/// Per-call options, snapshotted into the request at submission.
///
/// An options value is built `for` one API (or for any API when `None` is
/// given) and each setter rejects options the target API does not accept.
#[derive(Clone)]
pub struct AdminOptions {
    for_api: Option<AdminOp>,
    request_timeout: Option<Duration>,
    operation_timeout_ms: i32,
    validate_only: bool,
    incremental: bool,
    broker_id: i32,
    opaque: Option<Opaque>,
}

impl AdminOptions {
    /// Options for `for_api`, or for use with any API when `None`.
    pub fn new(for_api: Option<AdminOp>) -> Self {
        Self {
            for_api,
            request_timeout: None,
            operation_timeout_ms: 0,
            validate_only: false,
            incremental: false,
            broker_id: crate::request::CONTROLLER,
            opaque: None,
        }
    }

    fn applies(&self, option: &str, apis: &[AdminOp]) -> Result<(), AdminError> {
        match self.for_api {
            None => Ok(()),
            Some(api) if apis.contains(&api) => Ok(()),
            Some(api) => Err(AdminError::InvalidArg(format!(
                "option \"{option}\" is not valid for {}",
                api.name()
            ))),
        }
    }

    /// Client-side deadline for the whole request, including broker lookup
    /// and response wait. At most one hour; the engine default applies when
    /// unset.
    pub fn set_request_timeout(&mut self, timeout: Duration) -> Result<&mut Self, AdminError> {
        if timeout > Duration::from_millis(TIMEOUT_MAX_MS as u64) {
            return Err(AdminError::InvalidArg(format!(
                "request_timeout out of expected range 0..{TIMEOUT_MAX_MS} ms"
            )));
        }
        self.request_timeout = Some(timeout);
        Ok(self)
    }

    /// Broker-side timeout for coordinating a topic mutation. Zero or
    /// negative means the broker answers immediately and finishes the
    /// operation in the background; element-level `RequestTimedOut` errors
    /// then mean "accepted, still in progress" and are hidden from the
    /// application.
    pub fn set_operation_timeout(&mut self, timeout_ms: i32) -> Result<&mut Self, AdminError> {
        self.applies(
            "operation_timeout",
            &[
                AdminOp::CreateTopics,
                AdminOp::DeleteTopics,
                AdminOp::CreatePartitions,
            ],
        )?;
        if !(-1..=TIMEOUT_MAX_MS).contains(&timeout_ms) {
            return Err(AdminError::InvalidArg(format!(
                "operation_timeout out of expected range -1..{TIMEOUT_MAX_MS} ms"
            )));
        }
        self.operation_timeout_ms = timeout_ms;
        Ok(self)
    }

    /// Only validate the request on the broker, without applying it.
    pub fn set_validate_only(&mut self, validate_only: bool) -> Result<&mut Self, AdminError> {
        self.applies(
            "validate_only",
            &[
                AdminOp::CreateTopics,
                AdminOp::CreatePartitions,
                AdminOp::AlterConfigs,
            ],
        )?;
        self.validate_only = validate_only;
        Ok(self)
    }

    /// Apply configuration alterations incrementally instead of replacing
    /// the full config of each resource.
    pub fn set_incremental(&mut self, incremental: bool) -> Result<&mut Self, AdminError> {
        self.applies("incremental", &[AdminOp::AlterConfigs])?;
        self.incremental = incremental;
        Ok(self)
    }

    /// Send the request to this broker instead of the controller.
    pub fn set_broker(&mut self, broker_id: i32) -> Result<&mut Self, AdminError> {
        if broker_id < 0 {
            return Err(AdminError::InvalidArg(
                "broker out of expected range 0..INT32_MAX".into(),
            ));
        }
        self.broker_id = broker_id;
        Ok(self)
    }

    /// Attach an application value that is echoed in the result event.
    pub fn set_opaque(&mut self, opaque: Opaque) -> &mut Self {
        self.opaque = Some(opaque);
        self
    }

    /// Explicitly set client-side deadline, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Broker-side operation timeout in milliseconds.
    pub fn operation_timeout_ms(&self) -> i32 {
        self.operation_timeout_ms
    }

    /// Whether the broker should only validate the request.
    pub fn validate_only(&self) -> bool {
        self.validate_only
    }

    /// Whether config alterations are applied incrementally.
    pub fn incremental(&self) -> bool {
        self.incremental
    }

    /// Explicit destination broker, `-1` meaning the controller.
    pub fn broker_id(&self) -> i32 {
        self.broker_id
    }

    /// The attached application value, if any.
    pub fn opaque(&self) -> Option<&Opaque> {
        self.opaque.as_ref()
    }

    pub(crate) fn check_usable_for(&self, op: AdminOp) -> Result<(), AdminError> {
        match self.for_api {
            None => Ok(()),
            Some(api) if api == op => Ok(()),
            Some(api) => Err(AdminError::InvalidArg(format!(
                "options were created for {} and cannot be used with {}",
                api.name(),
                op.name()
            ))),
        }
    }
}

impl fmt::Debug for AdminOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminOptions")
            .field("for_api", &self.for_api)
            .field("request_timeout", &self.request_timeout)
            .field("operation_timeout_ms", &self.operation_timeout_ms)
            .field("validate_only", &self.validate_only)
            .field("incremental", &self.incremental)
            .field("broker_id", &self.broker_id)
            .field("opaque", &self.opaque.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Result of one CreateTopics, DeleteTopics or CreatePartitions submission.
#[derive(Clone)]
pub struct TopicsResult {
    /// Request-level failure; when set, `topics` is empty.
    pub error: Option<AdminError>,
    /// Per-topic outcomes, in submission order.
    pub topics: Vec<TopicResult>,
    /// The application value from the submission options.
    pub opaque: Option<Opaque>,
}

/// Result of one AlterConfigs or DescribeConfigs submission.
#[derive(Clone)]
pub struct ConfigsResult {
    /// Request-level failure; when set, `resources` is empty.
    pub error: Option<AdminError>,
    /// Per-resource outcomes, in submission order. Resources of a kind this
    /// client cannot represent are skipped with a warning, so this may be
    /// shorter than the submission.
    pub resources: Vec<ConfigResourceResult>,
    /// The application value from the submission options.
    pub opaque: Option<Opaque>,
}

impl fmt::Debug for TopicsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicsResult")
            .field("error", &self.error)
            .field("topics", &self.topics)
            .field("opaque", &self.opaque.as_ref().map(|_| ".."))
            .finish()
    }
}

impl fmt::Debug for ConfigsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigsResult")
            .field("error", &self.error)
            .field("resources", &self.resources)
            .field("opaque", &self.opaque.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Result event posted on the application reply queue, tagged with the API
/// the submission was made through.
#[derive(Debug, Clone)]
pub enum AdminEvent {
    /// Result of a CreateTopics submission.
    CreateTopics(TopicsResult),
    /// Result of a DeleteTopics submission.
    DeleteTopics(TopicsResult),
    /// Result of a CreatePartitions submission.
    CreatePartitions(TopicsResult),
    /// Result of an AlterConfigs submission.
    AlterConfigs(ConfigsResult),
    /// Result of a DescribeConfigs submission.
    DescribeConfigs(ConfigsResult),
}

impl AdminEvent {
    /// Which API produced this event.
    pub fn op(&self) -> AdminOp {
        match self {
            AdminEvent::CreateTopics(_) => AdminOp::CreateTopics,
            AdminEvent::DeleteTopics(_) => AdminOp::DeleteTopics,
            AdminEvent::CreatePartitions(_) => AdminOp::CreatePartitions,
            AdminEvent::AlterConfigs(_) => AdminOp::AlterConfigs,
            AdminEvent::DescribeConfigs(_) => AdminOp::DescribeConfigs,
        }
    }

    /// Request-level failure, if the whole request failed.
    pub fn error(&self) -> Option<&AdminError> {
        match self {
            AdminEvent::CreateTopics(r)
            | AdminEvent::DeleteTopics(r)
            | AdminEvent::CreatePartitions(r) => r.error.as_ref(),
            AdminEvent::AlterConfigs(r) | AdminEvent::DescribeConfigs(r) => r.error.as_ref(),
        }
    }
}

/// Broker-advised backoff observed in the most recent admin response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleHint {
    /// Broker that sent the hint.
    pub broker_id: i32,
    /// Advised backoff in milliseconds.
    pub throttle_ms: i32,
}

/// Configuration for the in-process admin engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied to submissions whose options carry no explicit
    /// request timeout.
    pub default_request_timeout: Duration,
}

impl EngineConfig {
    /// Default client-side deadline for admin requests.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Handle to a running admin engine instance.
///
/// Submissions return immediately; results arrive as [`AdminEvent`]s on the
/// reply queue given with each submission.
pub struct AdminClient {
    pub(crate) shared: Arc<EngineShared>,
    pub(crate) ops_tx: OpSender,
    pub(crate) join: tokio::task::JoinHandle<anyhow::Result<()>>,
}

/// Start a new in-process admin engine instance on `cluster`.
pub fn start_engine(cluster: Arc<dyn ClusterView>, config: EngineConfig) -> AdminClient {
    crate::engine::start_engine(cluster, config)
}

impl AdminClient {
    /// Create the given topics.
    pub fn create_topics(
        &self,
        topics: &[NewTopic],
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        self.submit(
            AdminOp::CreateTopics,
            RequestArgs::CreateTopics(topics.to_vec()),
            options,
            reply,
        )
    }

    /// Delete the given topics.
    pub fn delete_topics(
        &self,
        topics: &[impl AsRef<str>],
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        let topics = topics.iter().map(|t| t.as_ref().to_string()).collect();
        self.submit(
            AdminOp::DeleteTopics,
            RequestArgs::DeleteTopics(topics),
            options,
            reply,
        )
    }

    /// Grow the given topics to their new partition counts.
    pub fn create_partitions(
        &self,
        partitions: &[NewPartitions],
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        self.submit(
            AdminOp::CreatePartitions,
            RequestArgs::CreatePartitions(partitions.to_vec()),
            options,
            reply,
        )
    }

    /// Alter the configuration of the given resources.
    ///
    /// At most one resource of type `Broker` may be present; when it is,
    /// the request is sent to that broker instead of the controller.
    pub fn alter_configs(
        &self,
        resources: &[ConfigResource],
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        self.submit(
            AdminOp::AlterConfigs,
            RequestArgs::AlterConfigs(resources.to_vec()),
            options,
            reply,
        )
    }

    /// Read the configuration of the given resources.
    ///
    /// At most one resource of type `Broker` may be present; when it is,
    /// the request is sent to that broker instead of the controller.
    pub fn describe_configs(
        &self,
        resources: &[ConfigResource],
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        self.submit(
            AdminOp::DescribeConfigs,
            RequestArgs::DescribeConfigs(resources.to_vec()),
            options,
            reply,
        )
    }

    fn submit(
        &self,
        op: AdminOp,
        args: RequestArgs,
        options: Option<AdminOptions>,
        reply: &EventSender,
    ) -> Result<(), AdminError> {
        if self.shared.is_stopping() {
            return Err(AdminError::Destroyed);
        }
        let request = AdminRequest::new(
            op,
            args,
            options,
            self.shared.default_request_timeout,
            reply.clone(),
        )?;
        self.ops_tx.send(request).map_err(|_| AdminError::Destroyed)
    }

    /// Broker throttle hint from the most recent admin response, if any.
    pub fn last_throttle(&self) -> Option<ThrottleHint> {
        self.shared.last_throttle()
    }

    /// Request a graceful shutdown. Outstanding requests are discarded
    /// without result events.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    /// Wait for the engine to stop, returning the engine task result.
    pub async fn wait(self) -> anyhow::Result<()> {
        match self.join.await {
            Ok(res) => res,
            Err(err) => Err(anyhow::anyhow!("engine task join error: {err}")),
        }
    }
}
