//! Per-request state: everything the worker reads or writes while driving
//! one admin request from submission to its result event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use weir_admin_core::{AdminError, ConfigResource, NewPartitions, NewTopic, ResourceType};

use crate::api::{AdminOp, AdminOptions, EventSender};
use crate::cluster::ReplyFrame;
use crate::notify::Notifier;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Broker id meaning "whichever broker is currently the controller".
pub(crate) const CONTROLLER: i32 = -1;

/// Lifecycle stage of an in-flight admin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Init,
    WaitBroker,
    WaitController,
    ConstructRequest,
    WaitResponse,
}

impl RequestState {
    /// Human-readable stage description used in failure messages.
    pub(crate) fn desc(self) -> &'static str {
        match self {
            RequestState::Init => "initializing",
            RequestState::WaitBroker => "waiting for broker",
            RequestState::WaitController => "waiting for controller",
            RequestState::ConstructRequest => "constructing request",
            RequestState::WaitResponse => "waiting for response from broker",
        }
    }
}

/// Kind-specific argument records, deep-copied from the application's
/// inputs at submission and immutable afterwards.
#[derive(Debug)]
pub(crate) enum RequestArgs {
    CreateTopics(Vec<NewTopic>),
    DeleteTopics(Vec<String>),
    CreatePartitions(Vec<NewPartitions>),
    AlterConfigs(Vec<ConfigResource>),
    DescribeConfigs(Vec<ConfigResource>),
}

impl RequestArgs {
    pub(crate) fn new_topics(&self) -> &[NewTopic] {
        match self {
            RequestArgs::CreateTopics(v) => v,
            _ => unreachable!("args kind does not match the request op"),
        }
    }

    pub(crate) fn topic_names(&self) -> &[String] {
        match self {
            RequestArgs::DeleteTopics(v) => v,
            _ => unreachable!("args kind does not match the request op"),
        }
    }

    pub(crate) fn new_partitions(&self) -> &[NewPartitions] {
        match self {
            RequestArgs::CreatePartitions(v) => v,
            _ => unreachable!("args kind does not match the request op"),
        }
    }

    pub(crate) fn config_resources(&self) -> &[ConfigResource] {
        match self {
            RequestArgs::AlterConfigs(v) | RequestArgs::DescribeConfigs(v) => v,
            _ => unreachable!("args kind does not match the request op"),
        }
    }
}

/// One outstanding admin request.
///
/// The handle is owned by exactly one place at a time: the engine work
/// queue, the worker invocation serving it, or the notifier slot while the
/// request is suspended. Only the engine task mutates it after submission.
pub(crate) struct AdminRequest {
    pub(crate) id: u64,
    pub(crate) op: AdminOp,
    pub(crate) args: RequestArgs,
    pub(crate) options: AdminOptions,
    /// Destination broker; [`CONTROLLER`] routes to the controller.
    pub(crate) broker_id: i32,
    pub(crate) deadline: Instant,
    pub(crate) state: RequestState,
    pub(crate) timer: Option<JoinHandle<()>>,
    /// Back reference to the wake-up rendezvous; cleared on destroy so late
    /// wake sources no longer find the request.
    pub(crate) notifier: Option<Notifier>,
    pub(crate) reply_buf: Option<ReplyFrame>,
    /// Why the last wake-up was scheduled; `None` means no error.
    pub(crate) last_error: Option<AdminError>,
    pub(crate) reply_tx: EventSender,
}

impl AdminRequest {
    /// Build and validate a request handle. Runs on the application task;
    /// everything fallible about a submission fails here, synchronously,
    /// before the handle reaches the work queue. The timer is not armed
    /// here; only the engine task starts timers.
    pub(crate) fn new(
        op: AdminOp,
        args: RequestArgs,
        options: Option<AdminOptions>,
        default_request_timeout: Duration,
        reply_tx: EventSender,
    ) -> Result<Box<Self>, AdminError> {
        let options = match options {
            Some(options) => {
                options.check_usable_for(op)?;
                options
            }
            None => AdminOptions::new(Some(op)),
        };

        let broker_id = match &args {
            RequestArgs::AlterConfigs(resources) | RequestArgs::DescribeConfigs(resources) => {
                single_broker_target(resources)?
            }
            _ => CONTROLLER,
        };

        let timeout = options
            .request_timeout()
            .unwrap_or(default_request_timeout);
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(Self {
            id,
            op,
            args,
            options,
            broker_id,
            deadline: Instant::now() + timeout,
            state: RequestState::Init,
            timer: None,
            notifier: Some(Notifier::new(id)),
            reply_buf: None,
            last_error: None,
            reply_tx,
        }))
    }

    pub(crate) fn notifier(&self) -> Notifier {
        self.notifier
            .clone()
            .expect("notifier cleared before destroy")
    }
}

impl Drop for AdminRequest {
    fn drop(&mut self) {
        // Covers every path out of the engine, including handles dropped
        // because the work queue closed mid-wake.
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Scan config resources for one of type `Broker` and derive the request's
/// destination from it. More than one broker resource cannot be served by a
/// single destination broker and is rejected outright.
fn single_broker_target(resources: &[ConfigResource]) -> Result<i32, AdminError> {
    let mut broker_id = CONTROLLER;

    for resource in resources {
        if resource.resource_type() != ResourceType::Broker {
            continue;
        }
        if broker_id != CONTROLLER {
            return Err(AdminError::Conflict(
                "only one ConfigResource of type BROKER is allowed per call".into(),
            ));
        }

        let id: i32 = resource.name().parse().map_err(|_| {
            AdminError::InvalidArg(format!(
                "expected an int32 broker id for ConfigResource(type=BROKER, name={})",
                resource.name()
            ))
        })?;
        if id < 0 {
            return Err(AdminError::InvalidArg(format!(
                "expected an int32 broker id for ConfigResource(type=BROKER, name={})",
                resource.name()
            )));
        }
        broker_id = id;
        // Keep scanning so duplicate BROKER resources are caught.
    }

    Ok(broker_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn resources(specs: &[(ResourceType, &str)]) -> Vec<ConfigResource> {
        specs
            .iter()
            .map(|(t, n)| ConfigResource::new(*t, *n).unwrap())
            .collect()
    }

    #[test]
    fn broker_target_scan() {
        let rs = resources(&[(ResourceType::Topic, "t"), (ResourceType::Broker, "3")]);
        assert_eq!(single_broker_target(&rs).unwrap(), 3);

        let rs = resources(&[(ResourceType::Topic, "t")]);
        assert_eq!(single_broker_target(&rs).unwrap(), CONTROLLER);

        let rs = resources(&[(ResourceType::Broker, "1"), (ResourceType::Broker, "2")]);
        assert!(matches!(
            single_broker_target(&rs),
            Err(AdminError::Conflict(_))
        ));

        let rs = resources(&[(ResourceType::Broker, "zk")]);
        assert!(matches!(
            single_broker_target(&rs),
            Err(AdminError::InvalidArg(_))
        ));

        let rs = resources(&[(ResourceType::Broker, "-2")]);
        assert!(matches!(
            single_broker_target(&rs),
            Err(AdminError::InvalidArg(_))
        ));
    }

    #[tokio::test]
    async fn submission_snapshots_deadline_and_target() {
        let (reply_tx, _reply_rx) = mpsc::unbounded_channel();
        let req = AdminRequest::new(
            AdminOp::DescribeConfigs,
            RequestArgs::DescribeConfigs(resources(&[(ResourceType::Broker, "5")])),
            None,
            Duration::from_secs(9),
            reply_tx,
        )
        .unwrap();

        assert_eq!(req.broker_id, 5);
        assert_eq!(req.state, RequestState::Init);
        assert!(req.deadline > Instant::now());
        assert!(req.timer.is_none());
        assert!(req.notifier.is_some());
    }

    #[tokio::test]
    async fn mismatched_options_rejected() {
        let (reply_tx, _reply_rx) = mpsc::unbounded_channel();
        let options = AdminOptions::new(Some(AdminOp::DeleteTopics));
        let err = AdminRequest::new(
            AdminOp::CreateTopics,
            RequestArgs::CreateTopics(Vec::new()),
            Some(options),
            Duration::from_secs(1),
            reply_tx,
        )
        .err()
        .unwrap();
        assert!(matches!(err, AdminError::InvalidArg(_)));
    }
}
