//! Engine runtime: the single task that owns every in-flight admin request
//! and drains the work queue that submissions and wake-ups land on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};

use weir_admin_core::AdminError;

use crate::api::{AdminClient, EngineConfig, ThrottleHint};
use crate::cluster::ClusterView;
use crate::notify::{Notifier, OpSender};
use crate::request::AdminRequest;
use crate::worker;

/// State shared between the engine task and the client handle.
pub(crate) struct EngineShared {
    pub(crate) cluster: Arc<dyn ClusterView>,
    pub(crate) default_request_timeout: Duration,
    stop_requested: AtomicBool,
    pub(crate) stop_notify: Notify,
    throttle: Mutex<Option<ThrottleHint>>,
}

impl EngineShared {
    pub(crate) fn new(cluster: Arc<dyn ClusterView>, default_request_timeout: Duration) -> Self {
        Self {
            cluster,
            default_request_timeout,
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            throttle: Mutex::new(None),
        }
    }

    pub(crate) fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            self.stop_notify.notify_waiters();
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Record a broker-advised backoff from an admin response.
    pub(crate) fn note_throttle(&self, broker_id: i32, throttle_ms: i32) {
        if throttle_ms <= 0 {
            return;
        }
        tracing::debug!(broker_id, throttle_ms, "broker requested throttling");
        *self.throttle.lock().unwrap() = Some(ThrottleHint {
            broker_id,
            throttle_ms,
        });
    }

    pub(crate) fn last_throttle(&self) -> Option<ThrottleHint> {
        *self.throttle.lock().unwrap()
    }
}

pub(crate) struct EngineRuntime {
    pub(crate) shared: Arc<EngineShared>,
    /// Our own sender onto the work queue, handed to notifiers when a
    /// request is parked.
    pub(crate) ops_tx: OpSender,
    pub(crate) ops_rx: mpsc::UnboundedReceiver<Box<AdminRequest>>,
    /// Every live request's notifier, so shutdown can wake them all.
    pub(crate) outstanding: HashMap<u64, Notifier>,
}

impl EngineRuntime {
    async fn run(mut self) -> anyhow::Result<()> {
        tracing::debug!("admin engine started");

        loop {
            if self.shared.is_stopping() {
                break;
            }
            tokio::select! {
                _ = self.shared.stop_notify.notified() => {}
                req = self.ops_rx.recv() => {
                    let Some(req) = req else { break };
                    worker::serve(&mut self, req);
                }
            }
        }

        self.drain_shutdown();
        tracing::debug!("admin engine stopped");
        Ok(())
    }

    /// Wake every suspended request with the shutdown error, then serve the
    /// queue one last time so each handle is torn down on the engine task.
    /// No result events are posted for any of them.
    fn drain_shutdown(&mut self) {
        let waiting: Vec<Notifier> = self.outstanding.values().cloned().collect();
        let discarded = waiting.len();
        for notifier in waiting {
            notifier.trigger(Some(AdminError::Destroyed), "engine shutdown");
        }

        // Triggers repost synchronously, so a single sweep reaches
        // everything that was queued or suspended.
        while let Ok(req) = self.ops_rx.try_recv() {
            worker::serve(&mut *self, req);
        }

        if discarded > 0 {
            tracing::debug!(count = discarded, "discarded outstanding admin requests at shutdown");
        }
    }
}

pub(crate) fn start_engine(cluster: Arc<dyn ClusterView>, mut config: EngineConfig) -> AdminClient {
    if config.default_request_timeout == Duration::ZERO {
        config.default_request_timeout = EngineConfig::DEFAULT_REQUEST_TIMEOUT;
    }

    let (ops_tx, ops_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(EngineShared::new(cluster, config.default_request_timeout));

    let runtime = EngineRuntime {
        shared: shared.clone(),
        ops_tx: ops_tx.clone(),
        ops_rx,
        outstanding: HashMap::new(),
    };
    let join = tokio::spawn(runtime.run());

    AdminClient {
        shared,
        ops_tx,
        join,
    }
}
