//! In-process cluster fixtures for exercising the engine without a real
//! broker connection layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::cluster::{ApiKey, ApiVersions, BrokerRef, ClusterView, OutboundRequest};
use crate::notify::Notifier;

struct MockBroker {
    up: bool,
    api_versions: Arc<ApiVersions>,
}

#[derive(Default)]
struct MockState {
    brokers: HashMap<i32, MockBroker>,
    controller: Option<i32>,
    waiters: Vec<Notifier>,
}

struct MockInner {
    state: Mutex<MockState>,
    outbound_tx: mpsc::UnboundedSender<OutboundRequest>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<OutboundRequest>>,
}

/// Scriptable [`ClusterView`]: brokers can be added, taken up and down, and
/// the controller reassigned at any time; requests land on an inspectable
/// queue instead of a socket and are completed by the test.
///
/// Any state change wakes every waiter the engine has registered, which
/// then re-runs its lookup, the same contract a real connection layer's
/// broker-state machinery provides.
#[derive(Clone)]
pub struct MockCluster {
    inner: Arc<MockInner>,
}

impl MockCluster {
    /// Empty cluster: no brokers, no controller.
    pub fn new() -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                state: Mutex::new(MockState::default()),
                outbound_tx,
                outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            }),
        }
    }

    fn full_api_versions() -> Arc<ApiVersions> {
        let versions: ApiVersions = [
            ApiKey::CreateTopics,
            ApiKey::DeleteTopics,
            ApiKey::DescribeConfigs,
            ApiKey::AlterConfigs,
            ApiKey::CreatePartitions,
        ]
        .into_iter()
        .map(|key| (key, (0, 7)))
        .collect();
        Arc::new(versions)
    }

    /// Add broker `id` in the up state.
    pub fn add_broker(&self, id: i32) {
        {
            let mut state = self.lock();
            state.brokers.insert(
                id,
                MockBroker {
                    up: true,
                    api_versions: Self::full_api_versions(),
                },
            );
        }
        self.wake_waiters();
    }

    /// Change the up/down state of broker `id`.
    pub fn set_broker_up(&self, id: i32, up: bool) {
        {
            let mut state = self.lock();
            if let Some(broker) = state.brokers.get_mut(&id) {
                broker.up = up;
            }
        }
        self.wake_waiters();
    }

    /// Designate broker `id` as the controller.
    pub fn set_controller(&self, id: i32) {
        {
            let mut state = self.lock();
            state.controller = Some(id);
        }
        self.wake_waiters();
    }

    /// Override the version range broker `id` advertises for `key`.
    pub fn set_api_versions(&self, id: i32, key: ApiKey, min: i16, max: i16) {
        let mut state = self.lock();
        if let Some(broker) = state.brokers.get_mut(&id) {
            Arc::make_mut(&mut broker.api_versions).insert(key, (min, max));
        }
    }

    /// Await the next request the engine put on a send queue.
    pub async fn next_request(&self) -> OutboundRequest {
        let mut rx = self.inner.outbound_rx.lock().await;
        rx.recv().await.expect("mock cluster outbound queue closed")
    }

    /// The next queued request, if one is already waiting.
    pub fn try_next_request(&self) -> Option<OutboundRequest> {
        self.inner
            .outbound_rx
            .try_lock()
            .ok()
            .and_then(|mut rx| rx.try_recv().ok())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.state.lock().unwrap()
    }

    fn wake_waiters(&self) {
        let waiters = std::mem::take(&mut self.lock().waiters);
        for waiter in waiters {
            waiter.trigger(None, "broker state change");
        }
    }

    fn broker_ref(&self, state: &MockState, id: i32) -> Option<BrokerRef> {
        let broker = state.brokers.get(&id)?;
        if !broker.up {
            return None;
        }
        Some(BrokerRef::new(
            id,
            broker.api_versions.clone(),
            self.inner.outbound_tx.clone(),
        ))
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterView for MockCluster {
    fn broker_up_async(&self, id: i32, waiter: Notifier) -> Option<BrokerRef> {
        let mut state = self.lock();
        match self.broker_ref(&state, id) {
            Some(broker) => Some(broker),
            None => {
                state.waiters.push(waiter);
                None
            }
        }
    }

    fn controller_up_async(&self, waiter: Notifier) -> Option<BrokerRef> {
        let mut state = self.lock();
        let found = state.controller.and_then(|id| self.broker_ref(&state, id));
        match found {
            Some(broker) => Some(broker),
            None => {
                state.waiters.push(waiter);
                None
            }
        }
    }
}
