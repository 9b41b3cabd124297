//! The broker-connection surface the engine depends on: asynchronous
//! broker/controller lookup, per-broker send queues and response delivery.
//!
//! The engine never opens sockets itself; the embedding connection layer
//! implements [`ClusterView`] and completes each send by calling
//! [`Responder::respond`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use weir_admin_core::AdminError;

use crate::notify::Notifier;

/// Wire identifiers of the admin APIs the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    /// CreateTopics (api key 19).
    CreateTopics,
    /// DeleteTopics (api key 20).
    DeleteTopics,
    /// DescribeConfigs (api key 32).
    DescribeConfigs,
    /// AlterConfigs (api key 33).
    AlterConfigs,
    /// CreatePartitions (api key 37).
    CreatePartitions,
}

impl ApiKey {
    /// The wire representation of this api key.
    pub fn code(self) -> i16 {
        match self {
            ApiKey::CreateTopics => 19,
            ApiKey::DeleteTopics => 20,
            ApiKey::DescribeConfigs => 32,
            ApiKey::AlterConfigs => 33,
            ApiKey::CreatePartitions => 37,
        }
    }

    /// Display name, matching the protocol nomenclature.
    pub fn name(self) -> &'static str {
        match self {
            ApiKey::CreateTopics => "CreateTopics",
            ApiKey::DeleteTopics => "DeleteTopics",
            ApiKey::DescribeConfigs => "DescribeConfigs",
            ApiKey::AlterConfigs => "AlterConfigs",
            ApiKey::CreatePartitions => "CreatePartitions",
        }
    }
}

/// Per-API version ranges a broker advertises, `ApiKey -> (min, max)`.
pub type ApiVersions = HashMap<ApiKey, (i16, i16)>;

/// Encoded admin request, ready for a broker send queue.
#[derive(Debug)]
pub struct WireRequest {
    /// Which API the body encodes.
    pub api_key: ApiKey,
    /// Negotiated protocol version the body was encoded at.
    pub api_version: i16,
    /// Encoded request body.
    pub body: Bytes,
}

/// Raw response handed back by the transport for a previously sent request.
#[derive(Debug)]
pub(crate) struct ReplyFrame {
    pub(crate) api_version: i16,
    pub(crate) broker_id: i32,
    pub(crate) body: Bytes,
    /// Broker-advised backoff, filled in by the response parser when the
    /// negotiated version carries it.
    pub(crate) throttle_ms: Option<i32>,
}

/// Completion callback for one in-flight admin request.
///
/// The transport must call [`respond`](Self::respond) exactly once per send.
/// Completions that lose the race against the request timeout find the
/// request already gone and are dropped with a debug log.
pub struct Responder {
    notifier: Notifier,
    api_key: ApiKey,
}

impl Responder {
    pub(crate) fn new(notifier: Notifier, api_key: ApiKey) -> Self {
        Self { notifier, api_key }
    }

    /// Deliver the response body (or the transport error) for the request
    /// this responder was issued with.
    pub fn respond(
        self,
        broker_id: i32,
        api_version: i16,
        result: Result<Bytes, AdminError>,
    ) {
        let Some((mut handle, queue)) = self.notifier.disable() else {
            tracing::debug!(
                api = self.api_key.name(),
                broker_id,
                "dropping outdated response, request already woken"
            );
            return;
        };

        match result {
            Ok(body) => {
                handle.last_error = None;
                handle.reply_buf = Some(ReplyFrame {
                    api_version,
                    broker_id,
                    body,
                    throttle_ms: None,
                });
            }
            Err(err) => handle.last_error = Some(err),
        }

        if queue.send(handle).is_err() {
            tracing::debug!(
                api = self.api_key.name(),
                broker_id,
                "engine work queue closed, dropping response"
            );
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("api", &self.api_key.name())
            .finish_non_exhaustive()
    }
}

/// A request sitting on a broker send queue, paired with the responder the
/// transport completes it with.
#[derive(Debug)]
pub struct OutboundRequest {
    /// Destination broker.
    pub broker_id: i32,
    /// The encoded request.
    pub request: WireRequest,
    /// Completion callback.
    pub responder: Responder,
}

impl OutboundRequest {
    /// Complete with a successful reply body, echoing the negotiated
    /// version the request was encoded at.
    pub fn respond_ok(self, body: Bytes) {
        let version = self.request.api_version;
        self.responder.respond(self.broker_id, version, Ok(body));
    }

    /// Complete with a transport-level failure.
    pub fn fail(self, err: AdminError) {
        let version = self.request.api_version;
        self.responder.respond(self.broker_id, version, Err(err));
    }
}

/// A connected broker as seen by the engine: its id, the protocol versions
/// it advertises, and its outbound send queue.
#[derive(Debug, Clone)]
pub struct BrokerRef {
    id: i32,
    api_versions: Arc<ApiVersions>,
    sends: mpsc::UnboundedSender<OutboundRequest>,
}

impl BrokerRef {
    /// New reference to a connected broker.
    pub fn new(
        id: i32,
        api_versions: Arc<ApiVersions>,
        sends: mpsc::UnboundedSender<OutboundRequest>,
    ) -> Self {
        Self {
            id,
            api_versions,
            sends,
        }
    }

    /// Broker id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Highest version of `key` both sides support within `min..=max`, or
    /// `None` if the ranges do not overlap.
    pub fn negotiate(&self, key: ApiKey, min: i16, max: i16) -> Option<i16> {
        let (broker_min, broker_max) = *self.api_versions.get(&key)?;
        let hi = max.min(broker_max);
        if hi < min || hi < broker_min {
            return None;
        }
        Some(hi)
    }

    /// Enqueue `request` on this broker's send queue. The transport will
    /// eventually complete it through `responder`.
    pub fn send(&self, request: WireRequest, responder: Responder) -> Result<(), AdminError> {
        let broker_id = self.id;
        self.sends
            .send(OutboundRequest {
                broker_id,
                request,
                responder,
            })
            .map_err(|_| {
                AdminError::Transport(format!("broker {broker_id} send queue is closed"))
            })
    }
}

/// Asynchronous lookup of connected brokers, implemented by the embedding
/// connection layer.
///
/// When the requested broker (or the controller) is not available in the up
/// state, the implementation keeps `waiter` and triggers it (with no error)
/// on the next relevant state change; the engine then retries the lookup.
/// The controller lookup must also be re-triggered when the controller
/// identity changes through metadata updates.
pub trait ClusterView: Send + Sync + 'static {
    /// Broker `id`, if currently connected and up.
    fn broker_up_async(&self, id: i32, waiter: Notifier) -> Option<BrokerRef>;

    /// The cluster controller, if currently known, connected and up.
    fn controller_up_async(&self, waiter: Notifier) -> Option<BrokerRef>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker_with(key: ApiKey, min: i16, max: i16) -> BrokerRef {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut versions = ApiVersions::new();
        versions.insert(key, (min, max));
        BrokerRef::new(7, Arc::new(versions), tx)
    }

    #[test]
    fn api_keys_match_the_protocol() {
        assert_eq!(ApiKey::CreateTopics.code(), 19);
        assert_eq!(ApiKey::DeleteTopics.code(), 20);
        assert_eq!(ApiKey::DescribeConfigs.code(), 32);
        assert_eq!(ApiKey::AlterConfigs.code(), 33);
        assert_eq!(ApiKey::CreatePartitions.code(), 37);
    }

    #[test]
    fn negotiate_picks_highest_common_version() {
        let b = broker_with(ApiKey::CreateTopics, 0, 1);
        assert_eq!(b.negotiate(ApiKey::CreateTopics, 0, 2), Some(1));
        assert_eq!(b.negotiate(ApiKey::CreateTopics, 2, 2), None);
        assert_eq!(b.negotiate(ApiKey::DeleteTopics, 0, 1), None);

        let b = broker_with(ApiKey::DescribeConfigs, 1, 3);
        assert_eq!(b.negotiate(ApiKey::DescribeConfigs, 0, 1), Some(1));
    }
}
