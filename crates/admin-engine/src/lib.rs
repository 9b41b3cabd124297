#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Asynchronous admin-request engine for the `weir` broker client: create
//! and delete topics, grow partition counts, and read or alter broker and
//! topic configuration, with results delivered through an event queue
//! without ever blocking the submitting task.

pub mod api;
pub mod cluster;
mod engine;
mod notify;
mod protocol;
mod request;
pub mod testing;
pub mod wire;

mod worker;

pub use api::{
    event_queue, start_engine, AdminClient, AdminEvent, AdminOp, AdminOptions, ConfigsResult,
    EngineConfig, EventReceiver, EventSender, Opaque, ThrottleHint, TopicsResult,
};
pub use cluster::{
    ApiKey, ApiVersions, BrokerRef, ClusterView, OutboundRequest, Responder, WireRequest,
};
pub use notify::Notifier;
